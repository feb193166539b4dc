use log::{debug, error, info, warn};
use serde::Deserialize;

use crate::connectivity::{ConnectivityProbe, TcpProbe};
use crate::error::{Error, Result};
use crate::redact::scrub;
use crate::request::{build_request, HttpRequest};
use crate::retry::RetryPolicy;
use crate::stream::StreamAccumulator;
use crate::transport::{ReqwestTransport, Transport, TransportError};
use crate::{Config, ProgressFn};

#[derive(Debug, Clone, Deserialize)]
struct ChatResponse
{   choices: Vec<Choice>
}

#[derive(Debug, Clone, Deserialize)]
struct Choice
{   #[serde(default)]
    message: Option<ResponseMessage>
}

#[derive(Debug, Clone, Deserialize)]
struct ResponseMessage
{   #[serde(default)]
    content: Option<String>
}

/// Extract the trimmed text of the first choice.
///
/// `{"choices":[]}` and a blank first message are empty responses;
/// anything that is not a JSON object with a `choices` list is malformed.
pub fn parse_completion(body: &str) -> Result<String>
{   let response: ChatResponse = serde_json::from_str(body)
      .map_err(|e| {
        error!("Invalid API response structure: {}", e);
        Error::MalformedResponse(e.to_string())
      })?;

    let message = response.choices
      .into_iter()
      .next()
      .and_then(|c| c.message)
      .and_then(|m| m.content)
      .unwrap_or_default();
    let message = message.trim();

    if message.is_empty()
    {   error!("Empty response message");
        return Err(Error::EmptyResponse);
    }
    info!("API response content: {}", message);
    Ok(message.to_string())
}

/// Request sender. Owns its configuration; nothing is global.
pub struct OmniClient<T = ReqwestTransport, P = TcpProbe>
{   config: Config
  , transport: T
  , probe: P
  , retry: RetryPolicy
}

impl OmniClient
{   /// Client using reqwest and the TCP connectivity probe
    pub fn new(config: Config) -> Self
    {   OmniClient::with_parts(
          config
        , ReqwestTransport::new()
        , TcpProbe::default()
        )
    }
}

impl<T, P> OmniClient<T, P>
where T: Transport
    , P: ConnectivityProbe
{   pub fn with_parts(config: Config, transport: T, probe: P) -> Self
    {   debug!("Creating OmniClient for {}", config.provider);
        let retry = RetryPolicy::from_config(&config);
        OmniClient
        {   config
          , transport
          , probe
          , retry
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self
    {   self.retry = retry;
        self
    }

    pub fn config(&self) -> &Config
    {   &self.config
    }

    /// Replace the configuration; the retry policy follows it.
    pub fn set_config(&mut self, config: Config)
    {   self.retry = RetryPolicy::from_config(&config);
        self.config = config;
    }

    pub fn retry_policy(&self) -> &RetryPolicy
    {   &self.retry
    }

    /// Generate text for a fully rendered prompt with the configured
    /// provider.
    pub async fn complete(
      &self
    , prompt: &str
    , progress: Option<ProgressFn>
    ) -> Result<String>
    {   let request = build_request(&self.config, prompt)?;
        self.send(&request, progress).await
    }

    /// Like [`complete`](Self::complete) but folds errors into their
    /// bracketed placeholder.
    pub async fn complete_text(&self, prompt: &str) -> String
    {   match self.complete(prompt, None).await
        {   Ok(text) => text
          , Err(e) => {
              error!("Generation failed: {}", e);
              e.placeholder()
            }
        }
    }

    /// Perform `request`: probe, then up to `max_attempts` tries.
    ///
    /// Only timeouts are retried, after sleeping
    /// `backoff_factor * attempt`. Other failures surface at once.
    pub async fn send(
      &self
    , request: &HttpRequest
    , progress: Option<ProgressFn>
    ) -> Result<String>
    {   if !self.probe.is_online().await
        {   error!("No internet connection.");
            return Err(Error::NoInternet);
        }

        let secrets = self.config.secrets();
        let mut stream = if request.is_streaming()
        {   Some(StreamAccumulator::new(
              request.body.max_tokens as usize,
              progress
            ))
        } else
        {   None
        };
        let max_attempts = self.retry.max_attempts;

        for attempt in 1..=max_attempts
        {   info!(
              "Sending API request (attempt {}/{}): {:?}",
              attempt, max_attempts, request
            );

            let outcome = match stream.as_mut()
            {   Some(acc) => {
                  acc.reset();
                  self.transport
                    .post_lines(request, acc)
                    .await
                    .map(|()| None)
                }
              , None => self.transport.post(request).await.map(Some)
            };

            match outcome
            {   Ok(Some(body)) => return parse_completion(&body)
              , Ok(None) => {
                  let text = match stream.as_mut()
                  {   Some(acc) => acc.finish()?
                    , None => return Err(Error::EmptyStreamedResponse)
                  };
                  info!("Streamed API response content: {}", text);
                  return Ok(text);
                }
              , Err(TransportError::Timeout) => {
                  warn!(
                    "Timeout error. Retrying attempt {}/{}...",
                    attempt, max_attempts
                  );
                  if self.retry.has_next(attempt)
                  {   tokio::time::sleep(
                        self.retry.delay_after(attempt)
                      ).await;
                  }
                }
              , Err(TransportError::Status { status, body }) => {
                  let message = scrub(&body, &secrets);
                  error!("API error ({}): {}", status, message);
                  return Err(Error::Api { status, message });
                }
              , Err(TransportError::Other(msg)) => {
                  let message = scrub(&msg, &secrets);
                  error!("API error: {}", message);
                  return Err(Error::Transport(message));
                }
            }
        }

        error!("API request failed after {} attempts", max_attempts);
        Err(Error::TimeoutExhausted { attempts: max_attempts })
    }
}

impl<T, P> crate::batch::Generate for OmniClient<T, P>
where T: Transport + 'static
    , P: ConnectivityProbe + 'static
{   fn generate(
      &self
    , prompt: String
    , progress: ProgressFn
    ) -> impl std::future::Future<Output = Result<String>> + Send
    {   async move { self.complete(&prompt, Some(progress)).await }
    }
}
