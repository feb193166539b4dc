//! HTTP seam between the request sender and the network

use std::future::Future;
use std::time::Duration;
use log::{debug, trace, warn};

use crate::request::HttpRequest;
use crate::stream::StreamAccumulator;

/// Longest slice of an error body carried into diagnostics
const ERROR_SNIPPET_LEN: usize = 300;

/// Transport-level failure, classified for the retry loop
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportError
{   /// Connect, send or body read exceeded the request timeout
    Timeout
  , /// Server answered with a non-success status
    Status { status: u16, body: String }
  , /// Any other network failure
    Other(String)
}

/// Performs one POST. Implementations must not retry on their own.
pub trait Transport: Send + Sync
{   /// Whole response body as text.
    fn post(&self, request: &HttpRequest)
      -> impl Future<Output = Result<String, TransportError>> + Send;

    /// Feed every body line to `sink` as it arrives.
    fn post_lines(
      &self
    , request: &HttpRequest
    , sink: &mut StreamAccumulator
    ) -> impl Future<Output = Result<(), TransportError>> + Send;
}

/// Transport backed by a single shared `reqwest::Client`
#[derive(Debug, Clone, Default)]
pub struct ReqwestTransport
{   http_client: reqwest::Client
}

impl ReqwestTransport
{   pub fn new() -> Self
    {   ReqwestTransport::default()
    }

    pub fn with_client(http_client: reqwest::Client) -> Self
    {   ReqwestTransport
        {   http_client
        }
    }

    /// Send `request` and check the status. A non-success body is
    /// carried in the error but never logged here; the caller scrubs it.
    ///
    /// With `idle` set the request timeout bounds the wait for the
    /// response head only, and the caller applies it per body chunk.
    /// Otherwise it is reqwest's deadline for the whole exchange.
    async fn send(&self, request: &HttpRequest, idle: bool)
      -> Result<reqwest::Response, TransportError>
    {   let mut builder = self.http_client.post(&request.url);
        if !idle
        {   builder = builder.timeout(request.timeout);
        }
        for (name, value) in &request.headers
        {   builder = builder.header(name.as_str(), value.as_str());
        }

        let sending = builder.json(&request.body).send();
        let response = if idle
        {   within(request.timeout, sending).await?
        } else
        {   sending.await.map_err(classify)?
        };

        let status = response.status();
        trace!("Response status: {}", status);

        if !status.is_success()
        {   let body = if idle
            {   within(request.timeout, response.text()).await
            } else
            {   response.text().await.map_err(classify)
            };
            let body = body.unwrap_or_else(|_| "Unknown error".to_string());
            debug!("API returned status {}", status);
            return Err(TransportError::Status
            {   status: status.as_u16()
              , body: snippet(&body)
            });
        }
        Ok(response)
    }
}

impl Transport for ReqwestTransport
{   async fn post(&self, request: &HttpRequest)
      -> Result<String, TransportError>
    {   let response = self.send(request, false).await?;
        response.text().await.map_err(classify)
    }

    /// The request timeout applies between chunks, so a slow but steady
    /// stream may run longer than it in total.
    async fn post_lines(
      &self
    , request: &HttpRequest
    , sink: &mut StreamAccumulator
    ) -> Result<(), TransportError>
    {   let mut response = self.send(request, true).await?;
        let mut pending: Vec<u8> = Vec::new();

        while let Some(chunk) = within(request.timeout, response.chunk()).await?
        {   pending.extend_from_slice(&chunk);
            while let Some(pos) = pending.iter().position(|b| *b == b'\n')
            {   let line: Vec<u8> = pending.drain(..=pos).collect();
                sink.push_line(&String::from_utf8_lossy(&line));
            }
        }
        if !pending.is_empty()
        {   sink.push_line(&String::from_utf8_lossy(&pending));
        }
        debug!("Stream body fully consumed");
        Ok(())
    }
}

/// Await `fut`, giving up after `limit` of silence.
async fn within<T>(
  limit: Duration
, fut: impl Future<Output = reqwest::Result<T>>
) -> Result<T, TransportError>
{   match tokio::time::timeout(limit, fut).await
    {   Ok(result) => result.map_err(classify)
      , Err(_) => {
          warn!("No data from the server for {:?}", limit);
          Err(TransportError::Timeout)
        }
    }
}

fn classify(e: reqwest::Error) -> TransportError
{   if e.is_timeout()
    {   TransportError::Timeout
    } else
    {   TransportError::Other(e.to_string())
    }
}

/// First few hundred characters, cut on a char boundary.
fn snippet(body: &str) -> String
{   let trimmed = body.trim();
    match trimmed.char_indices().nth(ERROR_SNIPPET_LEN)
    {   Some((idx, _)) => format!("{}…", &trimmed[..idx])
      , None => trimmed.to_string()
    }
}
