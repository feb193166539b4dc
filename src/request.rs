//! Chat-completion payload and the HTTP request that carries it

use std::time::Duration;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::{Config, Provider};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage
{   pub role: String
  , pub content: String
}

impl ChatMessage
{   pub fn system(content: impl Into<String>) -> Self
    {   ChatMessage
        {   role: "system".to_string()
          , content: content.into()
        }
    }

    pub fn user(content: impl Into<String>) -> Self
    {   ChatMessage
        {   role: "user".to_string()
          , content: content.into()
        }
    }
}

/// Request body, built fresh for every call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatRequest
{   pub model: String
  , pub messages: Vec<ChatMessage>
  , pub temperature: f32
  , pub max_tokens: u32
  , #[serde(skip_serializing_if = "Option::is_none")]
    pub stream: Option<bool>
}

/// Everything the transport needs to perform one POST
#[derive(Clone)]
pub struct HttpRequest
{   pub provider: Provider
  , pub url: String
  , pub headers: Vec<(String, String)>
  , pub body: ChatRequest
  , pub timeout: Duration
}

impl HttpRequest
{   /// Response arrives as newline-delimited chunks.
    pub fn is_streaming(&self) -> bool
    {   self.body.stream.unwrap_or(false)
    }
}

impl std::fmt::Debug for HttpRequest
{   fn fmt(&self, f: &mut std::fmt::Formatter<'_>)
      -> std::fmt::Result
    {   f.debug_struct("HttpRequest")
          .field("provider", &self.provider)
          .field("url", &self.url)
          .field("headers", &crate::redact::headers_for_log(&self.headers))
          .field("body", &self.body)
          .field("timeout", &self.timeout)
          .finish()
    }
}

/// Standard JSON + bearer token headers
pub fn base_headers(api_key: &str) -> Vec<(String, String)>
{   vec![
      ("Content-Type".to_string(), "application/json".to_string())
    , ("Authorization".to_string(), format!("Bearer {}", api_key))
    ]
}

/// Build the request for the provider selected in `config`.
pub fn build_request(config: &Config, prompt: &str)
  -> Result<HttpRequest>
{   match config.provider
    {   Provider::OpenAI => {
          crate::providers::openai::build_request(config, prompt)
        }
      , Provider::DeepSeek => {
          crate::providers::deepseek::build_request(config, prompt)
        }
    }
}
