use log::trace;

use crate::error::Result;
use crate::request::{base_headers, ChatMessage, ChatRequest, HttpRequest};
use crate::{Config, Provider};

pub const CHAT_COMPLETIONS_URL: &str
  = "https://api.deepseek.com/chat/completions";

pub const SYSTEM_PROMPT: &str = "You are a helpful assistant.";

/// Models offered for selection
pub const MODELS: [&str; 2] = ["deepseek-chat", "deepseek-reasoner"];

/// System + user message; `stream` always present so the server
/// knows which body shape to send back.
pub fn build_request(config: &Config, prompt: &str)
  -> Result<HttpRequest>
{   let (model, api_key) = super::credentials(config, Provider::DeepSeek)?;

    let body = ChatRequest
    {   model
      , messages: vec![
          ChatMessage::system(SYSTEM_PROMPT)
        , ChatMessage::user(prompt)
        ]
      , temperature: config.temperature
      , max_tokens: config.max_tokens
      , stream: Some(config.deepseek_stream)
    };
    trace!("DeepSeek request body: {:?}", body);

    let mut headers = base_headers(&api_key);
    headers.push(("Accept".to_string(), "application/json".to_string()));

    Ok(HttpRequest
    {   provider: Provider::DeepSeek
      , url: config.endpoint(Provider::DeepSeek).to_string()
      , headers
      , body
      , timeout: config.request_timeout()
    })
}
