use log::trace;

use crate::error::Result;
use crate::request::{base_headers, ChatMessage, ChatRequest, HttpRequest};
use crate::{Config, Provider};

pub const CHAT_COMPLETIONS_URL: &str
  = "https://api.openai.com/v1/chat/completions";

/// Models offered for selection
pub const MODELS: [&str; 3] = ["gpt-4o-mini", "gpt-3.5-turbo", "gpt-4o"];

/// Single user message, never streamed.
pub fn build_request(config: &Config, prompt: &str)
  -> Result<HttpRequest>
{   let (model, api_key) = super::credentials(config, Provider::OpenAI)?;

    let body = ChatRequest
    {   model
      , messages: vec![ChatMessage::user(prompt)]
      , temperature: config.temperature
      , max_tokens: config.max_tokens
      , stream: None
    };
    trace!("OpenAI request body: {:?}", body);

    Ok(HttpRequest
    {   provider: Provider::OpenAI
      , url: config.endpoint(Provider::OpenAI).to_string()
      , headers: base_headers(&api_key)
      , body
      , timeout: config.request_timeout()
    })
}
