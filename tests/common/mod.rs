#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tokio::time::Instant;

use omniprompt::connectivity::ConnectivityProbe;
use omniprompt::request::HttpRequest;
use omniprompt::stream::StreamAccumulator;
use omniprompt::transport::{Transport, TransportError};
use omniprompt::{BatchItem, Config, NoteId, Provider};

pub fn init_logger()
{   let _ = env_logger::builder().is_test(true).try_init();
}

/// What the scripted transport does on its next call
#[derive(Debug, Clone)]
pub enum Step
{   Timeout
  , Fail(String)
  , Status(u16, String)
  , Body(String)
  , Lines(Vec<String>)
}

#[derive(Default)]
struct Script
{   steps: VecDeque<Step>
  , calls: Vec<Instant>
  , requests: Vec<HttpRequest>
}

/// Transport replaying a fixed list of outcomes and recording when
/// each call happened.
#[derive(Clone, Default)]
pub struct ScriptedTransport
{   script: Arc<Mutex<Script>>
}

impl ScriptedTransport
{   pub fn new(steps: Vec<Step>) -> Self
    {   ScriptedTransport
        {   script: Arc::new(Mutex::new(Script
            {   steps: steps.into()
              , ..Script::default()
            }))
        }
    }

    pub fn calls(&self) -> usize
    {   self.script.lock().unwrap().calls.len()
    }

    /// Offsets of each call from `start`
    pub fn call_offsets(&self, start: Instant) -> Vec<std::time::Duration>
    {   self.script.lock().unwrap()
          .calls
          .iter()
          .map(|t| t.duration_since(start))
          .collect()
    }

    pub fn requests(&self) -> Vec<HttpRequest>
    {   self.script.lock().unwrap().requests.clone()
    }

    fn next(&self, request: &HttpRequest) -> Step
    {   let mut script = self.script.lock().unwrap();
        script.calls.push(Instant::now());
        script.requests.push(request.clone());
        script.steps
          .pop_front()
          .unwrap_or_else(|| Step::Fail("script exhausted".to_string()))
    }
}

impl Transport for ScriptedTransport
{   async fn post(&self, request: &HttpRequest)
      -> Result<String, TransportError>
    {   match self.next(request)
        {   Step::Timeout => Err(TransportError::Timeout)
          , Step::Fail(msg) => Err(TransportError::Other(msg))
          , Step::Status(status, body) => {
              Err(TransportError::Status { status, body })
            }
          , Step::Body(body) => Ok(body)
          , Step::Lines(lines) => Ok(lines.join("\n"))
        }
    }

    async fn post_lines(
      &self
    , request: &HttpRequest
    , sink: &mut StreamAccumulator
    ) -> Result<(), TransportError>
    {   match self.next(request)
        {   Step::Timeout => Err(TransportError::Timeout)
          , Step::Fail(msg) => Err(TransportError::Other(msg))
          , Step::Status(status, body) => {
              Err(TransportError::Status { status, body })
            }
          , Step::Body(body) => {
              for line in body.lines()
              {   sink.push_line(line);
              }
              Ok(())
            }
          , Step::Lines(lines) => {
              for line in &lines
              {   sink.push_line(line);
              }
              Ok(())
            }
        }
    }
}

/// Probe reporting no connectivity
#[derive(Debug, Clone, Copy)]
pub struct Offline;

impl ConnectivityProbe for Offline
{   async fn is_online(&self) -> bool
    {   false
    }
}

pub fn openai_config() -> Config
{   Config
    {   openai_api_key: "sk-test-openai".to_string()
      , ..Config::default()
    }
}

pub fn deepseek_config(stream: bool) -> Config
{   Config
    {   provider: Provider::DeepSeek
      , deepseek_api_key: "sk-test-deepseek".to_string()
      , deepseek_stream: stream
      , ..Config::default()
    }
}

pub fn completion(text: &str) -> String
{   serde_json::json!({
      "choices": [{ "message": { "role": "assistant", "content": text } }]
    }).to_string()
}

pub fn delta_line(text: &str) -> String
{   format!(
      "data: {}",
      serde_json::json!({ "choices": [{ "delta": { "content": text } }] })
    )
}

/// Items `p1..=pN` for notes `1..=N`
pub fn items(n: i64) -> Vec<BatchItem>
{   (1..=n)
      .map(|i| BatchItem
      {   note: NoteId(i)
        , prompt: format!("p{}", i)
      })
      .collect()
}
