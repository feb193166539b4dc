pub mod error;
pub mod config;
pub mod redact;
pub mod connectivity;
pub mod providers;
pub mod request;
pub mod retry;
pub mod transport;
pub mod stream;
pub mod client;
pub mod notes;
pub mod templates;
pub mod batch;
use serde::{Deserialize, Serialize};

/*

omniprompt: send note field text to a chat-completion API and write
the generated answer back into a note field.

omniprompt/
├── Cargo.toml
├── src/
│   ├── lib.rs           # Shared vocabulary and re-exports
│   ├── error.rs         # Error taxonomy + bracketed placeholders
│   ├── config.rs        # Settings mapping, defaults, config store
│   ├── redact.rs        # Credential masking for log output
│   ├── connectivity.rs  # Best-effort "are we online" probe
│   ├── providers/       # OpenAI / DeepSeek payload builders
│   ├── request.rs       # Payload and HTTP request values
│   ├── retry.rs         # Attempt count and backoff schedule
│   ├── transport.rs     # HTTP seam + reqwest implementation
│   ├── stream.rs        # Streamed chunk accumulator
│   ├── client.rs        # Request sender, owns config
│   ├── notes.rs         # Note interface, store, prompt rendering
│   ├── templates.rs     # Saved prompt templates file
│   ├── batch.rs         # Sequential batch runner
│   └── bin/omniprompt.rs
└── tests/

*/

pub use batch::{
  BatchEvent, BatchHandle, BatchItem, BatchRunner, BatchSummary
, CancelHandle, Generate
};
pub use client::OmniClient;
pub use config::Config;
pub use error::{Error, Result};
pub use notes::{Note, NoteStore};

/// Progress callback: receives a percentage in 0..=100.
pub type ProgressFn = std::sync::Arc<dyn Fn(u8) + Send + Sync>;

/// LLM vendors a configuration may select.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize
)]
pub enum Provider
{   /// OpenAI chat completions
    #[serde(rename = "openai")]
    OpenAI
  , /// DeepSeek chat completions (supports streaming)
    #[serde(rename = "deepseek")]
    DeepSeek
}

impl Provider
{   pub const ALL: [Provider; 2] = [Provider::OpenAI, Provider::DeepSeek];

    /// Identifier used in the settings mapping.
    pub fn as_str(&self) -> &'static str
    {   match self
        {   Provider::OpenAI => "openai"
          , Provider::DeepSeek => "deepseek"
        }
    }

    /// Human readable vendor name.
    pub fn label(&self) -> &'static str
    {   match self
        {   Provider::OpenAI => "OpenAI"
          , Provider::DeepSeek => "DeepSeek"
        }
    }

    pub fn parse(value: &str) -> Result<Provider>
    {   Provider::ALL
          .into_iter()
          .find(|p| p.as_str().eq_ignore_ascii_case(value.trim()))
          .ok_or_else(|| {
            Error::UnsupportedProvider(value.to_string())
          })
    }

    /// Models offered for selection, default first.
    pub fn models(&self) -> &'static [&'static str]
    {   match self
        {   Provider::OpenAI => &providers::openai::MODELS
          , Provider::DeepSeek => &providers::deepseek::MODELS
        }
    }

    /// Whether the provider can answer with newline-delimited chunks.
    pub fn supports_streaming(&self) -> bool
    {   matches!(self, Provider::DeepSeek)
    }
}

impl std::fmt::Display for Provider
{   fn fmt(&self, f: &mut std::fmt::Formatter<'_>)
      -> std::fmt::Result
    {   f.write_str(self.as_str())
    }
}

/// Identifier of a note in the host collection.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord
, Deserialize, Serialize
)]
#[serde(transparent)]
pub struct NoteId(pub i64);

impl std::fmt::Display for NoteId
{   fn fmt(&self, f: &mut std::fmt::Formatter<'_>)
      -> std::fmt::Result
    {   write!(f, "{}", self.0)
    }
}
