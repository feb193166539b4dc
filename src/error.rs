use std::fmt;

/// Custom error type for OmniPrompt operations
/// Implements Clone for sending through channels
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error
{   /// Connectivity probe failed, no request was sent
    NoInternet
  , /// Every attempt timed out
    TimeoutExhausted { attempts: usize }
  , /// Non-timeout network failure
    Transport(String)
  , /// API answered with a non-success status
    Api { status: u16, message: String }
  , /// Response body is not the expected JSON shape
    MalformedResponse(String)
  , /// Well-formed response without any generated text
    EmptyResponse
  , /// Stream ended without a single text delta
    EmptyStreamedResponse
  , /// Provider identifier outside the supported set
    UnsupportedProvider(String)
  , /// No model configured for a provider
    MissingModel(crate::Provider)
  , /// No API key configured for a provider
    MissingApiKey(crate::Provider)
  , /// Invalid configuration
    InvalidConfiguration(String)
  , /// Prompt template references a field the note lacks
    MissingField { note: crate::NoteId, field: String }
  , /// Note not found in the store
    NoteNotFound(crate::NoteId)
  , /// A batch is already being processed
    BatchAlreadyRunning
  , /// Filesystem error
    Io(String)
  , /// Generic error
    Other(String)
}

impl Error
{   /// Short bracketed text written in place of a generated answer.
    pub fn placeholder(&self) -> String
    {   match self
        {   Error::NoInternet => "[Error: No internet]".to_string()
          , Error::TimeoutExhausted { .. } => {
              "[Error: API request failed after multiple attempts]"
                .to_string()
            }
          , Error::Transport(_) | Error::Api { .. } => {
              "[Error: API request failed]".to_string()
            }
          , Error::MalformedResponse(_) => {
              "[Error: Unexpected response format]".to_string()
            }
          , Error::EmptyResponse => {
              "[Error: Empty response message]".to_string()
            }
          , Error::EmptyStreamedResponse => {
              "[Error: Empty streamed response]".to_string()
            }
          , Error::UnsupportedProvider(_) => {
              "[Error: Invalid AI provider]".to_string()
            }
          , Error::MissingModel(provider) => {
              format!("[Error: No {} model selected]", provider.label())
            }
          , Error::MissingApiKey(provider) => {
              format!("[Error: No {} API key]", provider.label())
            }
          , other => format!("[Error: {}]", other)
        }
    }
}

impl fmt::Display for Error
{   fn fmt(&self, f: &mut fmt::Formatter<'_>)
      -> fmt::Result
    {   match self
        {   Error::NoInternet => {
              write!(f, "No internet connection")
            }
          , Error::TimeoutExhausted { attempts } => {
              write!(f,
                "Request timed out on all {} attempts",
                attempts
              )
            }
          , Error::Transport(msg) => {
              write!(f, "HTTP error: {}", msg)
            }
          , Error::Api { status, message } => {
              write!(f, "API error ({}): {}", status, message)
            }
          , Error::MalformedResponse(msg) => {
              write!(f, "Unexpected response format: {}", msg)
            }
          , Error::EmptyResponse => {
              write!(f, "API response contained no text")
            }
          , Error::EmptyStreamedResponse => {
              write!(f, "Streamed response contained no text")
            }
          , Error::UnsupportedProvider(name) => {
              write!(f, "Unsupported AI provider: {}", name)
            }
          , Error::MissingModel(provider) => {
              write!(f, "No model selected for {}", provider.label())
            }
          , Error::MissingApiKey(provider) => {
              write!(f, "Missing API key for {}", provider.label())
            }
          , Error::InvalidConfiguration(msg) => {
              write!(f, "Invalid configuration: {}", msg)
            }
          , Error::MissingField { note, field } => {
              write!(f, "Missing field {} in note {}", field, note)
            }
          , Error::NoteNotFound(id) => {
              write!(f, "Note not found: {}", id)
            }
          , Error::BatchAlreadyRunning => {
              write!(f, "A batch is already running")
            }
          , Error::Io(msg) => {
              write!(f, "I/O error: {}", msg)
            }
          , Error::Other(msg) => {
              write!(f, "Error: {}", msg)
            }
        }
    }
}

impl std::error::Error for Error {}

impl From<String> for Error
{   fn from(s: String) -> Self
    {   Error::Other(s)
    }
}

impl From<&str> for Error
{   fn from(s: &str) -> Self
    {   Error::Other(s.to_string())
    }
}

impl From<std::io::Error> for Error
{   fn from(e: std::io::Error) -> Self
    {   Error::Io(e.to_string())
    }
}

impl From<serde_json::Error> for Error
{   fn from(e: serde_json::Error) -> Self
    {   Error::InvalidConfiguration(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
