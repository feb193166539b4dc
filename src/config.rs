//! Settings mapping, defaults and the host configuration store

use std::path::{Path, PathBuf};
use std::time::Duration;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};
use crate::Provider;

/// Current layout of the settings mapping
pub const CONFIG_VERSION: f64 = 1.1;

pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_DEEPSEEK_MODEL: &str = "deepseek-chat";

/// Fields chosen by the user for reading and writing notes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectedFields
{   /// Field receiving the generated text
    pub output_field: String
}

impl Default for SelectedFields
{   fn default() -> Self
    {   SelectedFields
        {   output_field: "Output".to_string()
        }
    }
}

/// OmniPrompt configuration
///
/// Serialized with the key names the host configuration store uses.
/// Keys missing from a stored mapping take their default value.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config
{   #[serde(rename = "_version")]
    pub version: f64
  , #[serde(rename = "AI_PROVIDER")]
    pub provider: Provider
  , #[serde(rename = "OPENAI_API_KEY")]
    pub openai_api_key: String
  , #[serde(rename = "DEEPSEEK_API_KEY")]
    pub deepseek_api_key: String
  , #[serde(rename = "OPENAI_MODEL")]
    pub openai_model: String
  , #[serde(rename = "DEEPSEEK_MODEL")]
    pub deepseek_model: String
  , #[serde(rename = "TEMPERATURE")]
    pub temperature: f32
  , #[serde(rename = "MAX_TOKENS")]
    pub max_tokens: u32
  , #[serde(rename = "PROMPT")]
    pub prompt: String
  , #[serde(rename = "SELECTED_FIELDS")]
    pub selected_fields: SelectedFields
  , /// Ask DeepSeek for newline-delimited chunks
    #[serde(rename = "DEEPSEEK_STREAM")]
    pub deepseek_stream: bool
  , /// Per-request timeout in seconds
    #[serde(rename = "REQUEST_TIMEOUT")]
    pub request_timeout_secs: u64
  , /// Backoff factor in seconds between timed out attempts
    #[serde(rename = "RETRY_DELAY")]
    pub retry_delay_secs: u64
  , #[serde(rename = "OPENAI_ENDPOINT")]
    pub openai_endpoint: String
  , #[serde(rename = "DEEPSEEK_ENDPOINT")]
    pub deepseek_endpoint: String
}

impl Default for Config
{   fn default() -> Self
    {   Config
        {   version: CONFIG_VERSION
          , provider: Provider::OpenAI
          , openai_api_key: String::new()
          , deepseek_api_key: String::new()
          , openai_model: DEFAULT_OPENAI_MODEL.to_string()
          , deepseek_model: DEFAULT_DEEPSEEK_MODEL.to_string()
          , temperature: 0.2
          , max_tokens: 200
          , prompt: "Paste your prompt here.".to_string()
          , selected_fields: SelectedFields::default()
          , deepseek_stream: false
          , request_timeout_secs: 20
          , retry_delay_secs: 2
          , openai_endpoint
              : crate::providers::openai::CHAT_COMPLETIONS_URL
                  .to_string()
          , deepseek_endpoint
              : crate::providers::deepseek::CHAT_COMPLETIONS_URL
                  .to_string()
        }
    }
}

impl std::fmt::Debug for Config
{   fn fmt(&self, f: &mut std::fmt::Formatter<'_>)
      -> std::fmt::Result
    {   f.debug_struct("Config")
          .field("version", &self.version)
          .field("provider", &self.provider)
          .field("openai_api_key", &crate::redact::mask(&self.openai_api_key))
          .field(
            "deepseek_api_key",
            &crate::redact::mask(&self.deepseek_api_key)
          )
          .field("openai_model", &self.openai_model)
          .field("deepseek_model", &self.deepseek_model)
          .field("temperature", &self.temperature)
          .field("max_tokens", &self.max_tokens)
          .field("prompt", &self.prompt)
          .field("selected_fields", &self.selected_fields)
          .field("deepseek_stream", &self.deepseek_stream)
          .field("request_timeout_secs", &self.request_timeout_secs)
          .field("retry_delay_secs", &self.retry_delay_secs)
          .field("openai_endpoint", &self.openai_endpoint)
          .field("deepseek_endpoint", &self.deepseek_endpoint)
          .finish()
    }
}

impl Config
{   /// Build a configuration from a raw settings mapping.
    ///
    /// A mapping that does not fit the schema at all (wrong value types,
    /// a provider outside the supported set) is discarded in favour of
    /// the defaults. The result is always migrated to the current layout.
    pub fn from_value(raw: Value) -> Config
    {   let config = match serde_json::from_value::<Config>(raw)
        {   Ok(config) => config
          , Err(e) => {
              warn!("Config validation error: {}", e);
              info!("Reverting to default configuration");
              Config::default()
            }
        };
        config.migrate()
    }

    pub fn to_value(&self) -> Result<Value>
    {   Ok(serde_json::to_value(self)?)
    }

    /// Raise an older settings layout to [`CONFIG_VERSION`].
    pub fn migrate(mut self) -> Config
    {   if self.version < CONFIG_VERSION
        {   info!(
              "Migrating config from version {} to {}",
              self.version, CONFIG_VERSION
            );
            self.version = CONFIG_VERSION;
        }
        self
    }

    /// Reject values no provider accepts.
    pub fn validate(&self) -> Result<()>
    {   if !(0.0..=2.0).contains(&self.temperature)
        {   return Err(Error::InvalidConfiguration(format!(
              "temperature {} outside 0.0..=2.0", self.temperature
            )));
        }
        if self.max_tokens == 0 || self.max_tokens > 4000
        {   return Err(Error::InvalidConfiguration(format!(
              "max tokens {} outside 1..=4000", self.max_tokens
            )));
        }
        if self.request_timeout_secs == 0
        {   return Err(Error::InvalidConfiguration(
              "request timeout must be positive".to_string()
            ));
        }
        if self.selected_fields.output_field.trim().is_empty()
        {   return Err(Error::InvalidConfiguration(
              "output field must not be empty".to_string()
            ));
        }
        Ok(())
    }

    pub fn api_key(&self, provider: Provider) -> &str
    {   match provider
        {   Provider::OpenAI => &self.openai_api_key
          , Provider::DeepSeek => &self.deepseek_api_key
        }
    }

    pub fn model(&self, provider: Provider) -> &str
    {   match provider
        {   Provider::OpenAI => &self.openai_model
          , Provider::DeepSeek => &self.deepseek_model
        }
    }

    pub fn endpoint(&self, provider: Provider) -> &str
    {   match provider
        {   Provider::OpenAI => &self.openai_endpoint
          , Provider::DeepSeek => &self.deepseek_endpoint
        }
    }

    pub fn request_timeout(&self) -> Duration
    {   Duration::from_secs(self.request_timeout_secs)
    }

    /// Every non-empty credential as sent on the wire (trimmed), for
    /// scrubbing diagnostics.
    pub fn secrets(&self) -> Vec<&str>
    {   [self.openai_api_key.as_str(), self.deepseek_api_key.as_str()]
          .into_iter()
          .map(str::trim)
          .filter(|s| !s.is_empty())
          .collect()
    }

    /// Load from a store, falling back to defaults when nothing is stored.
    pub fn load(store: &dyn ConfigStore) -> Result<Config>
    {   match store.load()?
        {   Some(raw) => {
              debug!("Loaded stored configuration");
              Ok(Config::from_value(raw))
            }
          , None => {
              info!("No stored configuration, using defaults");
              Ok(Config::default())
            }
        }
    }

    /// Validate, then persist through the store.
    pub fn save(&self, store: &mut dyn ConfigStore) -> Result<()>
    {   self.validate()?;
        let value = self.to_value()?;
        store.save(&value)?;
        debug!("Configuration saved");
        Ok(())
    }
}

/// Host configuration store holding the raw settings mapping
pub trait ConfigStore
{   fn load(&self) -> Result<Option<Value>>;
    fn save(&mut self, value: &Value) -> Result<()>;
}

/// Settings mapping kept in memory
#[derive(Debug, Clone, Default)]
pub struct MemoryConfigStore
{   pub value: Option<Value>
}

impl ConfigStore for MemoryConfigStore
{   fn load(&self) -> Result<Option<Value>>
    {   Ok(self.value.clone())
    }

    fn save(&mut self, value: &Value) -> Result<()>
    {   self.value = Some(value.clone());
        Ok(())
    }
}

/// Settings mapping kept in a JSON file
#[derive(Debug, Clone)]
pub struct JsonFileConfigStore
{   path: PathBuf
}

impl JsonFileConfigStore
{   pub fn new(path: impl Into<PathBuf>) -> Self
    {   JsonFileConfigStore
        {   path: path.into()
        }
    }

    pub fn path(&self) -> &Path
    {   &self.path
    }

    /// Copy of the settings as they were before the last save
    pub fn backup_path(&self) -> PathBuf
    {   sibling(&self.path, ".bak")
    }

    /// Put the backup back in place. `false` when there is none.
    pub fn restore_backup(&mut self) -> Result<bool>
    {   let backup = self.backup_path();
        if !backup.exists()
        {   return Ok(false);
        }
        std::fs::copy(&backup, &self.path)?;
        info!("Restored configuration from {}", backup.display());
        Ok(true)
    }
}

impl ConfigStore for JsonFileConfigStore
{   fn load(&self) -> Result<Option<Value>>
    {   if !self.path.exists()
        {   return Ok(None);
        }
        let text = std::fs::read_to_string(&self.path)?;
        match serde_json::from_str(&text)
        {   Ok(value) => Ok(Some(value))
          , Err(e) => {
              warn!(
                "Ignoring unreadable config {}: {}",
                self.path.display(), e
              );
              Ok(None)
            }
        }
    }

    /// Replace the file through a sibling temp file, keeping the
    /// previous contents as a backup. A failed save leaves the
    /// existing file untouched.
    fn save(&mut self, value: &Value) -> Result<()>
    {   if let Some(parent) = self.path.parent()
        {   if !parent.as_os_str().is_empty()
            {   std::fs::create_dir_all(parent)?;
            }
        }
        let text = serde_json::to_string_pretty(value)?;

        if self.path.exists()
        {   std::fs::copy(&self.path, self.backup_path())?;
        }
        let temp = sibling(&self.path, ".tmp");
        let written = std::fs::write(&temp, text)
          .and_then(|()| std::fs::rename(&temp, &self.path));
        if let Err(e) = written
        {   warn!("Config save failed, keeping {}: {}", self.path.display(), e);
            let _ = std::fs::remove_file(&temp);
            return Err(e.into());
        }
        debug!("Wrote {}", self.path.display());
        Ok(())
    }
}

/// `path` with `suffix` appended to its file name
fn sibling(path: &Path, suffix: &str) -> PathBuf
{   let mut name = path
      .file_name()
      .map(|n| n.to_os_string())
      .unwrap_or_default();
    name.push(suffix);
    path.with_file_name(name)
}
