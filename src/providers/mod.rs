//! Chat-completion providers

pub mod openai;
pub mod deepseek;

use log::error;

use crate::error::{Error, Result};
use crate::{Config, Provider};

/// Model and key for `provider`, or the error naming what is missing.
fn credentials(config: &Config, provider: Provider)
  -> Result<(String, String)>
{   let model = config.model(provider).trim();
    if model.is_empty()
    {   error!("No {} model selected", provider.label());
        return Err(Error::MissingModel(provider));
    }
    let key = config.api_key(provider).trim();
    if key.is_empty()
    {   error!("No {} API key configured", provider.label());
        return Err(Error::MissingApiKey(provider));
    }
    Ok((model.to_string(), key.to_string()))
}
