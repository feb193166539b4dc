//! Saved prompt templates
//!
//! One plain-text file; each template opens with a `[[[name]]]` line and
//! runs until the next such line.

use std::collections::BTreeMap;
use std::path::Path;
use log::debug;

use crate::error::Result;

pub type Templates = BTreeMap<String, String>;

/// Name from a `[[[name]]]` header line
fn header_name(line: &str) -> Option<&str>
{   line.strip_prefix("[[[")
      .and_then(|rest| rest.strip_suffix("]]]"))
      .map(str::trim)
}

pub fn parse(text: &str) -> Templates
{   let mut templates = Templates::new();
    let mut current: Option<(String, Vec<&str>)> = None;

    for line in text.lines()
    {   match header_name(line)
        {   Some(name) => {
              if let Some((key, body)) = current.take()
              {   templates.insert(key, body.join("\n"));
              }
              current = Some((name.to_string(), Vec::new()));
            }
          , None => {
              if let Some((_, body)) = current.as_mut()
              {   body.push(line);
              }
            }
        }
    }
    if let Some((key, body)) = current
    {   templates.insert(key, body.join("\n"));
    }
    templates
}

/// Templates sorted by name, each body followed by a blank line.
pub fn render(templates: &Templates) -> String
{   templates
      .iter()
      .map(|(name, body)| format!("[[[{}]]]\n{}\n\n", name, body))
      .collect()
}

/// Missing file reads as no templates.
pub fn load(path: &Path) -> Result<Templates>
{   if !path.exists()
    {   debug!("No template file at {}", path.display());
        return Ok(Templates::new());
    }
    let text = std::fs::read_to_string(path)?;
    let templates = parse(&text);
    debug!("Loaded {} templates from {}", templates.len(), path.display());
    Ok(templates)
}

pub fn save(path: &Path, templates: &Templates) -> Result<()>
{   if let Some(parent) = path.parent()
    {   if !parent.as_os_str().is_empty()
        {   std::fs::create_dir_all(parent)?;
        }
    }
    std::fs::write(path, render(templates))?;
    Ok(())
}
