//! Masking of credentials before anything reaches a log line

pub const REDACTED: &str = "[REDACTED]";

/// Replace a secret with the marker. Empty input stays empty so a
/// missing key is still recognisable in diagnostics.
pub fn mask(secret: &str) -> &'static str
{   if secret.is_empty()
    {   ""
    } else
    {   REDACTED
    }
}

/// Replace every occurrence of each non-empty secret in `text`.
pub fn scrub(text: &str, secrets: &[&str]) -> String
{   secrets
      .iter()
      .filter(|s| !s.is_empty())
      .fold(text.to_string(), |acc, secret| {
        acc.replace(secret, REDACTED)
      })
}

/// Header list safe to print: `Authorization` values are masked.
pub fn headers_for_log(headers: &[(String, String)])
  -> Vec<(String, String)>
{   headers
      .iter()
      .map(|(name, value)| {
        if name.eq_ignore_ascii_case("authorization")
        {   (name.clone(), REDACTED.to_string())
        } else
        {   (name.clone(), value.clone())
        }
      })
      .collect()
}
