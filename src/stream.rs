//! Accumulates text deltas from a newline-delimited chunk stream

use log::{debug, trace, warn};
use serde::Deserialize;

use crate::error::{Error, Result};
use crate::ProgressFn;

/// Sentinel closing a chunk stream
pub const DONE_SENTINEL: &str = "[DONE]";

/// Highest percentage reported while chunks keep arriving
pub const MAX_STREAM_PERCENT: u8 = 99;

#[derive(Debug, Deserialize)]
struct StreamChunk
{   #[serde(default)]
    choices: Vec<ChunkChoice>
}

#[derive(Debug, Deserialize)]
struct ChunkChoice
{   #[serde(default)]
    delta: Option<ChunkDelta>
}

#[derive(Debug, Deserialize)]
struct ChunkDelta
{   #[serde(default)]
    content: Option<String>
}

/// What a single line contributed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineOutcome
{   /// Blank, keep-alive comment or end sentinel
    Ignored
  , /// Parsed chunk; the delta may be empty
    Chunk
  , /// Not JSON, dropped
    Dropped
}

/// Consumes stream lines one at a time
pub struct StreamAccumulator
{   text: String
  , chunks: usize
  , expected_chunks: usize
  , percent: u8
  , dropped: usize
  , progress: Option<ProgressFn>
}

impl StreamAccumulator
{   /// `expected_chunks` sizes the progress estimate, usually the
    /// request's token limit since most chunks carry one token.
    pub fn new(
      expected_chunks: usize
    , progress: Option<ProgressFn>
    ) -> Self
    {   StreamAccumulator
        {   text: String::new()
          , chunks: 0
          , expected_chunks: expected_chunks.max(1)
          , percent: 0
          , dropped: 0
          , progress
        }
    }

    pub fn push_line(&mut self, raw: &str) -> LineOutcome
    {   let line = raw.trim();
        if line.is_empty() || line.starts_with(':')
        {   return LineOutcome::Ignored;
        }
        let payload = line
          .strip_prefix("data:")
          .map(str::trim_start)
          .unwrap_or(line);
        if payload.is_empty() || payload == DONE_SENTINEL
        {   return LineOutcome::Ignored;
        }

        match serde_json::from_str::<StreamChunk>(payload)
        {   Ok(chunk) => {
              if let Some(delta) = chunk.choices
                .into_iter()
                .next()
                .and_then(|c| c.delta)
                .and_then(|d| d.content)
              {   trace!("Stream delta: {:?}", delta);
                  self.text.push_str(&delta);
              }
              self.chunks += 1;
              self.report_progress();
              LineOutcome::Chunk
            }
          , Err(e) => {
              warn!("Error parsing a line from stream: {}", e);
              self.dropped += 1;
              LineOutcome::Dropped
            }
        }
    }

    fn report_progress(&mut self)
    {   let estimate = (self.chunks.saturating_mul(100)
          / self.expected_chunks)
          .min(MAX_STREAM_PERCENT as usize) as u8;
        self.percent = self.percent.max(estimate);
        if let Some(progress) = &self.progress
        {   progress(self.percent);
        }
    }

    /// Last reported estimate
    pub fn percent(&self) -> u8
    {   self.percent
    }

    pub fn chunks(&self) -> usize
    {   self.chunks
    }

    pub fn dropped(&self) -> usize
    {   self.dropped
    }

    /// Accumulated text so far
    pub fn text(&self) -> &str
    {   &self.text
    }

    /// Forget a partial body before the request is sent again.
    /// The progress estimate is kept so it never moves backwards.
    pub fn reset(&mut self)
    {   self.text.clear();
        self.chunks = 0;
        self.dropped = 0;
    }

    /// Take the trimmed text once the stream has ended. Whitespace
    /// alone counts as an empty stream.
    pub fn finish(&mut self) -> Result<String>
    {   debug!(
          "Stream ended after {} chunks ({} dropped)",
          self.chunks, self.dropped
        );
        let text = std::mem::take(&mut self.text);
        let text = text.trim();
        if text.is_empty()
        {   Err(Error::EmptyStreamedResponse)
        } else
        {   Ok(text.to_string())
        }
    }
}
