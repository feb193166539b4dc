//! Note records, the note store and prompt rendering

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::batch::BatchItem;
use crate::error::{Error, Result};
use crate::NoteId;

/// A record with named text fields
pub trait Note
{   fn id(&self) -> NoteId;
    fn get_field(&self, name: &str) -> Option<String>;
    /// Fails with [`Error::MissingField`] for a field the note lacks.
    fn set_field(&mut self, name: &str, text: &str) -> Result<()>;
    fn field_names(&self) -> Vec<String>;
}

/// Host collection giving read/write access to notes by id
pub trait NoteStore
{   type Note: Note;

    fn get(&self, id: NoteId) -> Result<Self::Note>;
    fn update(&mut self, note: &Self::Note) -> Result<()>;

    /// Read, change one field, write back.
    fn write_field(&mut self, id: NoteId, field: &str, text: &str)
      -> Result<()>
    {   let mut note = self.get(id)?;
        note.set_field(field, text)?;
        self.update(&note)
    }
}

/// Plain in-memory note
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryNote
{   pub id: NoteId
  , pub fields: BTreeMap<String, String>
}

impl MemoryNote
{   pub fn new<I, K, V>(id: i64, fields: I) -> Self
    where I: IntoIterator<Item = (K, V)>
        , K: Into<String>
        , V: Into<String>
    {   MemoryNote
        {   id: NoteId(id)
          , fields: fields
              .into_iter()
              .map(|(k, v)| (k.into(), v.into()))
              .collect()
        }
    }
}

impl Note for MemoryNote
{   fn id(&self) -> NoteId
    {   self.id
    }

    fn get_field(&self, name: &str) -> Option<String>
    {   self.fields.get(name).cloned()
    }

    fn set_field(&mut self, name: &str, text: &str) -> Result<()>
    {   match self.fields.get_mut(name)
        {   Some(value) => {
              *value = text.to_string();
              Ok(())
            }
          , None => Err(Error::MissingField
            {   note: self.id
              , field: name.to_string()
            })
        }
    }

    fn field_names(&self) -> Vec<String>
    {   self.fields.keys().cloned().collect()
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemoryNoteStore
{   notes: BTreeMap<NoteId, MemoryNote>
}

impl MemoryNoteStore
{   pub fn new(notes: impl IntoIterator<Item = MemoryNote>) -> Self
    {   MemoryNoteStore
        {   notes: notes.into_iter().map(|n| (n.id, n)).collect()
        }
    }

    pub fn notes(&self) -> Vec<MemoryNote>
    {   self.notes.values().cloned().collect()
    }
}

impl NoteStore for MemoryNoteStore
{   type Note = MemoryNote;

    fn get(&self, id: NoteId) -> Result<MemoryNote>
    {   self.notes.get(&id).cloned().ok_or(Error::NoteNotFound(id))
    }

    fn update(&mut self, note: &MemoryNote) -> Result<()>
    {   match self.notes.get_mut(&note.id)
        {   Some(stored) => {
              *stored = note.clone();
              Ok(())
            }
          , None => Err(Error::NoteNotFound(note.id))
        }
    }
}

/// Notes kept in a JSON array file; every update is written through.
#[derive(Debug, Clone)]
pub struct JsonNoteStore
{   path: PathBuf
  , inner: MemoryNoteStore
}

impl JsonNoteStore
{   pub fn open(path: impl Into<PathBuf>) -> Result<Self>
    {   let path = path.into();
        let text = std::fs::read_to_string(&path)?;
        let notes: Vec<MemoryNote> = serde_json::from_str(&text)
          .map_err(|e| Error::Io(format!("{}: {}", path.display(), e)))?;
        debug!("Loaded {} notes from {}", notes.len(), path.display());
        Ok(JsonNoteStore
        {   path
          , inner: MemoryNoteStore::new(notes)
        })
    }

    pub fn path(&self) -> &Path
    {   &self.path
    }

    pub fn notes(&self) -> Vec<MemoryNote>
    {   self.inner.notes()
    }

    fn flush(&self) -> Result<()>
    {   let text = serde_json::to_string_pretty(&self.inner.notes())
          .map_err(|e| Error::Io(e.to_string()))?;
        std::fs::write(&self.path, text)?;
        Ok(())
    }
}

impl NoteStore for JsonNoteStore
{   type Note = MemoryNote;

    fn get(&self, id: NoteId) -> Result<MemoryNote>
    {   self.inner.get(id)
    }

    fn update(&mut self, note: &MemoryNote) -> Result<()>
    {   self.inner.update(note)?;
        self.flush()
    }
}

/// Substitute `{Field}` placeholders with the note's field values.
///
/// `{{` and `}}` produce literal braces. A `{` without a closing brace,
/// an empty `{}` and a `{` opening before another `{` are kept as
/// written.
pub fn render_prompt(template: &str, note: &impl Note) -> Result<String>
{   let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(pos) = rest.find(|c: char| c == '{' || c == '}')
    {   out.push_str(&rest[..pos]);
        let tail = &rest[pos..];

        if tail.starts_with("{{")
        {   out.push('{');
            rest = &tail[2..];
        } else if tail.starts_with("}}")
        {   out.push('}');
            rest = &tail[2..];
        } else if tail.starts_with('}')
        {   out.push('}');
            rest = &tail[1..];
        } else
        {   match tail[1..].find('}')
            {   Some(end) if end > 0 && !tail[1..=end].contains('{') => {
                  let name = &tail[1..=end];
                  let value = note.get_field(name)
                    .ok_or_else(|| Error::MissingField
                    {   note: note.id()
                      , field: name.to_string()
                    })?;
                  out.push_str(&value);
                  rest = &tail[end + 2..];
                }
              , _ => {
                  out.push('{');
                  rest = &tail[1..];
                }
            }
        }
    }
    out.push_str(rest);
    Ok(out)
}

/// Items ready for a batch plus the notes that could not be rendered
#[derive(Debug, Clone, Default)]
pub struct PreparedBatch
{   pub items: Vec<BatchItem>
  , pub skipped: Vec<Error>
}

/// Render `template` against every note, in order. Notes referencing a
/// missing field are skipped and reported, never sent.
pub fn prepare_batch<N: Note>(notes: &[N], template: &str) -> PreparedBatch
{   let mut prepared = PreparedBatch::default();
    for note in notes
    {   match render_prompt(template, note)
        {   Ok(prompt) => prepared.items.push(BatchItem
            {   note: note.id()
              , prompt
            })
          , Err(e) => {
              warn!("{}", e);
              prepared.skipped.push(e);
            }
        }
    }
    prepared
}
