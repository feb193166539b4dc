//! Sequential batch runner
//!
//! A batch runs on one spawned worker task. Items are processed strictly
//! in input order and every outcome is reported as a [`BatchEvent`] on an
//! unbounded channel. The task that started the batch drains the channel
//! and is the only place note state is mutated
//! (see [`BatchHandle::apply`]).

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use log::{debug, error, info, warn};
use tokio::sync::mpsc;

use crate::error::{Error, Result};
use crate::notes::NoteStore;
use crate::{NoteId, ProgressFn};

/// One note and its fully rendered prompt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchItem
{   pub note: NoteId
  , pub prompt: String
}

/// Final tally of a batch
///
/// `processed` counts items that were started and completed, successful
/// or not. `total` is always the number of items requested, so a
/// cancelled batch reports `processed < total`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchSummary
{   pub processed: usize
  , pub total: usize
  , pub errors: usize
  , pub cancelled: bool
}

impl std::fmt::Display for BatchSummary
{   fn fmt(&self, f: &mut std::fmt::Formatter<'_>)
      -> std::fmt::Result
    {   write!(f,
          "Processing finished: {}/{} notes processed with {} errors.",
          self.processed, self.total, self.errors
        )
    }
}

/// Reported by the worker, in processing order
#[derive(Debug, Clone, PartialEq)]
pub enum BatchEvent
{   Started { total: usize }
  , Progress { note: NoteId, index: usize, percent: u8 }
  , Generated { note: NoteId, index: usize, text: String }
  , Failed { note: NoteId, index: usize, error: Error }
  , Finished(BatchSummary)
}

/// Produces text for a prompt. Progress may be reported any number of
/// times; generators that cannot estimate it simply ignore the callback.
pub trait Generate: Send + Sync + 'static
{   fn generate(
      &self
    , prompt: String
    , progress: ProgressFn
    ) -> impl Future<Output = Result<String>> + Send;
}

/// Generator from a plain `Fn(String) -> Future`
pub struct SingleFn<F>(F);

/// Generator from a `Fn(String, ProgressFn) -> Future`
pub struct ProgressFnGenerator<F>(F);

pub fn single<F, Fut>(f: F) -> SingleFn<F>
where F: Fn(String) -> Fut + Send + Sync + 'static
    , Fut: Future<Output = Result<String>> + Send
{   SingleFn(f)
}

pub fn with_progress<F, Fut>(f: F) -> ProgressFnGenerator<F>
where F: Fn(String, ProgressFn) -> Fut + Send + Sync + 'static
    , Fut: Future<Output = Result<String>> + Send
{   ProgressFnGenerator(f)
}

impl<F, Fut> Generate for SingleFn<F>
where F: Fn(String) -> Fut + Send + Sync + 'static
    , Fut: Future<Output = Result<String>> + Send
{   fn generate(
      &self
    , prompt: String
    , _progress: ProgressFn
    ) -> impl Future<Output = Result<String>> + Send
    {   (self.0)(prompt)
    }
}

impl<F, Fut> Generate for ProgressFnGenerator<F>
where F: Fn(String, ProgressFn) -> Fut + Send + Sync + 'static
    , Fut: Future<Output = Result<String>> + Send
{   fn generate(
      &self
    , prompt: String
    , progress: ProgressFn
    ) -> impl Future<Output = Result<String>> + Send
    {   (self.0)(prompt, progress)
    }
}

/// Cooperative cancellation, checked before each item starts
#[derive(Debug, Clone, Default)]
pub struct CancelHandle
{   flag: Arc<AtomicBool>
}

impl CancelHandle
{   pub fn new() -> Self
    {   CancelHandle::default()
    }

    pub fn cancel(&self)
    {   debug!("Batch cancellation requested");
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool
    {   self.flag.load(Ordering::SeqCst)
    }
}

/// Releases the single-batch slot when the worker is done
struct ActiveGuard(Arc<AtomicBool>);

impl Drop for ActiveGuard
{   fn drop(&mut self)
    {   self.0.store(false, Ordering::SeqCst);
    }
}

/// Starts batches, at most one at a time
#[derive(Debug, Clone, Default)]
pub struct BatchRunner
{   active: Arc<AtomicBool>
}

impl BatchRunner
{   pub fn new() -> Self
    {   BatchRunner::default()
    }

    pub fn is_running(&self) -> bool
    {   self.active.load(Ordering::SeqCst)
    }

    /// Spawn the worker for `items`. Must be called inside a tokio
    /// runtime. Fails with [`Error::BatchAlreadyRunning`] while another
    /// batch started by this runner is still active.
    pub fn start<G: Generate>(
      &self
    , items: Vec<BatchItem>
    , generator: Arc<G>
    ) -> Result<BatchHandle>
    {   self.start_with_cancel(items, generator, CancelHandle::new())
    }

    /// Like [`start`](Self::start) with a caller-provided cancel handle.
    pub fn start_with_cancel<G: Generate>(
      &self
    , items: Vec<BatchItem>
    , generator: Arc<G>
    , cancel: CancelHandle
    ) -> Result<BatchHandle>
    {   if self.active
          .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
          .is_err()
        {   warn!("Rejected batch: another batch is running");
            return Err(Error::BatchAlreadyRunning);
        }
        let guard = ActiveGuard(Arc::clone(&self.active));

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let worker_cancel = cancel.clone();
        let task = tokio::spawn(async move {
          run_batch(items, generator, events_tx, worker_cancel, guard).await
        });

        Ok(BatchHandle
        {   events: events_rx
          , cancel
          , task
        })
    }
}

/// Owner side of a running batch
pub struct BatchHandle
{   events: mpsc::UnboundedReceiver<BatchEvent>
  , cancel: CancelHandle
  , task: tokio::task::JoinHandle<BatchSummary>
}

impl BatchHandle
{   /// Stop before the next item; the in-flight item completes.
    pub fn cancel(&self)
    {   self.cancel.cancel();
    }

    pub fn cancel_handle(&self) -> CancelHandle
    {   self.cancel.clone()
    }

    /// Next event, `None` once the worker has finished and the channel
    /// is drained.
    pub async fn next_event(&mut self) -> Option<BatchEvent>
    {   self.events.recv().await
    }

    /// Drain every event and return the summary.
    pub async fn collect(mut self) -> Result<(Vec<BatchEvent>, BatchSummary)>
    {   let mut events = Vec::new();
        while let Some(event) = self.events.recv().await
        {   events.push(event);
        }
        let summary = self.task.await
          .map_err(|e| Error::Other(format!("batch worker failed: {}", e)))?;
        Ok((events, summary))
    }

    /// Drain events on the calling task, writing each generated text
    /// into `output_field`. `on_event` sees every event first.
    ///
    /// A note that cannot be written is logged and counted as an error
    /// in the returned summary; the batch keeps going.
    pub async fn apply<S, F>(
      mut self
    , store: &mut S
    , output_field: &str
    , mut on_event: F
    ) -> Result<BatchSummary>
    where S: NoteStore
        , F: FnMut(&BatchEvent)
    {   let mut write_errors = 0;
        while let Some(event) = self.events.recv().await
        {   on_event(&event);
            if let BatchEvent::Generated { note, text, .. } = &event
            {   if let Err(e) = store.write_field(*note, output_field, text)
                {   error!("Error updating note {}: {}", note, e);
                    write_errors += 1;
                }
            }
        }
        let mut summary = self.task.await
          .map_err(|e| Error::Other(format!("batch worker failed: {}", e)))?;
        summary.errors += write_errors;
        Ok(summary)
    }
}

/// Worker loop: one item at a time, each in its own task so a panic
/// inside a generator only fails that item.
async fn run_batch<G: Generate>(
  items: Vec<BatchItem>
, generator: Arc<G>
, events: mpsc::UnboundedSender<BatchEvent>
, cancel: CancelHandle
, guard: ActiveGuard
) -> BatchSummary
{   let total = items.len();
    info!("Starting batch of {} items", total);
    let _ = events.send(BatchEvent::Started { total });

    let mut processed = 0;
    let mut errors = 0;
    let mut cancelled = false;

    for (index, item) in items.into_iter().enumerate()
    {   if cancel.is_cancelled()
        {   info!("Batch cancelled before item {}", index + 1);
            cancelled = true;
            break;
        }
        let BatchItem { note, prompt } = item;
        debug!("Processing note {} ({}/{})", note, index + 1, total);

        let progress: ProgressFn = {
          let events = events.clone();
          Arc::new(move |percent| {
            let _ = events.send(BatchEvent::Progress { note, index, percent });
          })
        };
        let worker = Arc::clone(&generator);
        let outcome = tokio::spawn(async move {
          worker.generate(prompt, progress).await
        }).await;

        match outcome
        {   Ok(Ok(text)) => {
              let _ = events.send(BatchEvent::Progress
              {   note
                , index
                , percent: 100
              });
              let _ = events.send(BatchEvent::Generated { note, index, text });
            }
          , Ok(Err(e)) => {
              error!("Error processing note {}: {}", note, e);
              errors += 1;
              let _ = events.send(BatchEvent::Failed { note, index, error: e });
            }
          , Err(join_error) => {
              error!("Error processing note {}: {}", note, join_error);
              errors += 1;
              let _ = events.send(BatchEvent::Failed
              {   note
                , index
                , error: Error::Other(format!(
                    "generator failed: {}", join_error
                  ))
              });
            }
        }
        processed += 1;
    }

    let summary = BatchSummary
    {   processed
      , total
      , errors
      , cancelled
    };
    info!("{}", summary);
    drop(guard);
    let _ = events.send(BatchEvent::Finished(summary));
    summary
}
