//! Debounced similarity analysis for a draft being edited.
//!
//! The engine itself is pure and cheap; this module owns the scheduling:
//! an edit waits for the input to settle before scoring, and a newer edit
//! cancels any recompute that has not started yet.
//!
//! # Example
//!
//! ```ignore
//! let mut watcher = DraftWatcher::new(engine, recent.data);
//!
//! // On every keystroke
//! watcher.update(&title, &description);
//!
//! // In event loop tick
//! if watcher.poll() {
//!     render(watcher.analysis());
//! }
//! ```

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::similarity::{Analysis, SimilarityEngine};
use crate::tickets::TicketRecord;

/// The state of the latest draft analysis
#[derive(Debug, Clone, PartialEq)]
pub enum DraftState {
  /// Nothing typed yet
  Idle,
  /// Waiting for the input to settle
  Pending,
  /// Analysis for the current draft text
  Ready(Analysis),
}

/// Recomputes similarity for a draft after edits settle, last edit wins.
pub struct DraftWatcher {
  engine: SimilarityEngine,
  working_set: Arc<Vec<TicketRecord>>,
  debounce: Duration,
  settle: Duration,
  state: DraftState,
  draft: Option<(String, String)>,
  receiver: Option<mpsc::UnboundedReceiver<Analysis>>,
  task: Option<JoinHandle<()>>,
}

impl DraftWatcher {
  /// Create a watcher scoring drafts against `working_set`.
  ///
  /// Debounce and settle delays come from the engine's configuration.
  pub fn new(engine: SimilarityEngine, working_set: Vec<TicketRecord>) -> Self {
    let debounce = Duration::from_millis(engine.config().debounce_ms);
    let settle = Duration::from_millis(engine.config().settle_ms);
    Self {
      engine,
      working_set: Arc::new(working_set),
      debounce,
      settle,
      state: DraftState::Idle,
      draft: None,
      receiver: None,
      task: None,
    }
  }

  pub fn state(&self) -> &DraftState {
    &self.state
  }

  /// The latest published analysis, if the draft has settled.
  pub fn analysis(&self) -> Option<&Analysis> {
    match &self.state {
      DraftState::Ready(analysis) => Some(analysis),
      _ => None,
    }
  }

  pub fn is_pending(&self) -> bool {
    matches!(self.state, DraftState::Pending)
  }

  /// Record an edit. Unchanged text is ignored.
  pub fn update(&mut self, title: &str, description: &str) {
    if self
      .draft
      .as_ref()
      .is_some_and(|(t, d)| t == title && d == description)
    {
      return;
    }
    self.draft = Some((title.to_string(), description.to_string()));
    self.schedule();
  }

  /// Swap the tickets drafts are compared against and rescore the current draft.
  pub fn set_working_set(&mut self, working_set: Vec<TicketRecord>) {
    self.working_set = Arc::new(working_set);
    if self.draft.is_some() {
      self.schedule();
    }
  }

  /// Poll for a finished recompute.
  ///
  /// Returns `true` if the state changed. Call this in your event loop tick handler.
  pub fn poll(&mut self) -> bool {
    let receiver = match &mut self.receiver {
      Some(rx) => rx,
      None => return false,
    };

    match receiver.try_recv() {
      Ok(analysis) => {
        self.state = DraftState::Ready(analysis);
        self.receiver = None;
        self.task = None;
        true
      }
      Err(mpsc::error::TryRecvError::Empty) => false,
      Err(mpsc::error::TryRecvError::Disconnected) => {
        self.state = DraftState::Ready(Analysis::default());
        self.receiver = None;
        self.task = None;
        true
      }
    }
  }

  /// Wait for the pending recompute, if any, and publish it.
  pub async fn settled(&mut self) -> Option<&Analysis> {
    if let Some(rx) = &mut self.receiver {
      let analysis = rx.recv().await.unwrap_or_default();
      self.state = DraftState::Ready(analysis);
      self.receiver = None;
      self.task = None;
    }
    self.analysis()
  }

  fn cancel(&mut self) {
    if let Some(task) = self.task.take() {
      task.abort();
    }
    // Dropping the receiver discards a result from a pass that already started
    self.receiver = None;
  }

  fn schedule(&mut self) {
    self.cancel();

    let Some((title, description)) = self.draft.clone() else {
      self.state = DraftState::Idle;
      return;
    };

    if !self.engine.is_scorable(&title, &description) {
      self.state = DraftState::Ready(Analysis::default());
      return;
    }

    let (tx, rx) = mpsc::unbounded_channel();
    self.receiver = Some(rx);
    self.state = DraftState::Pending;

    let engine = self.engine.clone();
    let working_set = Arc::clone(&self.working_set);
    let (debounce, settle) = (self.debounce, self.settle);
    self.task = Some(tokio::spawn(async move {
      tokio::time::sleep(debounce).await;
      let analysis = engine.analyze(&title, &description, &working_set);
      debug!(matches = analysis.matches.len(), "draft analysis ready");
      if !settle.is_zero() {
        tokio::time::sleep(settle).await;
      }
      // Ignore send errors - receiver may have been dropped
      let _ = tx.send(analysis);
    }));
  }
}

impl Drop for DraftWatcher {
  fn drop(&mut self) {
    self.cancel();
  }
}

impl std::fmt::Debug for DraftWatcher {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("DraftWatcher")
      .field("state", &self.state)
      .field("working_set", &self.working_set.len())
      .field("debounce", &self.debounce)
      .finish_non_exhaustive()
  }
}
