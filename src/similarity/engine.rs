//! Duplicate detection for ticket drafts.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::cmp::Ordering;
use std::sync::Arc;

use crate::cache::{Clock, SystemClock};
use crate::config::SimilarityConfig;
use crate::tickets::TicketRecord;

use super::suggestions::{suggest, Suggestion};
use super::tokens::{dice, tokenize};

/// A historical ticket scored against the current draft.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimilarityMatch {
  pub ticket_id: String,
  /// Dice overlap in `[0, 1]`
  pub score: f64,
  pub title: String,
  pub description: String,
  pub adjudicating_body: Option<String>,
  pub status: String,
  pub created_at: DateTime<Utc>,
  pub resolution_note: Option<String>,
}

impl SimilarityMatch {
  fn new(ticket: &TicketRecord, score: f64) -> Self {
    Self {
      ticket_id: ticket.id.clone(),
      score,
      title: ticket.title.clone(),
      description: ticket.description.clone(),
      adjudicating_body: ticket.adjudicating_body.clone(),
      status: ticket.status.clone(),
      created_at: ticket.created_at,
      resolution_note: ticket.resolution_note.clone(),
    }
  }

  /// Score descending, then newest first, then id for a total order.
  fn rank(a: &Self, b: &Self) -> Ordering {
    b.score
      .total_cmp(&a.score)
      .then_with(|| b.created_at.cmp(&a.created_at))
      .then_with(|| a.ticket_id.cmp(&b.ticket_id))
  }
}

/// Ranked matches and hints for one draft.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Analysis {
  pub matches: Vec<SimilarityMatch>,
  pub suggestions: Vec<Suggestion>,
}

impl Analysis {
  pub fn is_empty(&self) -> bool {
    self.matches.is_empty()
  }

  pub fn suggestion_texts(&self) -> Vec<String> {
    self.suggestions.iter().map(ToString::to_string).collect()
  }
}

/// Scores drafts against a working set of cached tickets.
///
/// Holds configuration only; every call is independent and does no I/O.
#[derive(Clone)]
pub struct SimilarityEngine {
  config: SimilarityConfig,
  clock: Arc<dyn Clock>,
}

impl SimilarityEngine {
  pub fn new(config: SimilarityConfig) -> Self {
    Self {
      config,
      clock: Arc::new(SystemClock),
    }
  }

  /// Replace the time source used for the recurrence window.
  pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
    self.clock = clock;
    self
  }

  pub fn config(&self) -> &SimilarityConfig {
    &self.config
  }

  /// Whether a draft is long enough to be worth scoring.
  pub fn is_scorable(&self, title: &str, description: &str) -> bool {
    let length = title.trim().chars().count() + description.trim().chars().count();
    length >= self.config.min_draft_chars
  }

  /// Rank `working_set` against the draft and derive suggestions.
  ///
  /// Drafts below the minimum length yield an empty analysis.
  pub fn analyze(&self, title: &str, description: &str, working_set: &[TicketRecord]) -> Analysis {
    if !self.is_scorable(title, description) {
      return Analysis::default();
    }

    let query = tokenize(&format!("{} {}", title, description), self.config.min_token_chars);
    if query.is_empty() {
      return Analysis::default();
    }

    let mut matches: Vec<SimilarityMatch> = working_set
      .iter()
      .filter_map(|ticket| {
        let candidate = tokenize(&ticket.text(), self.config.min_token_chars);
        let score = dice(&query, &candidate);
        (score > self.config.threshold).then(|| SimilarityMatch::new(ticket, score))
      })
      .collect();

    matches.sort_by(SimilarityMatch::rank);
    matches.truncate(self.config.max_matches);

    let suggestions = suggest(
      &matches,
      self.clock.now(),
      self.config.recent_window_days,
      self.config.recurring_min,
    );

    Analysis {
      matches,
      suggestions,
    }
  }
}

impl Default for SimilarityEngine {
  fn default() -> Self {
    Self::new(SimilarityConfig::default())
  }
}

impl std::fmt::Debug for SimilarityEngine {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("SimilarityEngine")
      .field("config", &self.config)
      .finish_non_exhaustive()
  }
}
