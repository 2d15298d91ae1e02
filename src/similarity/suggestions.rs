//! Descriptive hints derived from ranked matches.

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::fmt;

use super::engine::SimilarityMatch;

/// A hint shown next to the ticket form. Never acted on automatically.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Suggestion {
  /// How many likely duplicates were found
  SimilarTickets(usize),
  /// Some matches carry a resolution note worth reading first
  PriorResolutions(usize),
  /// The same adjudicating body shows up repeatedly among matches
  Hotspot { body: String, count: usize },
  /// Many matches were opened recently
  Recurring { count: usize, days: i64 },
}

impl fmt::Display for Suggestion {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::SimilarTickets(1) => write!(f, "Found 1 similar ticket"),
      Self::SimilarTickets(n) => write!(f, "Found {} similar tickets", n),
      Self::PriorResolutions(n) => write!(
        f,
        "{} similar ticket(s) have a recorded resolution; check them before opening a new one",
        n
      ),
      Self::Hotspot { body, count } => write!(
        f,
        "{} appears in {} similar tickets and may be a hotspot",
        body, count
      ),
      Self::Recurring { count, days } => write!(
        f,
        "Recurring issue: {} similar tickets in the last {} days",
        count, days
      ),
    }
  }
}

/// Derive suggestions from matches already ranked by the engine.
pub fn suggest(
  matches: &[SimilarityMatch],
  now: DateTime<Utc>,
  recent_days: i64,
  recurring_min: usize,
) -> Vec<Suggestion> {
  let mut suggestions = Vec::new();
  if matches.is_empty() {
    return suggestions;
  }

  suggestions.push(Suggestion::SimilarTickets(matches.len()));

  let resolved = matches
    .iter()
    .filter(|m| m.resolution_note.as_deref().is_some_and(|n| !n.trim().is_empty()))
    .count();
  if resolved > 0 {
    suggestions.push(Suggestion::PriorResolutions(resolved));
  }

  if let Some((body, count)) = most_common_body(matches) {
    if count > 1 {
      suggestions.push(Suggestion::Hotspot { body, count });
    }
  }

  let since = now - Duration::days(recent_days);
  let recent = matches.iter().filter(|m| m.created_at >= since).count();
  if recent >= recurring_min {
    suggestions.push(Suggestion::Recurring {
      count: recent,
      days: recent_days,
    });
  }

  suggestions
}

/// Mode of `adjudicating_body`; ties go to the body seen first in rank order.
fn most_common_body(matches: &[SimilarityMatch]) -> Option<(String, usize)> {
  let mut counts: HashMap<&str, usize> = HashMap::new();
  let mut order: Vec<&str> = Vec::new();
  for body in matches
    .iter()
    .filter_map(|m| m.adjudicating_body.as_deref())
    .map(str::trim)
    .filter(|b| !b.is_empty())
  {
    let count = counts.entry(body).or_insert(0);
    if *count == 0 {
      order.push(body);
    }
    *count += 1;
  }

  let mut best: Option<(&str, usize)> = None;
  for body in order {
    let count = counts[body];
    if best.map_or(true, |(_, c)| count > c) {
      best = Some((body, count));
    }
  }
  best.map(|(body, count)| (body.to_string(), count))
}
