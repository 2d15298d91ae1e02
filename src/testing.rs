//! Shared fixtures for unit tests.

use chrono::{DateTime, Duration, TimeZone, Utc};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::error::SourceError;
use crate::tickets::{NationalId, TicketDraft, TicketRecord, TicketSource, OPEN_STATUS};

pub fn epoch() -> DateTime<Utc> {
  Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap()
}

pub fn ticket(id: &str, title: &str, description: &str, created_at: DateTime<Utc>) -> TicketRecord {
  TicketRecord {
    id: id.to_string(),
    title: title.to_string(),
    description: description.to_string(),
    degree: None,
    process_number: None,
    adjudicating_body: None,
    affected_user_profile: None,
    affected_user_name: None,
    affected_user_identifier: None,
    origin_ticket_id: None,
    resolution_note: None,
    created_at,
    status: OPEN_STATUS.to_string(),
  }
}

/// `count` tickets, newest first, one hour apart.
pub fn tickets(count: usize) -> Vec<TicketRecord> {
  (0..count)
    .map(|i| {
      ticket(
        &format!("t-{}", i),
        &format!("Chamado {}", i),
        "",
        epoch() - Duration::hours(i as i64),
      )
    })
    .collect()
}

/// In-memory ticket source with call counters and failure switches.
#[derive(Default)]
pub struct ScriptedSource {
  rows: Mutex<Vec<TicketRecord>>,
  list_calls: AtomicUsize,
  find_calls: AtomicUsize,
  failing: AtomicBool,
  /// Delay applied to `list_recent`, in milliseconds
  delay_ms: AtomicUsize,
  next_id: AtomicUsize,
}

impl ScriptedSource {
  pub fn with_rows(rows: Vec<TicketRecord>) -> Self {
    Self {
      rows: Mutex::new(rows),
      ..Default::default()
    }
  }

  pub fn set_failing(&self, failing: bool) {
    self.failing.store(failing, Ordering::SeqCst);
  }

  pub fn set_delay_ms(&self, delay: usize) {
    self.delay_ms.store(delay, Ordering::SeqCst);
  }

  pub fn list_calls(&self) -> usize {
    self.list_calls.load(Ordering::SeqCst)
  }

  pub fn find_calls(&self) -> usize {
    self.find_calls.load(Ordering::SeqCst)
  }

  fn check(&self) -> Result<(), SourceError> {
    if self.failing.load(Ordering::SeqCst) {
      Err(SourceError::Unavailable("connection refused".to_string()))
    } else {
      Ok(())
    }
  }
}

impl TicketSource for ScriptedSource {
  async fn list_recent(&self, limit: usize) -> Result<Vec<TicketRecord>, SourceError> {
    self.list_calls.fetch_add(1, Ordering::SeqCst);
    let delay = self.delay_ms.load(Ordering::SeqCst);
    if delay > 0 {
      tokio::time::sleep(std::time::Duration::from_millis(delay as u64)).await;
    }
    self.check()?;
    let mut rows = self.rows.lock().unwrap().clone();
    rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    rows.truncate(limit);
    Ok(rows)
  }

  async fn insert(&self, draft: &TicketDraft) -> Result<TicketRecord, SourceError> {
    if self.failing.load(Ordering::SeqCst) {
      return Err(SourceError::Rejected {
        status: 409,
        message: "conflict".to_string(),
      });
    }
    let n = self.next_id.fetch_add(1, Ordering::SeqCst);
    let mut record = ticket(&format!("new-{}", n), &draft.title, &draft.description, Utc::now());
    record.affected_user_name = draft.affected_user_name.clone();
    record.affected_user_profile = draft.affected_user_profile.clone();
    record.affected_user_identifier = draft.affected_user_identifier.clone();
    self.rows.lock().unwrap().push(record.clone());
    Ok(record)
  }

  async fn delete(&self, id: &str) -> Result<(), SourceError> {
    self.check()?;
    self.rows.lock().unwrap().retain(|r| r.id != id);
    Ok(())
  }

  async fn find_by_identifier(
    &self,
    identifier: &NationalId,
  ) -> Result<Vec<TicketRecord>, SourceError> {
    self.find_calls.fetch_add(1, Ordering::SeqCst);
    self.check()?;
    let mut rows: Vec<TicketRecord> = self
      .rows
      .lock()
      .unwrap()
      .iter()
      .filter(|r| r.affected_user_identifier.as_ref() == Some(identifier))
      .filter(|r| r.affected_user_name.is_some() && r.affected_user_profile.is_some())
      .cloned()
      .collect();
    rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    rows.truncate(1);
    Ok(rows)
  }
}
