//! The authoritative ticket store, as seen by the cache.

use std::future::Future;

use crate::error::SourceError;

use super::types::{NationalId, TicketDraft, TicketRecord};

/// Remote ticket source.
///
/// Implementors return records sorted by `created_at` descending.
pub trait TicketSource: Send + Sync {
  /// The `limit` most recently created tickets, newest first.
  fn list_recent(
    &self,
    limit: usize,
  ) -> impl Future<Output = Result<Vec<TicketRecord>, SourceError>> + Send;

  /// Persist a new ticket and return it as stored.
  fn insert(
    &self,
    draft: &TicketDraft,
  ) -> impl Future<Output = Result<TicketRecord, SourceError>> + Send;

  fn delete(&self, id: &str) -> impl Future<Output = Result<(), SourceError>> + Send;

  /// Tickets whose affected user carries `identifier`, newest first,
  /// restricted to rows that also name the user and their profile.
  fn find_by_identifier(
    &self,
    identifier: &NationalId,
  ) -> impl Future<Output = Result<Vec<TicketRecord>, SourceError>> + Send;
}
