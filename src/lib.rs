//! Ticket cache and duplicate detection for a help-desk portal.
//!
//! [`cache::TicketCache`] answers "the N most recent tickets" from memory, a
//! persisted snapshot or the remote source, and [`similarity::SimilarityEngine`]
//! scores a ticket draft against that working set to surface likely duplicates.

pub mod cache;
pub mod config;
pub mod draft;
pub mod error;
pub mod similarity;
pub mod tickets;

#[cfg(test)]
mod testing;

pub use error::{SourceError, StoreError};
