//! Ticket domain types and the remote source they come from.

pub mod client;
pub mod source;
pub mod types;

pub use client::RestTicketSource;
pub use source::TicketSource;
pub use types::{NationalId, TicketDraft, TicketRecord, UserSummary, OPEN_STATUS};
