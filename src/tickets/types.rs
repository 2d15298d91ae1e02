//! Domain types for help-desk tickets.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Status assigned to tickets the source returns without one.
pub const OPEN_STATUS: &str = "open";

/// Number of digits in a normalized affected-user identifier.
pub const NATIONAL_ID_DIGITS: usize = 11;

/// Affected-user identifier, always exactly 11 ASCII digits.
///
/// The only way to build one is [`NationalId::parse`], which strips
/// punctuation ("123.456.789-09") and rejects any other digit count.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct NationalId(String);

impl NationalId {
  pub fn parse(raw: &str) -> Option<Self> {
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.len() == NATIONAL_ID_DIGITS {
      Some(Self(digits))
    } else {
      None
    }
  }

  pub fn as_str(&self) -> &str {
    &self.0
  }
}

impl TryFrom<String> for NationalId {
  type Error = String;

  fn try_from(value: String) -> Result<Self, Self::Error> {
    Self::parse(&value)
      .ok_or_else(|| format!("expected {} digits, got '{}'", NATIONAL_ID_DIGITS, value))
  }
}

impl From<NationalId> for String {
  fn from(id: NationalId) -> Self {
    id.0
  }
}

impl fmt::Display for NationalId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

/// Records coming back from the source may carry legacy identifiers that
/// never passed normalization; those are dropped instead of failing the row.
fn lenient_national_id<'de, D>(deserializer: D) -> Result<Option<NationalId>, D::Error>
where
  D: Deserializer<'de>,
{
  let raw: Option<String> = Option::deserialize(deserializer)?;
  Ok(raw.as_deref().and_then(NationalId::parse))
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
  D: Deserializer<'de>,
{
  Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

fn default_status() -> String {
  OPEN_STATUS.to_string()
}

fn null_as_open<'de, D>(deserializer: D) -> Result<String, D::Error>
where
  D: Deserializer<'de>,
{
  Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_else(default_status))
}

/// One help-desk ticket as stored by the remote source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TicketRecord {
  pub id: String,
  pub title: String,
  #[serde(default, deserialize_with = "null_as_empty")]
  pub description: String,
  #[serde(default)]
  pub degree: Option<String>,
  #[serde(default)]
  pub process_number: Option<String>,
  #[serde(default)]
  pub adjudicating_body: Option<String>,
  #[serde(default)]
  pub affected_user_profile: Option<String>,
  #[serde(default)]
  pub affected_user_name: Option<String>,
  #[serde(default, deserialize_with = "lenient_national_id")]
  pub affected_user_identifier: Option<NationalId>,
  #[serde(default)]
  pub origin_ticket_id: Option<String>,
  /// Free-text note left when the ticket was resolved
  #[serde(default)]
  pub resolution_note: Option<String>,
  pub created_at: DateTime<Utc>,
  #[serde(default = "default_status", deserialize_with = "null_as_open")]
  pub status: String,
}

impl TicketRecord {
  /// Title and description joined, as scored by the similarity engine.
  pub fn text(&self) -> String {
    format!("{} {}", self.title, self.description)
  }

  /// Summary of the affected user, if the record names one completely.
  pub fn user_summary(&self) -> Option<UserSummary> {
    Some(UserSummary {
      name: self.affected_user_name.clone().filter(|n| !n.trim().is_empty())?,
      profile: self
        .affected_user_profile
        .clone()
        .filter(|p| !p.trim().is_empty())?,
      identifier: self.affected_user_identifier.clone()?,
    })
  }
}

/// Fields supplied when opening a new ticket.
///
/// The source assigns `id`, `created_at` and `status`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TicketDraft {
  pub title: String,
  pub description: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub degree: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub process_number: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub adjudicating_body: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub affected_user_profile: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub affected_user_name: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub affected_user_identifier: Option<NationalId>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub origin_ticket_id: Option<String>,
}

impl TicketDraft {
  pub fn new(title: impl Into<String>, description: impl Into<String>) -> Self {
    Self {
      title: title.into(),
      description: description.into(),
      ..Default::default()
    }
  }

  /// Attach the affected user. An identifier that does not normalize to
  /// 11 digits is dropped; name and profile are kept.
  pub fn with_affected_user(
    mut self,
    name: impl Into<String>,
    profile: impl Into<String>,
    identifier: &str,
  ) -> Self {
    self.affected_user_name = Some(name.into());
    self.affected_user_profile = Some(profile.into());
    self.affected_user_identifier = NationalId::parse(identifier);
    self
  }

  pub fn with_degree(mut self, degree: impl Into<String>) -> Self {
    self.degree = Some(degree.into());
    self
  }

  pub fn with_process_number(mut self, process_number: impl Into<String>) -> Self {
    self.process_number = Some(process_number.into());
    self
  }

  pub fn with_adjudicating_body(mut self, body: impl Into<String>) -> Self {
    self.adjudicating_body = Some(body.into());
    self
  }

  pub fn with_origin_ticket(mut self, origin: impl Into<String>) -> Self {
    self.origin_ticket_id = Some(origin.into());
    self
  }
}

/// Who a past ticket was opened for; used to prefill new drafts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSummary {
  pub name: String,
  pub profile: String,
  pub identifier: NationalId,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_national_id_strips_punctuation() {
    let id = NationalId::parse("123.456.789-09").unwrap();
    assert_eq!(id.as_str(), "12345678909");
  }

  #[test]
  fn test_national_id_rejects_wrong_length() {
    assert!(NationalId::parse("123").is_none());
    assert!(NationalId::parse("123456789012").is_none());
    assert!(NationalId::parse("").is_none());
  }

  #[test]
  fn test_record_defaults_and_unknown_fields() {
    let json = r#"{
      "id": "t-1",
      "title": "Impressora parada",
      "created_at": "2026-03-01T10:00:00Z",
      "description": null,
      "some_new_column": 42
    }"#;
    let record: TicketRecord = serde_json::from_str(json).unwrap();
    assert_eq!(record.status, OPEN_STATUS);
    assert_eq!(record.description, "");
    assert!(record.affected_user_identifier.is_none());
  }

  #[test]
  fn test_record_drops_malformed_identifier() {
    let json = r#"{
      "id": "t-2",
      "title": "Acesso negado",
      "created_at": "2026-03-01T10:00:00Z",
      "affected_user_identifier": "12345"
    }"#;
    let record: TicketRecord = serde_json::from_str(json).unwrap();
    assert!(record.affected_user_identifier.is_none());
  }

  #[test]
  fn test_user_summary_requires_all_fields() {
    let json = r#"{
      "id": "t-3",
      "title": "Senha expirada",
      "created_at": "2026-03-01T10:00:00Z",
      "affected_user_name": "Maria",
      "affected_user_profile": "",
      "affected_user_identifier": "12345678909"
    }"#;
    let record: TicketRecord = serde_json::from_str(json).unwrap();
    assert!(record.user_summary().is_none());
  }

  #[test]
  fn test_draft_serializes_only_present_fields() {
    let draft =
      TicketDraft::new("Erro de login", "").with_affected_user("Ana", "servidor", "987.654.321-00");
    let value = serde_json::to_value(&draft).unwrap();
    assert_eq!(value["affected_user_identifier"], "98765432100");
    assert!(value.get("degree").is_none());
  }
}
