//! REST client for the hosted ticket table.
//!
//! The backend exposes tables through a PostgREST-style API: filters go in the
//! query string (`column=eq.value`), ordering via `order=column.desc`.

use reqwest::{Client, RequestBuilder, Response};
use std::time::Duration;
use url::Url;

use crate::config::RemoteConfig;
use crate::error::SourceError;

use super::source::TicketSource;
use super::types::{NationalId, TicketDraft, TicketRecord};

/// Ticket source backed by the hosted REST API.
#[derive(Clone)]
pub struct RestTicketSource {
  http: Client,
  table_url: Url,
  api_key: String,
}

impl RestTicketSource {
  pub fn new(config: &RemoteConfig, api_key: impl Into<String>) -> Result<Self, SourceError> {
    let api_key = api_key.into();
    if config.url.trim().is_empty() || api_key.is_empty() {
      return Err(SourceError::NotConfigured);
    }

    let table_url = Self::table_url(&config.url, &config.table)?;
    let http = Client::builder()
      .timeout(Duration::from_secs(config.timeout_secs))
      .build()
      .map_err(|e| SourceError::Unavailable(format!("Failed to build HTTP client: {}", e)))?;

    Ok(Self {
      http,
      table_url,
      api_key,
    })
  }

  fn table_url(base: &str, table: &str) -> Result<Url, SourceError> {
    let raw = format!("{}/rest/v1/{}", base.trim_end_matches('/'), table);
    Url::parse(&raw)
      .map_err(|e| SourceError::Unavailable(format!("Invalid backend URL {}: {}", raw, e)))
  }

  fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
    request
      .header("apikey", &self.api_key)
      .bearer_auth(&self.api_key)
  }

  /// Check the status and decode a JSON row array.
  async fn rows(response: Response, write: bool) -> Result<Vec<TicketRecord>, SourceError> {
    let response = Self::check(response, write).await?;
    response
      .json::<Vec<TicketRecord>>()
      .await
      .map_err(|e| SourceError::Decode(e.to_string()))
  }

  /// Map a non-success status to an error.
  ///
  /// Any refused write is `Rejected`; a read failing with 5xx is `Unavailable`.
  async fn check(response: Response, write: bool) -> Result<Response, SourceError> {
    let status = response.status();
    if status.is_success() {
      return Ok(response);
    }

    let message = response.text().await.unwrap_or_default();
    if status.is_server_error() && !write {
      Err(SourceError::Unavailable(format!("{}: {}", status, message)))
    } else {
      Err(SourceError::Rejected {
        status: status.as_u16(),
        message,
      })
    }
  }
}

impl TicketSource for RestTicketSource {
  async fn list_recent(&self, limit: usize) -> Result<Vec<TicketRecord>, SourceError> {
    let limit = limit.to_string();
    let request = self.http.get(self.table_url.clone()).query(&[
      ("select", "*"),
      ("order", "created_at.desc"),
      ("limit", limit.as_str()),
    ]);

    let response = self.authorize(request).send().await?;
    Self::rows(response, false).await
  }

  async fn insert(&self, draft: &TicketDraft) -> Result<TicketRecord, SourceError> {
    let request = self
      .http
      .post(self.table_url.clone())
      .header("Prefer", "return=representation")
      .json(draft);

    let response = self.authorize(request).send().await?;
    Self::rows(response, true)
      .await?
      .into_iter()
      .next()
      .ok_or_else(|| SourceError::Decode("Insert returned no rows".to_string()))
  }

  async fn delete(&self, id: &str) -> Result<(), SourceError> {
    let filter = format!("eq.{}", id);
    let request = self
      .http
      .delete(self.table_url.clone())
      .query(&[("id", filter.as_str())]);

    let response = self.authorize(request).send().await?;
    Self::check(response, true).await?;
    Ok(())
  }

  async fn find_by_identifier(
    &self,
    identifier: &NationalId,
  ) -> Result<Vec<TicketRecord>, SourceError> {
    let filter = format!("eq.{}", identifier);
    let request = self.http.get(self.table_url.clone()).query(&[
      ("select", "*"),
      ("affected_user_identifier", filter.as_str()),
      ("affected_user_name", "not.is.null"),
      ("affected_user_profile", "not.is.null"),
      ("order", "created_at.desc"),
      ("limit", "1"),
    ]);

    let response = self.authorize(request).send().await?;
    Self::rows(response, false).await
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use tokio::io::{AsyncReadExt, AsyncWriteExt};
  use tokio::net::{TcpListener, TcpStream};
  use tokio::task::JoinHandle;

  const ROW: &str = r#"{"id":"t-9","title":"Sem acesso","created_at":"2026-03-01T10:00:00Z"}"#;
  const OTHER_ROW: &str = r#"{"id":"t-8","title":"VPN","created_at":"2026-02-28T10:00:00Z"}"#;

  fn remote(url: &str) -> RemoteConfig {
    RemoteConfig {
      url: url.to_string(),
      table: "tickets".to_string(),
      timeout_secs: 5,
    }
  }

  fn source(url: &str) -> RestTicketSource {
    RestTicketSource::new(&remote(url), "secret-key").unwrap()
  }

  /// Read one request: headers plus a `Content-Length` body.
  async fn read_request(socket: &mut TcpStream) -> String {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    loop {
      let n = socket.read(&mut chunk).await.unwrap();
      if n == 0 {
        break;
      }
      buf.extend_from_slice(&chunk[..n]);
      if let Some(end) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
        let head = String::from_utf8_lossy(&buf[..end]).to_lowercase();
        let length = head
          .lines()
          .find_map(|line| line.strip_prefix("content-length:"))
          .and_then(|v| v.trim().parse::<usize>().ok())
          .unwrap_or(0);
        if buf.len() >= end + 4 + length {
          break;
        }
      }
    }
    String::from_utf8_lossy(&buf).into_owned()
  }

  /// Answer a single request with `status` and `body`; the handle yields the raw request.
  async fn serve_once(status: &'static str, body: String) -> (String, JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("http://{}", listener.local_addr().unwrap());
    let handle = tokio::spawn(async move {
      let (mut socket, _) = listener.accept().await.unwrap();
      let request = read_request(&mut socket).await;
      let response = format!(
        "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\n\
         Connection: close\r\n\r\n{}",
        status,
        body.len(),
        body
      );
      socket.write_all(response.as_bytes()).await.unwrap();
      let _ = socket.shutdown().await;
      request
    });
    (url, handle)
  }

  fn request_line(request: &str) -> &str {
    request.lines().next().unwrap_or_default()
  }

  #[test]
  fn test_table_url_ignores_trailing_slash() {
    let a = RestTicketSource::table_url("https://desk.example.org/", "tickets").unwrap();
    let b = RestTicketSource::table_url("https://desk.example.org", "tickets").unwrap();
    assert_eq!(a.as_str(), "https://desk.example.org/rest/v1/tickets");
    assert_eq!(a, b);
  }

  #[test]
  fn test_missing_key_is_not_configured() {
    let result = RestTicketSource::new(&remote("https://desk.example.org"), "");
    assert!(matches!(result, Err(SourceError::NotConfigured)));
  }

  #[test]
  fn test_invalid_url_is_rejected() {
    let result = RestTicketSource::new(&remote("not a url"), "key");
    assert!(matches!(result, Err(SourceError::Unavailable(_))));
  }

  #[tokio::test]
  async fn test_list_recent_orders_by_creation_and_authenticates() {
    let (url, server) = serve_once("200 OK", format!("[{},{}]", ROW, OTHER_ROW)).await;

    let rows = source(&url).list_recent(30).await.unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].id, "t-9");

    let request = server.await.unwrap();
    assert_eq!(
      request_line(&request),
      "GET /rest/v1/tickets?select=*&order=created_at.desc&limit=30 HTTP/1.1"
    );
    let lower = request.to_lowercase();
    assert!(lower.contains("\r\napikey: secret-key\r\n"));
    assert!(lower.contains("\r\nauthorization: bearer secret-key\r\n"));
  }

  #[tokio::test]
  async fn test_insert_asks_for_representation_and_returns_first_row() {
    let (url, server) = serve_once("201 Created", format!("[{},{}]", ROW, OTHER_ROW)).await;

    let draft = TicketDraft::new("Sem acesso ao PJe", "erro ao autenticar");
    let record = source(&url).insert(&draft).await.unwrap();
    assert_eq!(record.id, "t-9");

    let request = server.await.unwrap();
    assert_eq!(request_line(&request), "POST /rest/v1/tickets HTTP/1.1");
    let lower = request.to_lowercase();
    assert!(lower.contains("\r\nprefer: return=representation\r\n"));
    assert!(lower.contains("\r\napikey: secret-key\r\n"));
    assert!(request.contains(r#""title":"Sem acesso ao PJe""#));
    assert!(!request.contains("degree"));
  }

  #[tokio::test]
  async fn test_insert_with_empty_representation_is_decode_error() {
    let (url, _server) = serve_once("201 Created", "[]".to_string()).await;
    let err = source(&url)
      .insert(&TicketDraft::new("Sem acesso", "erro"))
      .await
      .unwrap_err();
    assert!(matches!(err, SourceError::Decode(_)));
  }

  #[tokio::test]
  async fn test_insert_server_error_is_rejected() {
    let (url, _server) = serve_once("500 Internal Server Error", "boom".to_string()).await;
    let err = source(&url)
      .insert(&TicketDraft::new("Sem acesso", "erro"))
      .await
      .unwrap_err();
    assert_eq!(
      err,
      SourceError::Rejected {
        status: 500,
        message: "boom".to_string()
      }
    );
    assert!(!err.is_transient());
  }

  #[tokio::test]
  async fn test_insert_conflict_is_rejected() {
    let (url, _server) = serve_once("409 Conflict", "duplicate key".to_string()).await;
    let err = source(&url)
      .insert(&TicketDraft::new("Sem acesso", "erro"))
      .await
      .unwrap_err();
    assert!(matches!(err, SourceError::Rejected { status: 409, .. }));
  }

  #[tokio::test]
  async fn test_delete_filters_by_id() {
    let (url, server) = serve_once("204 No Content", String::new()).await;

    source(&url).delete("t-9").await.unwrap();

    let request = server.await.unwrap();
    assert_eq!(request_line(&request), "DELETE /rest/v1/tickets?id=eq.t-9 HTTP/1.1");
    assert!(request.to_lowercase().contains("\r\nauthorization: bearer secret-key\r\n"));
  }

  #[tokio::test]
  async fn test_delete_server_error_is_rejected() {
    let (url, _server) = serve_once("503 Service Unavailable", "down".to_string()).await;
    let err = source(&url).delete("t-9").await.unwrap_err();
    assert!(matches!(err, SourceError::Rejected { status: 503, .. }));
  }

  #[tokio::test]
  async fn test_find_by_identifier_query() {
    let (url, server) = serve_once("200 OK", format!("[{}]", ROW)).await;

    let id = NationalId::parse("123.456.789-09").unwrap();
    let rows = source(&url).find_by_identifier(&id).await.unwrap();
    assert_eq!(rows.len(), 1);

    let request = server.await.unwrap();
    let line = request_line(&request);
    assert!(line.starts_with("GET /rest/v1/tickets?select=*&"));
    assert!(line.contains("affected_user_identifier=eq.12345678909"));
    assert!(line.contains("affected_user_name=not.is.null"));
    assert!(line.contains("affected_user_profile=not.is.null"));
    assert!(line.contains("order=created_at.desc"));
    assert!(line.ends_with("limit=1 HTTP/1.1"));
  }

  #[tokio::test]
  async fn test_read_client_error_is_rejected() {
    let (url, _server) = serve_once("401 Unauthorized", "invalid key".to_string()).await;
    let err = source(&url).list_recent(30).await.unwrap_err();
    assert_eq!(
      err,
      SourceError::Rejected {
        status: 401,
        message: "invalid key".to_string()
      }
    );
  }

  #[tokio::test]
  async fn test_read_server_error_is_unavailable() {
    let (url, _server) = serve_once("502 Bad Gateway", "upstream".to_string()).await;
    let err = source(&url).list_recent(30).await.unwrap_err();
    assert!(matches!(err, SourceError::Unavailable(_)));
    assert!(err.is_transient());
  }

  #[tokio::test]
  async fn test_undecodable_rows_are_decode_errors() {
    let (url, _server) = serve_once("200 OK", "not json".to_string()).await;
    let err = source(&url).list_recent(30).await.unwrap_err();
    assert!(matches!(err, SourceError::Decode(_)));
  }

  #[tokio::test]
  async fn test_stalled_response_times_out() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("http://{}", listener.local_addr().unwrap());
    let _server = tokio::spawn(async move {
      let (socket, _) = listener.accept().await.unwrap();
      tokio::time::sleep(Duration::from_secs(10)).await;
      drop(socket);
    });

    let config = RemoteConfig {
      timeout_secs: 1,
      ..remote(&url)
    };
    let err = RestTicketSource::new(&config, "secret-key")
      .unwrap()
      .list_recent(30)
      .await
      .unwrap_err();
    assert_eq!(err, SourceError::Timeout);
  }
}
