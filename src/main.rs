use clap::{Parser, Subcommand};
use color_eyre::{eyre::eyre, Result};
use std::path::{Path, PathBuf};
use tracing::warn;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use ticketdesk::cache::{
  snapshot_key, CacheResult, NoopStore, SnapshotStore, SqliteStore, TicketCache,
};
use ticketdesk::config::Config;
use ticketdesk::similarity::SimilarityEngine;
use ticketdesk::tickets::types::NATIONAL_ID_DIGITS;
use ticketdesk::tickets::{RestTicketSource, TicketDraft};

#[derive(Parser, Debug)]
#[command(name = "ticketdesk")]
#[command(about = "Recent tickets and duplicate detection for the help desk")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/ticketdesk/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// List the most recent tickets
  Recent {
    #[arg(short, long, default_value_t = 10)]
    limit: usize,
  },
  /// Find the affected user last associated with an identifier
  Lookup { identifier: String },
  /// Score a draft against recent tickets
  Similar {
    #[arg(short, long)]
    title: String,
    #[arg(short, long, default_value = "")]
    description: String,
  },
  /// Open a new ticket
  Create {
    #[arg(short, long)]
    title: String,
    #[arg(short, long, default_value = "")]
    description: String,
    #[arg(long)]
    degree: Option<String>,
    #[arg(long)]
    process_number: Option<String>,
    #[arg(long)]
    adjudicating_body: Option<String>,
    /// Affected user as NAME,PROFILE,IDENTIFIER
    #[arg(long, value_delimiter = ',')]
    user: Option<Vec<String>>,
    #[arg(long)]
    origin: Option<String>,
  },
  /// Delete a ticket
  Delete { id: String },
  /// Drop the local caches
  Invalidate,
}

type Cache = TicketCache<RestTicketSource, Box<dyn SnapshotStore>>;

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();
  let config = Config::load(args.config.as_deref())?;
  let _guard = init_logging(config.log_dir.as_deref());

  let cache = open_cache(&config)?;

  match args.command {
    Command::Recent { limit } => {
      let result = cache.fetch_recent(limit).await;
      report(&result);
      for ticket in &result.data {
        println!(
          "{}  {}  [{}]  {}",
          ticket.created_at.format("%Y-%m-%d %H:%M"),
          ticket.id,
          ticket.status,
          ticket.title
        );
      }
    }
    Command::Lookup { identifier } => {
      let result = cache.find_by_identifier(&identifier).await;
      report(&result);
      match result.data {
        Some(user) => println!("{} ({}) {}", user.name, user.profile, user.identifier),
        None => println!("none"),
      }
    }
    Command::Similar { title, description } => {
      let recent = cache.fetch_recent(config.similarity.working_set).await;
      report(&recent);
      let engine = SimilarityEngine::new(config.similarity.clone());
      let analysis = engine.analyze(&title, &description, &recent.data);
      if analysis.is_empty() {
        println!("No similar tickets");
      }
      for m in &analysis.matches {
        println!("{:.2}  {}  {}", m.score, m.ticket_id, m.title);
        if let Some(note) = &m.resolution_note {
          println!("      resolution: {}", note);
        }
      }
      for suggestion in analysis.suggestion_texts() {
        println!("* {}", suggestion);
      }
    }
    Command::Create {
      title,
      description,
      degree,
      process_number,
      adjudicating_body,
      user,
      origin,
    } => {
      let mut draft = TicketDraft::new(title, description);
      if let Some(degree) = degree {
        draft = draft.with_degree(degree);
      }
      if let Some(process_number) = process_number {
        draft = draft.with_process_number(process_number);
      }
      if let Some(body) = adjudicating_body {
        draft = draft.with_adjudicating_body(body);
      }
      if let Some(origin) = origin {
        draft = draft.with_origin_ticket(origin);
      }
      match user.as_deref() {
        Some([name, profile, identifier]) => {
          draft = draft.with_affected_user(name.as_str(), profile.as_str(), identifier);
          if draft.affected_user_identifier.is_none() {
            return Err(eyre!(
              "Affected user identifier must have {} digits",
              NATIONAL_ID_DIGITS
            ));
          }
        }
        Some(_) => return Err(eyre!("--user expects NAME,PROFILE,IDENTIFIER")),
        None => {}
      }
      let record = cache.insert(&draft).await?;
      println!("Created {}", record.id);
    }
    Command::Delete { id } => {
      cache.remove(&id).await?;
      println!("Deleted {}", id);
    }
    Command::Invalidate => {
      cache.invalidate();
      println!("Local ticket caches cleared");
    }
  }

  Ok(())
}

fn open_cache(config: &Config) -> Result<Cache> {
  let source = RestTicketSource::new(&config.remote, Config::get_api_key()?)?;
  let key = config
    .cache
    .snapshot_key
    .clone()
    .unwrap_or_else(|| snapshot_key(&config.remote.url, &config.remote.table));

  let store: Box<dyn SnapshotStore> = if config.cache.persist {
    match SqliteStore::open(config.cache.database.as_deref()) {
      Ok(store) => Box::new(store),
      Err(e) => {
        warn!(error = %e, "persistent ticket cache unavailable, continuing without it");
        Box::new(NoopStore)
      }
    }
  } else {
    Box::new(NoopStore)
  };

  Ok(TicketCache::new(source, store, &config.cache, key))
}

/// Tell the user when data is stale or missing because the backend failed.
fn report<T>(result: &CacheResult<T>) {
  if let Some(warning) = warning(result) {
    eprintln!("{}", warning);
  }
}

fn warning<T>(result: &CacheResult<T>) -> Option<String> {
  let notice = result.notice.as_ref()?;
  let mut text = format!("warning: {} (serving {} data)", notice, result.source);
  if notice.is_transient() {
    text.push_str("; retrying later may succeed");
  }
  Some(text)
}

fn init_logging(log_dir: Option<&Path>) -> Option<WorkerGuard> {
  let filter =
    EnvFilter::try_from_env("TICKETDESK_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));

  match log_dir {
    Some(dir) => {
      let appender = tracing_appender::rolling::daily(dir, "ticketdesk.log");
      let (writer, guard) = tracing_appender::non_blocking(appender);
      tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false)
        .init();
      Some(guard)
    }
    None => {
      tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
      None
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use ticketdesk::SourceError;

  #[test]
  fn test_warning_hints_retry_only_for_transient_failures() {
    let fresh = CacheResult::<Vec<u8>>::empty(Vec::new(), None);
    assert!(warning(&fresh).is_none());

    let timed_out = CacheResult::<Vec<u8>>::empty(Vec::new(), Some(SourceError::Timeout));
    let text = warning(&timed_out).unwrap();
    assert!(text.contains("serving empty data"));
    assert!(text.ends_with("retrying later may succeed"));

    let rejected = CacheResult::<Vec<u8>>::empty(
      Vec::new(),
      Some(SourceError::Rejected {
        status: 401,
        message: "invalid key".to_string(),
      }),
    );
    assert!(!warning(&rejected).unwrap().contains("retrying"));
  }
}
