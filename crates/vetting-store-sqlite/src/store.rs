//! [`SqliteStore`], the SQLite implementation of [`CaseStore`].

use std::path::Path;

use chrono::{DateTime, Utc};
use rusqlite::OptionalExtension as _;

use vetting_core::{case::VettingCase, store::CaseStore};

use crate::{
  Error, Result,
  encode::{CASE_COLUMNS, RawCase, encode_dt},
  schema::SCHEMA,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A vetting case store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store, for tests.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Fetch at most one case matching `column = value`.
  async fn find_one(&self, column: &'static str, value: String) -> Result<Option<VettingCase>> {
    let raw: Option<RawCase> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!("SELECT {CASE_COLUMNS} FROM cases WHERE {column} = ?1"),
              rusqlite::params![value],
              RawCase::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawCase::into_case).transpose()
  }

  /// Fetch every case matching `filter` (a SQL `WHERE` fragment).
  async fn find_all(&self, filter: &'static str) -> Result<Vec<VettingCase>> {
    let raws: Vec<RawCase> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {CASE_COLUMNS} FROM cases WHERE {filter} ORDER BY created_at DESC"
        ))?;
        let rows = stmt
          .query_map([], RawCase::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawCase::into_case).collect()
  }

  async fn exists(&self, candidate_id: String) -> Result<bool> {
    let exists = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT 1 FROM cases WHERE candidate_id = ?1",
              rusqlite::params![candidate_id],
              |_| Ok(true),
            )
            .optional()?
            .unwrap_or(false),
        )
      })
      .await?;
    Ok(exists)
  }
}

// ─── CaseStore impl ──────────────────────────────────────────────────────────

impl CaseStore for SqliteStore {
  type Error = Error;

  async fn create(
    &self,
    candidate_id: String,
    case_room_id: Option<String>,
    created_at:   DateTime<Utc>,
  ) -> Result<VettingCase> {
    let case = VettingCase::new(candidate_id, case_room_id, created_at);

    let id_str   = case.candidate_id.clone();
    let room_str = case.case_room_id.clone();
    let at_str   = encode_dt(case.created_at);

    let inserted = self
      .conn
      .call(move |conn| {
        let changed = conn.execute(
          "INSERT INTO cases (candidate_id, case_room_id, created_at)
           VALUES (?1, ?2, ?3)
           ON CONFLICT (candidate_id) DO NOTHING",
          rusqlite::params![id_str, room_str, at_str],
        )?;
        Ok(changed == 1)
      })
      .await?;

    if !inserted {
      return Err(Error::DuplicateCase(case.candidate_id));
    }

    tracing::debug!(candidate = %case.candidate_id, "case stored");
    Ok(case)
  }

  async fn find(&self, candidate_id: &str) -> Result<Option<VettingCase>> {
    self.find_one("candidate_id", candidate_id.to_owned()).await
  }

  async fn find_by_decision(&self, decision_id: &str) -> Result<Option<VettingCase>> {
    self.find_one("decision_id", decision_id.to_owned()).await
  }

  async fn list(&self) -> Result<Vec<VettingCase>> { self.find_all("1 = 1").await }

  async fn start_poll(
    &self,
    candidate_id:      &str,
    poll_id:           &str,
    voting_started_at: DateTime<Utc>,
  ) -> Result<()> {
    let id_str   = candidate_id.to_owned();
    let poll_str = poll_id.to_owned();
    let at_str   = encode_dt(voting_started_at);

    let changed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "UPDATE cases SET poll_id = ?2, voting_started_at = ?3
           WHERE candidate_id = ?1 AND poll_id IS NULL",
          rusqlite::params![id_str, poll_str, at_str],
        )?)
      })
      .await?;

    if changed == 0 {
      return Err(match self.find(candidate_id).await? {
        Some(_) => Error::PollAlreadyStarted(candidate_id.to_owned()),
        None => Error::NotFound(candidate_id.to_owned()),
      });
    }
    Ok(())
  }

  async fn list_pending(&self) -> Result<Vec<VettingCase>> {
    self.find_all("poll_id IS NOT NULL AND vote_ended = 0").await
  }

  async fn close_poll(&self, candidate_id: &str, decision_id: &str) -> Result<()> {
    let id_str       = candidate_id.to_owned();
    let decision_str = decision_id.to_owned();

    let changed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "UPDATE cases SET vote_ended = 1, decision_id = ?2
           WHERE candidate_id = ?1 AND poll_id IS NOT NULL",
          rusqlite::params![id_str, decision_str],
        )?)
      })
      .await?;

    if changed == 0 {
      return if self.exists(candidate_id.to_owned()).await? {
        Err(Error::PollNotStarted(candidate_id.to_owned()))
      } else {
        Err(Error::NotFound(candidate_id.to_owned()))
      };
    }
    Ok(())
  }
}
