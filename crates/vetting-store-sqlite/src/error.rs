//! Error type for `vetting-store-sqlite`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("core error: {0}")]
  Core(#[from] vetting_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  /// A case already exists for this candidate.
  #[error("a vetting case already exists for {0}")]
  DuplicateCase(String),

  #[error("no vetting case for {0}")]
  NotFound(String),

  /// The case already records a poll; the first one is kept.
  #[error("a poll was already started for {0}")]
  PollAlreadyStarted(String),

  /// Closing a poll on a case that never had one would break the record's
  /// invariants.
  #[error("no poll was started for {0}")]
  PollNotStarted(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
