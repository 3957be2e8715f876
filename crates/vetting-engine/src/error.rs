//! Error type for `vetting-engine`.

use thiserror::Error;

/// A backend error carried across the engine boundary.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Error)]
pub enum Error {
  #[error("invalid candidate id: {0:?}")]
  InvalidCandidate(String),

  #[error("a vetting case already exists for {candidate_id}")]
  DuplicateCase {
    candidate_id: String,
    case_room_id: Option<String>,
  },

  #[error("not found: {0}")]
  NotFound(String),

  #[error("a poll has already been started for {candidate_id}: {poll_id}")]
  PollAlreadyStarted {
    candidate_id: String,
    poll_id:      String,
  },

  /// Another operator request for this candidate has not finished yet.
  #[error("another operation on {0} is still in progress")]
  CaseBusy(String),

  /// A closure for this candidate is still in flight.
  #[error("poll closure already scheduled for {0}")]
  AlreadyScheduled(String),

  /// A history page could not be fetched; nothing was published.
  #[error("failed to fetch history page {page}: {source}")]
  TallyFetchFailed {
    page:   u32,
    #[source]
    source: BoxError,
  },

  #[error("failed to publish {what}: {source}")]
  Publish {
    what:   &'static str,
    #[source]
    source: BoxError,
  },

  #[error("store error: {0}")]
  Store(#[source] BoxError),

  #[error("transport error: {0}")]
  Transport(#[source] BoxError),

  #[error("poll closure task failed: {0}")]
  Task(#[from] tokio::task::JoinError),
}

impl Error {
  pub(crate) fn store(e: impl std::error::Error + Send + Sync + 'static) -> Self {
    Error::Store(Box::new(e))
  }

  pub(crate) fn transport(e: impl std::error::Error + Send + Sync + 'static) -> Self {
    Error::Transport(Box::new(e))
  }

  pub(crate) fn publish(
    what: &'static str,
    e: impl std::error::Error + Send + Sync + 'static,
  ) -> Self {
    Error::Publish { what, source: Box::new(e) }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
