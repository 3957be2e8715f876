//! Error types for `vetting-core`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("invalid candidate id: {0:?}")]
  InvalidCandidate(String),

  #[error("poll state is inconsistent for {0}: poll id and start time must be set together")]
  InconsistentPoll(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
