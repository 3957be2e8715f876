//! Error type and axum `IntoResponse` implementation.

use axum::{
  Json,
  http::{HeaderValue, StatusCode, header},
  response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("unauthorized")]
  Unauthorized,

  #[error("not found: {0}")]
  NotFound(String),

  #[error("conflict: {0}")]
  Conflict(String),

  #[error("bad request: {0}")]
  BadRequest(String),

  /// The homeserver refused or could not be reached.
  #[error("upstream error: {0}")]
  Upstream(String),

  #[error("internal error: {0}")]
  Internal(String),

  #[error("invalid configuration: {0}")]
  Config(String),
}

impl From<vetting_engine::Error> for Error {
  fn from(e: vetting_engine::Error) -> Self {
    use vetting_engine::Error as E;
    match e {
      E::InvalidCandidate(_) => Error::BadRequest(e.to_string()),
      E::NotFound(m) => Error::NotFound(m),
      E::DuplicateCase { ref case_room_id, .. } => {
        let msg = match case_room_id {
          Some(room) => format!("{e} (room {room})"),
          None => e.to_string(),
        };
        Error::Conflict(msg)
      }
      E::PollAlreadyStarted { .. } | E::CaseBusy(_) | E::AlreadyScheduled(_) => {
        Error::Conflict(e.to_string())
      }
      E::Transport(_) | E::Publish { .. } | E::TallyFetchFailed { .. } => {
        Error::Upstream(e.to_string())
      }
      E::Store(_) | E::Task(_) => Error::Internal(e.to_string()),
    }
  }
}

impl IntoResponse for Error {
  fn into_response(self) -> Response {
    let status = match &self {
      Error::Unauthorized => StatusCode::UNAUTHORIZED,
      Error::NotFound(_) => StatusCode::NOT_FOUND,
      Error::Conflict(_) => StatusCode::CONFLICT,
      Error::BadRequest(_) => StatusCode::BAD_REQUEST,
      Error::Upstream(_) => StatusCode::BAD_GATEWAY,
      Error::Internal(_) | Error::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status.is_server_error() {
      tracing::error!(error = %self, "request failed");
    }

    let mut res = (status, Json(json!({ "error": self.to_string() }))).into_response();
    if let Error::Unauthorized = self {
      res.headers_mut().insert(
        header::WWW_AUTHENTICATE,
        HeaderValue::from_static("Basic realm=\"vetting\""),
      );
    }
    res
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
