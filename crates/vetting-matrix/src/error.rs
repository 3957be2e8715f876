//! Error type for `vetting-matrix`.

use reqwest::{Method, StatusCode};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("http error: {0}")]
  Http(#[from] reqwest::Error),

  /// The homeserver answered with a non-success status.
  #[error("{method} {path} returned {status}: {errcode}: {message}")]
  Api {
    method:  Method,
    path:    String,
    status:  StatusCode,
    errcode: String,
    message: String,
  },

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("invalid homeserver url: {0}")]
  InvalidUrl(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
