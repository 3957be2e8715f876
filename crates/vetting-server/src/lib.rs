//! Operator HTTP API for the vetting bot.
//!
//! Exposes an axum [`Router`] over a [`VettingService`], backed by any
//! [`CaseStore`] and [`Transport`]. Every route requires HTTP Basic auth
//! against the single configured operator account.

pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;

pub use config::ServerConfig;
pub use error::{Error, Result};

use std::sync::Arc;

use axum::{
  Router,
  routing::{get, post},
};
use tower_http::trace::TraceLayer;
use vetting_core::{store::CaseStore, transport::Transport};
use vetting_engine::service::VettingService;

use auth::AuthConfig;
use handlers::{cases, decisions};

// ─── Application state ────────────────────────────────────────────────────────

/// Shared state threaded through all axum handlers.
pub struct AppState<S, T> {
  pub service: VettingService<S, T>,
  pub auth:    Arc<AuthConfig>,
}

impl<S, T> Clone for AppState<S, T> {
  fn clone(&self) -> Self {
    Self { service: self.service.clone(), auth: self.auth.clone() }
  }
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// Build the operator API router.
pub fn router<S, T>(state: AppState<S, T>) -> Router
where
  S: CaseStore + 'static,
  T: Transport + 'static,
{
  Router::new()
    .route("/cases",                           get(cases::list::<S, T>).post(cases::open::<S, T>))
    .route("/cases/{candidate_id}",            get(cases::get_one::<S, T>))
    .route("/cases/{candidate_id}/poll",       post(cases::start_poll::<S, T>))
    .route("/decisions/{decision_id}/confirm", post(decisions::confirm::<S, T>))
    .layer(TraceLayer::new_for_http())
    .with_state(state)
}

// ─── Integration tests ────────────────────────────────────────────────────────
