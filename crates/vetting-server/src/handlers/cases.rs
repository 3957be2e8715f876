//! Handlers for `/cases` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/cases` | Newest first |
//! | `POST` | `/cases` | Body: `{"candidate_id":"@x:y"}`; 409 if a case exists |
//! | `GET`  | `/cases/{candidate_id}` | 404 if not found |
//! | `POST` | `/cases/{candidate_id}/poll` | 409 if a poll was already started |

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
};
use serde::Deserialize;
use vetting_core::{case::VettingCase, store::CaseStore, transport::Transport};

use crate::{AppState, auth::Operator, error::Result};

// ─── List ─────────────────────────────────────────────────────────────────────

/// `GET /cases`
pub async fn list<S, T>(
  _: Operator,
  State(state): State<AppState<S, T>>,
) -> Result<Json<Vec<VettingCase>>>
where
  S: CaseStore + 'static,
  T: Transport + 'static,
{
  Ok(Json(state.service.list().await?))
}

// ─── Open ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct OpenBody {
  pub candidate_id: String,
}

/// `POST /cases`
pub async fn open<S, T>(
  _: Operator,
  State(state): State<AppState<S, T>>,
  Json(body): Json<OpenBody>,
) -> Result<impl IntoResponse>
where
  S: CaseStore + 'static,
  T: Transport + 'static,
{
  let case = state.service.open_case(&body.candidate_id).await?;
  Ok((StatusCode::CREATED, Json(case)))
}

// ─── Get one ──────────────────────────────────────────────────────────────────

/// `GET /cases/{candidate_id}`
pub async fn get_one<S, T>(
  _: Operator,
  State(state): State<AppState<S, T>>,
  Path(candidate_id): Path<String>,
) -> Result<Json<VettingCase>>
where
  S: CaseStore + 'static,
  T: Transport + 'static,
{
  Ok(Json(state.service.find(&candidate_id).await?))
}

// ─── Start poll ───────────────────────────────────────────────────────────────

/// `POST /cases/{candidate_id}/poll`
pub async fn start_poll<S, T>(
  _: Operator,
  State(state): State<AppState<S, T>>,
  Path(candidate_id): Path<String>,
) -> Result<impl IntoResponse>
where
  S: CaseStore + 'static,
  T: Transport + 'static,
{
  let case = state.service.start_poll(&candidate_id).await?;
  Ok((StatusCode::CREATED, Json(case)))
}
