//! `POST /decisions/{decision_id}/confirm`: an operator confirms an accepted
//! candidate, who is then invited into the main space.

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
  response::{IntoResponse, Response},
};
use serde::Deserialize;
use vetting_core::{store::CaseStore, transport::Transport};

use crate::{AppState, auth::Operator, error::Result};

#[derive(Debug, Deserialize)]
pub struct ConfirmBody {
  /// User id of the operator who confirmed.
  pub confirmed_by: String,
}

/// Responds `204 No Content` when the confirmation came from the bot itself
/// and was ignored.
pub async fn confirm<S, T>(
  _: Operator,
  State(state): State<AppState<S, T>>,
  Path(decision_id): Path<String>,
  Json(body): Json<ConfirmBody>,
) -> Result<Response>
where
  S: CaseStore + 'static,
  T: Transport + 'static,
{
  let res = match state
    .service
    .confirm_admission(&decision_id, &body.confirmed_by)
    .await?
  {
    Some(case) => Json(case).into_response(),
    None => StatusCode::NO_CONTENT.into_response(),
  };
  Ok(res)
}
