//! Turning a tally into an announced, recorded decision.

use std::sync::Arc;

use vetting_core::{
  store::CaseStore,
  tally::{Decision, DecisionPolicy, Tally, decision_message},
  transport::{ROOM_MESSAGE, Transport, notice},
};

use crate::{Error, Result};

/// Reaction placed on an accepting decision so an operator can confirm the
/// admission.
pub const CONFIRM_MARKER: &str = "confirm";

/// A decision that was announced and written back to the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Published {
  pub decision:    Decision,
  /// Event id of the announcement.
  pub decision_id: String,
  /// `false` if the confirmation marker could not be attached.
  pub marked:      bool,
}

pub struct DecisionPublisher<S, T> {
  store:     Arc<S>,
  transport: Arc<T>,
  room_id:   String,
  policy:    DecisionPolicy,
}

impl<S: CaseStore, T: Transport> DecisionPublisher<S, T> {
  pub fn new(
    store: Arc<S>,
    transport: Arc<T>,
    room_id: impl Into<String>,
    policy: DecisionPolicy,
  ) -> Self {
    Self { store, transport, room_id: room_id.into(), policy }
  }

  /// Announce the outcome for `candidate_id` and close its case.
  ///
  /// If the announcement fails the case is left open. A failed confirmation
  /// marker is logged and reported, and the case is still closed.
  pub async fn publish(&self, candidate_id: &str, tally: &Tally) -> Result<Published> {
    let decision = self.policy.decide(tally);
    let text = decision_message(candidate_id, tally, decision);

    let decision_id = self
      .transport
      .send_message(&self.room_id, ROOM_MESSAGE, notice(&text))
      .await
      .map_err(|e| Error::publish("decision message", e))?;

    let mut marked = true;
    if decision.is_accept()
      && let Err(e) = self
        .transport
        .react(&self.room_id, &decision_id, CONFIRM_MARKER)
        .await
    {
      marked = false;
      tracing::error!(candidate = candidate_id, error = %e, "failed to mark decision");
      let text = format!("Unable to mark the decision for `{candidate_id}` for confirmation.");
      if let Err(e) = self
        .transport
        .send_message(&self.room_id, ROOM_MESSAGE, notice(&text))
        .await
      {
        tracing::error!(error = %e, "failed to report marker failure");
      }
    }

    self
      .store
      .close_poll(candidate_id, &decision_id)
      .await
      .map_err(Error::store)?;

    tracing::info!(candidate = candidate_id, ?decision, %decision_id, "decision published");
    Ok(Published { decision, decision_id, marked })
  }
}
