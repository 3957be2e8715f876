//! Operator-facing operations: opening cases, starting polls and confirming
//! admissions.
//!
//! These are the entry points behind the bot's commands. They validate
//! against the stored case, drive the transport, and hand polls to the
//! [`PollScheduler`]. At most one of them runs per candidate at a time.

use std::{
  collections::HashSet,
  sync::{Arc, Mutex, PoisonError},
};

use chrono::Utc;
use rand_core::{OsRng, RngCore};
use serde_json::json;
use vetting_core::{
  case::{VettingCase, server_name, validate_candidate_id},
  poll::{POLL_START, poll_start_content},
  store::CaseStore,
  transport::{InitialState, Transport},
};

use crate::{EngineConfig, Error, Result, scheduler::PollScheduler};

pub struct VettingService<S, T> {
  store:     Arc<S>,
  transport: Arc<T>,
  config:    Arc<EngineConfig>,
  scheduler: PollScheduler<S, T>,
  in_flight: Arc<InFlight>,
}

impl<S, T> Clone for VettingService<S, T> {
  fn clone(&self) -> Self {
    Self {
      store:     self.store.clone(),
      transport: self.transport.clone(),
      config:    self.config.clone(),
      scheduler: self.scheduler.clone(),
      in_flight: self.in_flight.clone(),
    }
  }
}

impl<S, T> VettingService<S, T>
where
  S: CaseStore + 'static,
  T: Transport + 'static,
{
  pub fn new(store: Arc<S>, transport: Arc<T>, config: Arc<EngineConfig>) -> Self {
    let scheduler = PollScheduler::new(store.clone(), transport.clone(), config.clone());
    Self { store, transport, config, scheduler, in_flight: Arc::default() }
  }

  pub fn scheduler(&self) -> &PollScheduler<S, T> { &self.scheduler }

  pub fn config(&self) -> &EngineConfig { &self.config }

  pub async fn find(&self, candidate_id: &str) -> Result<VettingCase> {
    self
      .store
      .find(candidate_id)
      .await
      .map_err(Error::store)?
      .ok_or_else(|| Error::NotFound(format!("vetting case for {candidate_id}")))
  }

  pub async fn list(&self) -> Result<Vec<VettingCase>> {
    self.store.list().await.map_err(Error::store)
  }

  /// Open a case for `candidate_id`: create a private room with the vetting
  /// room's members and the candidate, record the case, and attach the room
  /// to the vetting space.
  pub async fn open_case(&self, candidate_id: &str) -> Result<VettingCase> {
    validate_candidate_id(candidate_id)
      .map_err(|_| Error::InvalidCandidate(candidate_id.to_owned()))?;
    let _reservation = self.in_flight.reserve(candidate_id)?;

    if let Some(existing) = self.store.find(candidate_id).await.map_err(Error::store)? {
      return Err(Error::DuplicateCase {
        candidate_id: existing.candidate_id,
        case_room_id: existing.case_room_id,
      });
    }

    let rooms = &self.config.rooms;
    let mut invitees: Vec<String> = self
      .transport
      .joined_members(&rooms.vetting_room_id)
      .await
      .map_err(Error::transport)?
      .into_iter()
      .filter(|m| *m != self.config.bot_user_id && m != candidate_id)
      .collect();
    invitees.push(candidate_id.to_owned());

    let name = format!("Vetting {}", room_suffix());
    let case_room_id = self
      .transport
      .create_room(&name, &invitees, &[InitialState::encryption()])
      .await
      .map_err(Error::transport)?;

    let created = self
      .store
      .create(candidate_id.to_owned(), Some(case_room_id.clone()), Utc::now())
      .await;
    let case = match created {
      Ok(case) => case,
      Err(e) => {
        let err = Error::store(e);
        tracing::warn!(room = %case_room_id, error = %err, "case room left without a case");
        return Err(match self.store.find(candidate_id).await {
          Ok(Some(existing)) => Error::DuplicateCase {
            candidate_id: existing.candidate_id,
            case_room_id: existing.case_room_id,
          },
          _ => err,
        });
      }
    };

    tracing::info!(candidate = candidate_id, room = %case_room_id, "vetting case opened");

    let via: Vec<&str> = server_name(&self.config.bot_user_id).into_iter().collect();
    if let Err(e) = self
      .transport
      .set_room_state(
        &rooms.vetting_space_id,
        "m.space.child",
        json!({ "suggested": false, "via": via }),
        &case_room_id,
      )
      .await
    {
      tracing::error!(room = %case_room_id, error = %e, "failed to add case room to space");
    }

    Ok(case)
  }

  /// Post the poll for `candidate_id` in the vetting room, record it, and
  /// schedule its closure.
  pub async fn start_poll(&self, candidate_id: &str) -> Result<VettingCase> {
    let _reservation = self.in_flight.reserve(candidate_id)?;

    let case = self.find(candidate_id).await?;
    if let Some(poll_id) = case.poll_id() {
      return Err(Error::PollAlreadyStarted {
        candidate_id: candidate_id.to_owned(),
        poll_id:      poll_id.to_owned(),
      });
    }

    let room_id = &self.config.rooms.vetting_room_id;
    let poll_id = self
      .transport
      .send_message(room_id, POLL_START, poll_start_content(candidate_id))
      .await
      .map_err(|e| Error::publish("poll", e))?;

    let started_at = Utc::now();
    if let Err(e) = self.store.start_poll(candidate_id, &poll_id, started_at).await {
      let err = Error::store(e);
      tracing::warn!(
        candidate = candidate_id,
        %poll_id,
        error = %err,
        "posted poll was not recorded"
      );
      return Err(match self.store.find(candidate_id).await {
        Ok(Some(VettingCase { poll: Some(recorded), .. })) => Error::PollAlreadyStarted {
          candidate_id: candidate_id.to_owned(),
          poll_id:      recorded.poll_id,
        },
        _ => err,
      });
    }

    tracing::info!(candidate = candidate_id, %poll_id, "poll started");

    self
      .scheduler
      .schedule(candidate_id, &poll_id, started_at + self.config.voting_window)?;

    self.find(candidate_id).await
  }

  /// Invite the candidate behind decision `decision_id` into the main space.
  ///
  /// Confirmations by the bot itself are ignored and return `None`.
  pub async fn confirm_admission(
    &self,
    decision_id: &str,
    confirmed_by: &str,
  ) -> Result<Option<VettingCase>> {
    if confirmed_by == self.config.bot_user_id {
      return Ok(None);
    }

    let case = self
      .store
      .find_by_decision(decision_id)
      .await
      .map_err(Error::store)?
      .ok_or_else(|| Error::NotFound(format!("decision {decision_id}")))?;

    tracing::info!(
      candidate = %case.candidate_id,
      confirmed_by,
      "inviting new member to the main space"
    );
    self
      .transport
      .invite(&self.config.rooms.main_space_id, &case.candidate_id)
      .await
      .map_err(Error::transport)?;

    Ok(Some(case))
  }
}

// ─── Per-candidate reservations ──────────────────────────────────────────────

/// Candidates with an operator request in progress.
#[derive(Default)]
struct InFlight(Mutex<HashSet<String>>);

impl InFlight {
  fn held(&self) -> std::sync::MutexGuard<'_, HashSet<String>> {
    self.0.lock().unwrap_or_else(PoisonError::into_inner)
  }

  /// Claim `candidate_id` until the returned guard is dropped. Fails with
  /// [`Error::CaseBusy`] while another claim is held.
  fn reserve(self: &Arc<Self>, candidate_id: &str) -> Result<Reservation> {
    if !self.held().insert(candidate_id.to_owned()) {
      tracing::warn!(candidate = candidate_id, "request overlaps one still in progress");
      return Err(Error::CaseBusy(candidate_id.to_owned()));
    }
    Ok(Reservation { owner: self.clone(), candidate_id: candidate_id.to_owned() })
  }
}

struct Reservation {
  owner:        Arc<InFlight>,
  candidate_id: String,
}

impl Drop for Reservation {
  fn drop(&mut self) { self.owner.held().remove(&self.candidate_id); }
}

/// Four upper-case hex digits for room names.
fn room_suffix() -> String {
  let n = 0x1000 + OsRng.next_u32() % (0xFFFF - 0x1000);
  format!("{n:X}")
}
