//! The vetting case: one durable record per candidate.
//!
//! A case is created once, mutated when its poll starts and again when the
//! poll resolves, and never deleted.

use std::sync::LazyLock;

use chrono::{DateTime, Duration, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

// ─── Identifiers ─────────────────────────────────────────────────────────────

static USER_ID: LazyLock<Regex> = LazyLock::new(|| {
  Regex::new(
    r"^@[!-9;-~]*:((\d{1,3}\.){3}\d{1,3}|\[[0-9A-Fa-f:.]{2,45}\]|[0-9A-Za-z.-]{1,255})(:\d{1,5})?$",
  )
  .expect("user id pattern is valid")
});

/// Check that `candidate_id` is a well-formed Matrix user id
/// (`@localpart:server`).
pub fn validate_candidate_id(candidate_id: &str) -> Result<()> {
  if USER_ID.is_match(candidate_id) {
    Ok(())
  } else {
    Err(Error::InvalidCandidate(candidate_id.to_owned()))
  }
}

/// The server-name half of a user id, e.g. `example.org` for
/// `@bot:example.org`.
pub fn server_name(user_id: &str) -> Option<&str> {
  user_id.split_once(':').map(|(_, server)| server).filter(|s| !s.is_empty())
}

// ─── Case ────────────────────────────────────────────────────────────────────

/// The poll half of a case. Both fields are set in the same write, so they
/// live together.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollState {
  /// Event id of the poll-start event.
  pub poll_id:           String,
  pub voting_started_at: DateTime<Utc>,
}

/// Where a case is in its lifecycle, derived from the stored record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaseStage {
  /// Case room exists, no poll yet.
  Open,
  /// Poll started, closure not yet recorded.
  Voting,
  /// Poll closed and the outcome persisted.
  Decided,
}

/// A candidate's vetting record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VettingCase {
  pub candidate_id: String,
  /// Private discussion room; absent until room creation succeeds.
  pub case_room_id: Option<String>,
  pub created_at:   DateTime<Utc>,
  pub poll:         Option<PollState>,
  pub vote_ended:   bool,
  /// Event id of the published decision message.
  pub decision_id:  Option<String>,
}

impl VettingCase {
  pub fn new(
    candidate_id: impl Into<String>,
    case_room_id: Option<String>,
    created_at: DateTime<Utc>,
  ) -> Self {
    Self {
      candidate_id: candidate_id.into(),
      case_room_id,
      created_at,
      poll: None,
      vote_ended: false,
      decision_id: None,
    }
  }

  pub fn stage(&self) -> CaseStage {
    match (&self.poll, self.vote_ended) {
      (None, _) => CaseStage::Open,
      (Some(_), false) => CaseStage::Voting,
      (Some(_), true) => CaseStage::Decided,
    }
  }

  pub fn poll_id(&self) -> Option<&str> {
    self.poll.as_ref().map(|p| p.poll_id.as_str())
  }

  /// `true` when a poll is running and its closure has not been recorded.
  /// These are the cases recovery reschedules after a restart.
  pub fn is_pending(&self) -> bool { self.stage() == CaseStage::Voting }

  /// `voting_started_at + window`, or `None` if no poll was started.
  pub fn deadline(&self, window: Duration) -> Option<DateTime<Utc>> {
    self.poll.as_ref().map(|p| p.voting_started_at + window)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn accepts_well_formed_user_ids() {
    for id in [
      "@alice:example.org",
      "@bob.smith:matrix.example.com:8448",
      "@x:127.0.0.1",
      "@y:[::1]",
    ] {
      assert!(validate_candidate_id(id).is_ok(), "{id} should be valid");
    }
  }

  #[test]
  fn rejects_malformed_user_ids() {
    for id in ["alice:example.org", "@alice", "@alice:", "", "#room:example.org"] {
      assert!(
        matches!(validate_candidate_id(id), Err(Error::InvalidCandidate(_))),
        "{id} should be rejected"
      );
    }
  }

  #[test]
  fn server_name_splits_on_first_colon() {
    assert_eq!(server_name("@bot:example.org"), Some("example.org"));
    assert_eq!(server_name("@bot:example.org:8448"), Some("example.org:8448"));
    assert_eq!(server_name("@bot"), None);
  }

  #[test]
  fn stage_follows_poll_and_vote_ended() {
    let mut case = VettingCase::new("@c:example.org", None, Utc::now());
    assert_eq!(case.stage(), CaseStage::Open);
    assert!(!case.is_pending());

    case.poll = Some(PollState {
      poll_id:           "$poll".into(),
      voting_started_at: Utc::now(),
    });
    assert_eq!(case.stage(), CaseStage::Voting);
    assert!(case.is_pending());

    case.vote_ended = true;
    assert_eq!(case.stage(), CaseStage::Decided);
    assert!(!case.is_pending());
  }

  #[test]
  fn deadline_adds_window_to_start() {
    let started = Utc::now();
    let mut case = VettingCase::new("@c:example.org", None, started);
    assert_eq!(case.deadline(Duration::hours(1)), None);

    case.poll = Some(PollState { poll_id: "$p".into(), voting_started_at: started });
    assert_eq!(case.deadline(Duration::hours(1)), Some(started + Duration::hours(1)));
  }
}
