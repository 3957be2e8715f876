//! Encoding and decoding helpers between domain types and SQLite columns.
//!
//! All timestamps are stored as fixed-width RFC 3339 strings so that they sort
//! lexically.

use chrono::{DateTime, SecondsFormat, Utc};
use vetting_core::case::{PollState, VettingCase};

use crate::{Error, Result};

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Column list matching [`RawCase::from_row`].
pub const CASE_COLUMNS: &str = "candidate_id, case_room_id, created_at, poll_id, \
                                voting_started_at, vote_ended, decision_id";

/// Raw values read directly from a `cases` row.
pub struct RawCase {
  pub candidate_id:      String,
  pub case_room_id:      Option<String>,
  pub created_at:        String,
  pub poll_id:           Option<String>,
  pub voting_started_at: Option<String>,
  pub vote_ended:        bool,
  pub decision_id:       Option<String>,
}

impl RawCase {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(RawCase {
      candidate_id:      row.get(0)?,
      case_room_id:      row.get(1)?,
      created_at:        row.get(2)?,
      poll_id:           row.get(3)?,
      voting_started_at: row.get(4)?,
      vote_ended:        row.get(5)?,
      decision_id:       row.get(6)?,
    })
  }

  pub fn into_case(self) -> Result<VettingCase> {
    let poll = match (self.poll_id, self.voting_started_at) {
      (Some(poll_id), Some(at)) => Some(PollState {
        poll_id,
        voting_started_at: decode_dt(&at)?,
      }),
      (None, None) => None,
      _ => {
        return Err(vetting_core::Error::InconsistentPoll(self.candidate_id).into());
      }
    };

    Ok(VettingCase {
      created_at: decode_dt(&self.created_at)?,
      candidate_id: self.candidate_id,
      case_room_id: self.case_room_id,
      poll,
      vote_ended: self.vote_ended,
      decision_id: self.decision_id,
    })
  }
}
