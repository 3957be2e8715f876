//! Vote counting and the accept/reject policy.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;

use crate::poll::{Answer, Vote};

// ─── Tally ───────────────────────────────────────────────────────────────────

/// Per-answer count of distinct voters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tally {
  pub yes:   u32,
  pub no:    u32,
  pub blank: u32,
}

impl Tally {
  pub fn count(&self, answer: Answer) -> u32 {
    match answer {
      Answer::Yes => self.yes,
      Answer::No => self.no,
      Answer::Blank => self.blank,
    }
  }

  fn bump(&mut self, answer: Answer) {
    match answer {
      Answer::Yes => self.yes += 1,
      Answer::No => self.no += 1,
      Answer::Blank => self.blank += 1,
    }
  }
}

/// Accumulates votes seen newest-first, counting only the first vote per
/// sender. Older votes from a sender already counted are superseded.
#[derive(Debug, Default)]
pub struct TallyBuilder {
  tally:   Tally,
  counted: HashSet<String>,
}

impl TallyBuilder {
  pub fn new() -> Self { Self::default() }

  /// Record `vote`. Returns `false` if its sender was already counted.
  pub fn record(&mut self, vote: Vote) -> bool {
    if self.counted.contains(&vote.sender) {
      return false;
    }
    self.tally.bump(vote.answer);
    self.counted.insert(vote.sender);
    true
  }

  pub fn voters(&self) -> usize { self.counted.len() }

  pub fn finish(self) -> Tally { self.tally }
}

// ─── Decision ────────────────────────────────────────────────────────────────

/// Thresholds a poll must meet for the candidate to be accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecisionPolicy {
  pub min_yes_votes: u32,
  pub max_no_votes:  u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
  Accept,
  Reject,
}

impl DecisionPolicy {
  /// Both thresholds must hold independently.
  pub fn decide(&self, tally: &Tally) -> Decision {
    if tally.yes >= self.min_yes_votes && tally.no <= self.max_no_votes {
      Decision::Accept
    } else {
      Decision::Reject
    }
  }
}

impl Decision {
  pub fn is_accept(self) -> bool { self == Decision::Accept }

  pub fn text(self) -> &'static str {
    match self {
      Decision::Accept => "Confirm inviting this person to the Federation by reacting.",
      Decision::Reject => "Votes do not match the requirements, not inviting.",
    }
  }
}

/// The announcement posted when a poll closes.
pub fn decision_message(candidate_id: &str, tally: &Tally, decision: Decision) -> String {
  let counts: String = Answer::iter()
    .map(|a| format!("\n{}: {};", a.label(), tally.count(a)))
    .collect();
  format!(
    "Voting for `{candidate_id}` has ended. Counted votes are:\n{counts}\n\n{}",
    decision.text()
  )
}

#[cfg(test)]
mod tests {
  use super::*;

  fn vote(sender: &str, answer: Answer) -> Vote {
    Vote { sender: sender.into(), answer }
  }

  const POLICY: DecisionPolicy = DecisionPolicy { min_yes_votes: 3, max_no_votes: 1 };

  #[test]
  fn first_vote_per_sender_wins() {
    let mut builder = TallyBuilder::new();
    assert!(builder.record(vote("@a:x", Answer::Yes)));
    assert!(!builder.record(vote("@a:x", Answer::No)));
    assert!(builder.record(vote("@b:x", Answer::Blank)));
    assert_eq!(builder.voters(), 2);
    assert_eq!(builder.finish(), Tally { yes: 1, no: 0, blank: 1 });
  }

  #[test]
  fn accepts_when_both_thresholds_hold() {
    let tally = Tally { yes: 3, no: 1, blank: 0 };
    assert_eq!(POLICY.decide(&tally), Decision::Accept);
  }

  #[test]
  fn rejects_on_too_many_no_votes() {
    let tally = Tally { yes: 3, no: 2, blank: 0 };
    assert_eq!(POLICY.decide(&tally), Decision::Reject);
  }

  #[test]
  fn rejects_on_too_few_yes_votes() {
    let tally = Tally { yes: 2, no: 0, blank: 5 };
    assert_eq!(POLICY.decide(&tally), Decision::Reject);
  }

  #[test]
  fn zero_thresholds_accept_empty_poll() {
    let policy = DecisionPolicy { min_yes_votes: 0, max_no_votes: 0 };
    assert_eq!(policy.decide(&Tally::default()), Decision::Accept);
  }

  #[test]
  fn decision_message_lists_counts() {
    let tally = Tally { yes: 3, no: 1, blank: 0 };
    let text = decision_message("@c:x", &tally, Decision::Accept);
    assert_eq!(
      text,
      "Voting for `@c:x` has ended. Counted votes are:\n\nYes: 3;\nNo: 1;\nBlank: 0;\n\n\
       Confirm inviting this person to the Federation by reacting."
    );
  }
}
