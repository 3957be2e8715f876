//! Poll wire format (MSC3381 unstable polls) and response classification.
//!
//! Polls are plain room events. A poll is identified by the event id of its
//! start event; responses and the end marker point at it through
//! `m.relates_to.event_id`.

use serde_json::{Value, json};
use strum::{EnumIter, EnumString, IntoEnumIterator, IntoStaticStr};

use crate::transport::HistoryEvent;

pub const POLL_START: &str = "org.matrix.msc3381.poll.start";
pub const POLL_RESPONSE: &str = "org.matrix.msc3381.poll.response";
pub const POLL_END: &str = "org.matrix.msc3381.poll.end";

const POLL_KIND_DISCLOSED: &str = "org.matrix.msc3381.poll.disclosed";
const TEXT: &str = "org.matrix.msc1767.text";

// ─── Answers ─────────────────────────────────────────────────────────────────

/// The fixed answer set of a vetting poll.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  EnumIter,
  EnumString,
  IntoStaticStr,
)]
#[strum(serialize_all = "lowercase")]
pub enum Answer {
  Yes,
  No,
  Blank,
}

impl Answer {
  /// Title-cased label shown to voters.
  pub fn label(self) -> &'static str {
    match self {
      Answer::Yes => "Yes",
      Answer::No => "No",
      Answer::Blank => "Blank",
    }
  }
}

// ─── Outgoing content ────────────────────────────────────────────────────────

pub fn poll_question(candidate_id: &str) -> String {
  format!("Accept {candidate_id} into the Federation?")
}

/// Content of the poll-start event for `candidate_id`.
pub fn poll_start_content(candidate_id: &str) -> Value {
  let question = poll_question(candidate_id);
  let choices: String = Answer::iter()
    .enumerate()
    .map(|(i, a)| format!("\n{}. {}", i + 1, a.label()))
    .collect();
  let answers: Vec<Value> = Answer::iter()
    .map(|a| {
      let id: &'static str = a.into();
      json!({ "id": id, TEXT: a.label() })
    })
    .collect();

  json!({
    TEXT: format!("{question}{choices}"),
    POLL_START: {
      "kind": POLL_KIND_DISCLOSED,
      "max_selections": 1,
      "question": { TEXT: question },
      "answers": answers,
    },
  })
}

/// Content of the poll-end marker referencing `poll_id`.
pub fn poll_end_content(poll_id: &str) -> Value {
  json!({
    "m.relates_to": {
      "rel_type": "m.reference",
      "event_id": poll_id,
    }
  })
}

// ─── Classification ──────────────────────────────────────────────────────────

/// A counted response: who voted, and for what.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Vote {
  pub sender: String,
  pub answer: Answer,
}

/// Why a history event did not yield a vote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
  /// Not a poll response at all.
  NotAResponse,
  /// A response to some other poll.
  OtherPoll,
  /// A response missing the relation, the answer list, or the sender, or
  /// naming an answer outside the fixed set.
  Malformed,
}

/// Result of inspecting one history event against a poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classified {
  Response(Vote),
  Skip(SkipReason),
}

/// Classify `event` as a response to `poll_id`, or say why it is skipped.
pub fn classify(event: &HistoryEvent, poll_id: &str) -> Classified {
  if event.event_type != POLL_RESPONSE {
    return Classified::Skip(SkipReason::NotAResponse);
  }

  let Some(related) = event
    .content
    .pointer("/m.relates_to/event_id")
    .and_then(Value::as_str)
  else {
    return Classified::Skip(SkipReason::Malformed);
  };
  if related != poll_id {
    return Classified::Skip(SkipReason::OtherPoll);
  }

  let answer = event
    .content
    .get(POLL_RESPONSE)
    .and_then(|r| r.get("answers"))
    .and_then(|a| a.get(0))
    .and_then(Value::as_str)
    .and_then(|id| id.parse::<Answer>().ok());

  match answer {
    Some(answer) if !event.sender.is_empty() => Classified::Response(Vote {
      sender: event.sender.clone(),
      answer,
    }),
    _ => Classified::Skip(SkipReason::Malformed),
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn response(sender: &str, poll_id: &str, answer: &str) -> HistoryEvent {
    HistoryEvent {
      event_id:   format!("$resp-{sender}"),
      sender:     sender.into(),
      event_type: POLL_RESPONSE.into(),
      content:    json!({
        "m.relates_to": { "rel_type": "m.reference", "event_id": poll_id },
        POLL_RESPONSE: { "answers": [answer] },
      }),
    }
  }

  #[test]
  fn start_content_lists_all_answers() {
    let content = poll_start_content("@c:example.org");
    let answers = content[POLL_START]["answers"].as_array().unwrap();
    let ids: Vec<&str> = answers.iter().map(|a| a["id"].as_str().unwrap()).collect();
    assert_eq!(ids, ["yes", "no", "blank"]);
    assert_eq!(content[POLL_START]["max_selections"], 1);
    assert_eq!(
      content[TEXT],
      "Accept @c:example.org into the Federation?\n1. Yes\n2. No\n3. Blank"
    );
  }

  #[test]
  fn end_content_references_poll() {
    let content = poll_end_content("$poll");
    assert_eq!(content["m.relates_to"]["event_id"], "$poll");
    assert_eq!(content["m.relates_to"]["rel_type"], "m.reference");
  }

  #[test]
  fn classifies_matching_response() {
    let event = response("@a:x", "$poll", "yes");
    assert_eq!(
      classify(&event, "$poll"),
      Classified::Response(Vote { sender: "@a:x".into(), answer: Answer::Yes })
    );
  }

  #[test]
  fn skips_response_to_other_poll() {
    let event = response("@a:x", "$other", "no");
    assert_eq!(classify(&event, "$poll"), Classified::Skip(SkipReason::OtherPoll));
  }

  #[test]
  fn skips_non_response_events() {
    let event = HistoryEvent {
      event_id:   "$msg".into(),
      sender:     "@a:x".into(),
      event_type: "m.room.message".into(),
      content:    json!({ "body": "hello" }),
    };
    assert_eq!(classify(&event, "$poll"), Classified::Skip(SkipReason::NotAResponse));
  }

  #[test]
  fn skips_malformed_responses() {
    let mut missing_relation = response("@a:x", "$poll", "yes");
    missing_relation.content.as_object_mut().unwrap().remove("m.relates_to");

    let mut empty_answers = response("@a:x", "$poll", "yes");
    empty_answers.content[POLL_RESPONSE]["answers"] = json!([]);

    let unknown_answer = response("@a:x", "$poll", "maybe");
    let no_sender = response("", "$poll", "yes");

    for event in [missing_relation, empty_answers, unknown_answer, no_sender] {
      assert_eq!(classify(&event, "$poll"), Classified::Skip(SkipReason::Malformed));
    }
  }
}
