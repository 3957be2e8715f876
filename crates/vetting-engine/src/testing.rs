//! Test doubles: a scripted in-memory transport and config/store helpers.

use std::{
  collections::HashSet,
  sync::{Arc, Mutex},
};

use chrono::Duration;
use serde_json::{Value, json};
use thiserror::Error;
use vetting_core::{
  poll::{POLL_RESPONSE, POLL_START},
  tally::DecisionPolicy,
  transport::{HistoryEvent, HistoryFilter, HistoryPage, InitialState, Transport},
};
use vetting_store_sqlite::SqliteStore;

use crate::config::{EngineConfig, Rooms};

pub const BOT: &str = "@bot:example.org";
pub const VETTING_ROOM: &str = "!vetting:example.org";
pub const VETTING_SPACE: &str = "!vspace:example.org";
pub const MAIN_SPACE: &str = "!main:example.org";

pub fn config(window: Duration) -> EngineConfig {
  EngineConfig {
    bot_user_id:   BOT.into(),
    rooms:         Rooms {
      vetting_room_id:  VETTING_ROOM.into(),
      vetting_space_id: VETTING_SPACE.into(),
      main_space_id:    MAIN_SPACE.into(),
    },
    voting_window: window,
    policy:        DecisionPolicy { min_yes_votes: 3, max_no_votes: 1 },
  }
}

pub async fn store() -> Arc<SqliteStore> {
  Arc::new(SqliteStore::open_in_memory().await.expect("in-memory store"))
}

#[derive(Debug, Error)]
#[error("fake transport: {0}")]
pub struct FakeError(pub String);

#[derive(Debug, Clone)]
pub struct Sent {
  pub room_id:    String,
  pub event_type: String,
  pub content:    Value,
  pub event_id:   String,
}

#[derive(Debug, Clone)]
pub struct CreatedRoom {
  pub name:          String,
  pub invitees:      Vec<String>,
  pub initial_state: Vec<InitialState>,
}

#[derive(Default)]
struct State {
  next_id:        u64,
  /// Oldest first; served newest first.
  timeline:       Vec<HistoryEvent>,
  sent:           Vec<Sent>,
  room_state:     Vec<(String, String, String, Value)>,
  reactions:      Vec<(String, String, String)>,
  rooms:          Vec<CreatedRoom>,
  invites:        Vec<(String, String)>,
  members:        Vec<String>,
  fetches:        u32,
  fail_page:      Option<u32>,
  fail_sends:     HashSet<String>,
  fail_reactions: bool,
}

/// An in-memory room server. Sent events are appended to a single timeline,
/// which `fetch_history` pages through newest first with numeric cursors.
#[derive(Default)]
pub struct FakeTransport {
  state: Mutex<State>,
}

impl FakeTransport {
  pub fn new() -> Arc<Self> { Arc::new(Self::default()) }

  fn with<R>(&self, f: impl FnOnce(&mut State) -> R) -> R {
    f(&mut self.state.lock().unwrap())
  }

  fn next_id(state: &mut State, prefix: &str) -> String {
    state.next_id += 1;
    format!("{prefix}{}", state.next_id)
  }

  /// Append an arbitrary event to the timeline and return its id.
  pub fn push(&self, sender: &str, event_type: &str, content: Value) -> String {
    self.with(|s| {
      let event_id = Self::next_id(s, "$ev");
      s.timeline.push(HistoryEvent {
        event_id: event_id.clone(),
        sender: sender.into(),
        event_type: event_type.into(),
        content,
      });
      event_id
    })
  }

  /// A poll-start event from `sender`; returns the poll id.
  pub fn push_poll_start(&self, sender: &str) -> String {
    self.push(sender, POLL_START, json!({}))
  }

  pub fn push_vote(&self, sender: &str, poll_id: &str, answer: &str) -> String {
    self.push(
      sender,
      POLL_RESPONSE,
      json!({
        "m.relates_to": { "rel_type": "m.reference", "event_id": poll_id },
        POLL_RESPONSE: { "answers": [answer] },
      }),
    )
  }

  pub fn push_chatter(&self, count: usize) {
    for i in 0..count {
      self.push("@chatty:example.org", "m.room.message", json!({ "body": format!("msg {i}") }));
    }
  }

  pub fn set_members(&self, members: &[&str]) {
    self.with(|s| s.members = members.iter().map(|m| m.to_string()).collect());
  }

  /// Make the `page`-th fetch (1-based) fail.
  pub fn fail_page(&self, page: u32) { self.with(|s| s.fail_page = Some(page)); }

  pub fn fail_sends_of(&self, event_type: &str) {
    self.with(|s| s.fail_sends.insert(event_type.to_owned()));
  }

  pub fn fail_reactions(&self) { self.with(|s| s.fail_reactions = true); }

  pub fn sent(&self) -> Vec<Sent> { self.with(|s| s.sent.clone()) }

  pub fn sent_of(&self, event_type: &str) -> Vec<Sent> {
    self.sent().into_iter().filter(|e| e.event_type == event_type).collect()
  }

  /// Bodies of every `m.room.message` sent.
  pub fn notices(&self) -> Vec<String> {
    self
      .sent_of("m.room.message")
      .into_iter()
      .filter_map(|e| e.content["body"].as_str().map(str::to_owned))
      .collect()
  }

  pub fn fetches(&self) -> u32 { self.with(|s| s.fetches) }

  pub fn reactions(&self) -> Vec<(String, String, String)> {
    self.with(|s| s.reactions.clone())
  }

  pub fn rooms(&self) -> Vec<CreatedRoom> { self.with(|s| s.rooms.clone()) }

  pub fn room_state(&self) -> Vec<(String, String, String, Value)> {
    self.with(|s| s.room_state.clone())
  }

  pub fn invites(&self) -> Vec<(String, String)> { self.with(|s| s.invites.clone()) }
}

impl Transport for FakeTransport {
  type Error = FakeError;

  async fn create_room(
    &self,
    name: &str,
    invitees: &[String],
    initial_state: &[InitialState],
  ) -> Result<String, FakeError> {
    Ok(self.with(|s| {
      s.rooms.push(CreatedRoom {
        name:          name.into(),
        invitees:      invitees.to_vec(),
        initial_state: initial_state.to_vec(),
      });
      format!("{}:example.org", Self::next_id(s, "!case"))
    }))
  }

  async fn send_message(
    &self,
    room_id: &str,
    event_type: &str,
    content: Value,
  ) -> Result<String, FakeError> {
    self.with(|s| {
      if s.fail_sends.contains(event_type) {
        return Err(FakeError(format!("send {event_type} refused")));
      }
      let event_id = Self::next_id(s, "$ev");
      s.timeline.push(HistoryEvent {
        event_id:   event_id.clone(),
        sender:     BOT.into(),
        event_type: event_type.into(),
        content:    content.clone(),
      });
      s.sent.push(Sent {
        room_id: room_id.into(),
        event_type: event_type.into(),
        content,
        event_id: event_id.clone(),
      });
      Ok(event_id)
    })
  }

  async fn set_room_state(
    &self,
    room_id: &str,
    event_type: &str,
    content: Value,
    state_key: &str,
  ) -> Result<(), FakeError> {
    self.with(|s| {
      s.room_state
        .push((room_id.into(), event_type.into(), state_key.into(), content))
    });
    Ok(())
  }

  async fn fetch_history(
    &self,
    _room_id: &str,
    cursor: Option<&str>,
    page_size: u32,
    _filter: &HistoryFilter,
  ) -> Result<HistoryPage, FakeError> {
    self.with(|s| {
      s.fetches += 1;
      if s.fail_page == Some(s.fetches) {
        return Err(FakeError(format!("page {} unavailable", s.fetches)));
      }
      let offset: usize = cursor.map(|c| c.parse().unwrap()).unwrap_or(0);
      let events: Vec<HistoryEvent> = s
        .timeline
        .iter()
        .rev()
        .skip(offset)
        .take(page_size as usize)
        .cloned()
        .collect();
      let end = offset + events.len();
      let next_cursor = (end < s.timeline.len()).then(|| end.to_string());
      Ok(HistoryPage { events, next_cursor })
    })
  }

  async fn react(
    &self,
    room_id: &str,
    message_id: &str,
    marker: &str,
  ) -> Result<(), FakeError> {
    self.with(|s| {
      if s.fail_reactions {
        return Err(FakeError("reaction refused".into()));
      }
      s.reactions.push((room_id.into(), message_id.into(), marker.into()));
      Ok(())
    })
  }

  async fn joined_members(&self, _room_id: &str) -> Result<Vec<String>, FakeError> {
    Ok(self.with(|s| s.members.clone()))
  }

  async fn invite(&self, room_id: &str, user_id: &str) -> Result<(), FakeError> {
    self.with(|s| s.invites.push((room_id.into(), user_id.into())));
    Ok(())
  }
}
