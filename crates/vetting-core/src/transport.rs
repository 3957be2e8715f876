//! The messaging capabilities the engine needs, and the shapes they exchange.
//!
//! The transport owns authentication, encryption and protocol retries. The
//! engine only sees room ids, event ids and JSON content.

use std::future::Future;

use serde::{Deserialize, Serialize};
use serde_json::Value;

// ─── Room events ─────────────────────────────────────────────────────────────

/// One event from a room's history. Every field defaults when absent, so a
/// partially-formed event still deserialises and is skipped later.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct HistoryEvent {
  #[serde(default)]
  pub event_id:   String,
  #[serde(default)]
  pub sender:     String,
  #[serde(rename = "type", default)]
  pub event_type: String,
  #[serde(default)]
  pub content:    Value,
}

/// A reverse-chronological page of history.
#[derive(Debug, Clone, Default)]
pub struct HistoryPage {
  /// Newest first.
  pub events:      Vec<HistoryEvent>,
  /// Cursor for the next (older) page; `None` at the start of the room.
  pub next_cursor: Option<String>,
}

/// Server-side event filter for history fetches.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct HistoryFilter {
  #[serde(skip_serializing_if = "Vec::is_empty")]
  pub rooms: Vec<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub types: Option<Vec<String>>,
}

/// A state event included when a room is created.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InitialState {
  #[serde(rename = "type")]
  pub event_type: String,
  pub state_key:  String,
  pub content:    Value,
}

impl InitialState {
  /// Megolm encryption for a freshly created room.
  pub fn encryption() -> Self {
    Self {
      event_type: "m.room.encryption".into(),
      state_key:  String::new(),
      content:    serde_json::json!({ "algorithm": "m.megolm.v1.aes-sha2" }),
    }
  }
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Messaging capabilities consumed by the engine.
pub trait Transport: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Create a room and return its id.
  fn create_room<'a>(
    &'a self,
    name: &'a str,
    invitees: &'a [String],
    initial_state: &'a [InitialState],
  ) -> impl Future<Output = Result<String, Self::Error>> + Send + 'a;

  /// Send a room event and return its event id.
  fn send_message<'a>(
    &'a self,
    room_id: &'a str,
    event_type: &'a str,
    content: Value,
  ) -> impl Future<Output = Result<String, Self::Error>> + Send + 'a;

  fn set_room_state<'a>(
    &'a self,
    room_id: &'a str,
    event_type: &'a str,
    content: Value,
    state_key: &'a str,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;

  /// Fetch one page of history, newest first, continuing from `cursor`
  /// (or from the most recent event when `None`).
  fn fetch_history<'a>(
    &'a self,
    room_id: &'a str,
    cursor: Option<&'a str>,
    page_size: u32,
    filter: &'a HistoryFilter,
  ) -> impl Future<Output = Result<HistoryPage, Self::Error>> + Send + 'a;

  /// Annotate `message_id` with `marker`.
  fn react<'a>(
    &'a self,
    room_id: &'a str,
    message_id: &'a str,
    marker: &'a str,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;

  fn joined_members<'a>(
    &'a self,
    room_id: &'a str,
  ) -> impl Future<Output = Result<Vec<String>, Self::Error>> + Send + 'a;

  fn invite<'a>(
    &'a self,
    room_id: &'a str,
    user_id: &'a str,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;
}

/// `m.notice` content carrying plain `text`.
pub fn notice(text: &str) -> Value {
  serde_json::json!({ "msgtype": "m.notice", "body": text })
}

/// Event type of plain room messages.
pub const ROOM_MESSAGE: &str = "m.room.message";
