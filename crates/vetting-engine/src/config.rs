//! Settings the engine consumes. Loading and validation live in the server.

use chrono::Duration;
use vetting_core::tally::DecisionPolicy;

/// Rooms the engine posts to and manages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rooms {
  /// Where commands are issued, polls run and decisions are announced.
  pub vetting_room_id:  String,
  /// Space that new case rooms are attached to.
  pub vetting_space_id: String,
  /// Space accepted candidates are invited into.
  pub main_space_id:    String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
  /// The bot's own user id; excluded from invitees and ignored as a
  /// reactor.
  pub bot_user_id:   String,
  pub rooms:         Rooms,
  /// How long a poll stays open.
  pub voting_window: Duration,
  pub policy:        DecisionPolicy,
}
