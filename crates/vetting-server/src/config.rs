//! Runtime configuration, deserialised from `config.toml` and `VETTING__*`
//! environment variables.

use std::{path::PathBuf, sync::LazyLock};

use regex::Regex;
use serde::Deserialize;
use vetting_core::{case::validate_candidate_id, tally::DecisionPolicy};
use vetting_engine::{EngineConfig, config::Rooms};
use vetting_matrix::MatrixConfig;

use crate::error::Error;

static ROOM_ID: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(r"^![^:\s]+:\S+$").expect("room id pattern is valid"));

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
  pub server:  HttpSection,
  pub storage: StorageSection,
  pub matrix:  MatrixSection,
  pub vetting: VettingSection,
}

/// `[server]`: the operator API listener.
#[derive(Debug, Clone, Deserialize)]
pub struct HttpSection {
  #[serde(default = "default_host")]
  pub host:               String,
  #[serde(default = "default_port")]
  pub port:               u16,
  pub auth_username:      String,
  /// PHC string produced by argon2, e.g. `$argon2id$v=19$…`
  pub auth_password_hash: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageSection {
  /// SQLite database file.
  pub database: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MatrixSection {
  pub homeserver_url: String,
  /// The bot account, `@name:domain`.
  pub user_id:        String,
  pub access_token:   String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VettingSection {
  pub main_space_id:    String,
  pub vetting_room_id:  String,
  pub vetting_space_id: String,
  /// Poll duration in seconds.
  pub voting_time:      u32,
  pub min_yes_votes:    u32,
  pub max_no_votes:     u32,
}

fn default_host() -> String { "127.0.0.1".into() }

fn default_port() -> u16 { 8080 }

impl ServerConfig {
  /// Reject identifiers of the wrong shape and nonsensical settings.
  pub fn validate(&self) -> Result<(), Error> {
    if validate_candidate_id(&self.matrix.user_id).is_err() {
      return Err(Error::Config("matrix.user_id must be in the form @name:domain".into()));
    }
    if self.matrix.access_token.is_empty() {
      return Err(Error::Config("matrix.access_token must not be empty".into()));
    }

    let v = &self.vetting;
    for (key, value) in [
      ("main_space_id", &v.main_space_id),
      ("vetting_room_id", &v.vetting_room_id),
      ("vetting_space_id", &v.vetting_space_id),
    ] {
      if !ROOM_ID.is_match(value) {
        return Err(Error::Config(format!("vetting.{key} must be in the form !xxx:domain")));
      }
    }
    if v.voting_time == 0 {
      return Err(Error::Config("vetting.voting_time must be positive".into()));
    }
    Ok(())
  }

  pub fn engine_config(&self) -> EngineConfig {
    let v = &self.vetting;
    EngineConfig {
      bot_user_id:   self.matrix.user_id.clone(),
      rooms:         Rooms {
        vetting_room_id:  v.vetting_room_id.clone(),
        vetting_space_id: v.vetting_space_id.clone(),
        main_space_id:    v.main_space_id.clone(),
      },
      voting_window: chrono::Duration::seconds(i64::from(v.voting_time)),
      policy:        DecisionPolicy {
        min_yes_votes: v.min_yes_votes,
        max_no_votes:  v.max_no_votes,
      },
    }
  }

  pub fn matrix_config(&self) -> MatrixConfig {
    MatrixConfig {
      homeserver_url: self.matrix.homeserver_url.clone(),
      access_token:   self.matrix.access_token.clone(),
    }
  }
}
