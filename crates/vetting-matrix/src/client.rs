//! Async HTTP client for the Matrix client-server API.

use std::{collections::BTreeMap, time::Duration};

use reqwest::{Client, Method, RequestBuilder, Url};
use serde::{Deserialize, de::DeserializeOwned};
use serde_json::{Value, json};
use uuid::Uuid;
use vetting_core::transport::{
  HistoryEvent, HistoryFilter, HistoryPage, InitialState, Transport,
};

use crate::{Error, Result};

/// Connection settings for the homeserver.
#[derive(Debug, Clone)]
pub struct MatrixConfig {
  pub homeserver_url: String,
  pub access_token:   String,
}

/// Matrix transport authenticated as the bot account.
///
/// Cheap to clone; the inner [`reqwest::Client`] is `Arc`-based.
#[derive(Clone)]
pub struct MatrixClient {
  client: Client,
  base:   Url,
  token:  String,
}

// ─── Wire shapes ─────────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct RoomIdResponse {
  room_id: String,
}

#[derive(Deserialize)]
struct EventIdResponse {
  event_id: String,
}

#[derive(Deserialize)]
pub(crate) struct MessagesResponse {
  #[serde(default)]
  pub(crate) chunk: Vec<HistoryEvent>,
  pub(crate) end:   Option<String>,
}

impl MessagesResponse {
  /// The homeserver omits `end` (or returns an empty chunk) once the start of
  /// the room is reached.
  pub(crate) fn into_page(self) -> HistoryPage {
    let next_cursor = if self.chunk.is_empty() { None } else { self.end };
    HistoryPage { events: self.chunk, next_cursor }
  }
}

#[derive(Deserialize)]
struct JoinedMembersResponse {
  #[serde(default)]
  joined: BTreeMap<String, Value>,
}

#[derive(Deserialize, Default)]
struct ErrorBody {
  #[serde(default)]
  errcode: String,
  #[serde(default)]
  error:   String,
}

/// `m.reaction` content annotating `event_id` with `key`.
pub(crate) fn reaction_content(event_id: &str, key: &str) -> Value {
  json!({
    "m.relates_to": {
      "rel_type": "m.annotation",
      "event_id": event_id,
      "key": key,
    }
  })
}

// ─── Client ──────────────────────────────────────────────────────────────────

impl MatrixClient {
  pub fn new(config: MatrixConfig) -> Result<Self> {
    let client = Client::builder().timeout(Duration::from_secs(30)).build()?;
    Self::with_http_client(config, client)
  }

  /// Use a preconfigured [`reqwest::Client`].
  pub fn with_http_client(config: MatrixConfig, client: Client) -> Result<Self> {
    let base = Url::parse(&config.homeserver_url)
      .map_err(|e| Error::InvalidUrl(format!("{}: {e}", config.homeserver_url)))?;
    if base.cannot_be_a_base() {
      return Err(Error::InvalidUrl(config.homeserver_url));
    }
    Ok(Self { client, base, token: config.access_token })
  }

  /// `{homeserver}/_matrix/client/v3/{segments...}`, each segment
  /// percent-encoded on its own so ids containing `/` or `#` stay intact.
  pub(crate) fn endpoint(&self, segments: &[&str]) -> Url {
    let mut url = self.base.clone();
    if let Ok(mut path) = url.path_segments_mut() {
      path
        .pop_if_empty()
        .extend(["_matrix", "client", "v3"])
        .extend(segments);
    }
    url
  }

  fn request(&self, method: Method, segments: &[&str]) -> RequestBuilder {
    self
      .client
      .request(method, self.endpoint(segments))
      .bearer_auth(&self.token)
  }

  async fn execute<R: DeserializeOwned>(&self, req: RequestBuilder) -> Result<R> {
    let request = req.build()?;
    let method = request.method().clone();
    let path = request.url().path().to_owned();
    tracing::debug!(%method, %path, "matrix request");

    let resp = self.client.execute(request).await?;
    let status = resp.status();
    if !status.is_success() {
      let body: ErrorBody = resp.json().await.unwrap_or_default();
      return Err(Error::Api {
        method,
        path,
        status,
        errcode: body.errcode,
        message: body.error,
      });
    }
    Ok(resp.json().await?)
  }

  /// `PUT /rooms/{room}/send/{type}/{txn}`
  async fn send_event(&self, room_id: &str, event_type: &str, content: Value) -> Result<String> {
    let txn_id = Uuid::new_v4().simple().to_string();
    let req = self
      .request(Method::PUT, &["rooms", room_id, "send", event_type, txn_id.as_str()])
      .json(&content);
    let resp: EventIdResponse = self.execute(req).await?;
    Ok(resp.event_id)
  }
}

impl Transport for MatrixClient {
  type Error = Error;

  async fn create_room(
    &self,
    name: &str,
    invitees: &[String],
    initial_state: &[InitialState],
  ) -> Result<String> {
    let req = self.request(Method::POST, &["createRoom"]).json(&json!({
      "name": name,
      "preset": "private_chat",
      "invite": invitees,
      "initial_state": initial_state,
    }));
    let resp: RoomIdResponse = self.execute(req).await?;
    tracing::info!(room_id = %resp.room_id, name, "room created");
    Ok(resp.room_id)
  }

  async fn send_message(&self, room_id: &str, event_type: &str, content: Value) -> Result<String> {
    self.send_event(room_id, event_type, content).await
  }

  async fn set_room_state(
    &self,
    room_id: &str,
    event_type: &str,
    content: Value,
    state_key: &str,
  ) -> Result<()> {
    let req = self
      .request(Method::PUT, &["rooms", room_id, "state", event_type, state_key])
      .json(&content);
    let _: EventIdResponse = self.execute(req).await?;
    Ok(())
  }

  async fn fetch_history(
    &self,
    room_id: &str,
    cursor: Option<&str>,
    page_size: u32,
    filter: &HistoryFilter,
  ) -> Result<HistoryPage> {
    let filter = serde_json::to_string(filter)?;
    let mut query = vec![
      ("dir", "b".to_owned()),
      ("limit", page_size.to_string()),
      ("filter", filter),
    ];
    if let Some(from) = cursor {
      query.push(("from", from.to_owned()));
    }

    let req = self
      .request(Method::GET, &["rooms", room_id, "messages"])
      .query(&query);
    let resp: MessagesResponse = self.execute(req).await?;
    Ok(resp.into_page())
  }

  async fn react(&self, room_id: &str, message_id: &str, marker: &str) -> Result<()> {
    self
      .send_event(room_id, "m.reaction", reaction_content(message_id, marker))
      .await?;
    Ok(())
  }

  async fn joined_members(&self, room_id: &str) -> Result<Vec<String>> {
    let req = self.request(Method::GET, &["rooms", room_id, "joined_members"]);
    let resp: JoinedMembersResponse = self.execute(req).await?;
    Ok(resp.joined.into_keys().collect())
  }

  async fn invite(&self, room_id: &str, user_id: &str) -> Result<()> {
    let req = self
      .request(Method::POST, &["rooms", room_id, "invite"])
      .json(&json!({ "user_id": user_id }));
    let _: Value = self.execute(req).await?;
    Ok(())
  }
}
