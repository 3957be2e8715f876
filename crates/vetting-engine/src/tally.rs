//! Poll closure and vote counting.
//!
//! Closing a poll posts an end marker, then walks the room's history newest
//! first, one page at a time, counting the most recent response of each
//! sender. The walk stops at the page containing the poll-start event, at the
//! start of the room, or after [`MAX_PAGES`] pages, whichever comes first.

use std::sync::Arc;

use vetting_core::{
  poll::{Classified, POLL_END, classify, poll_end_content},
  tally::{Tally, TallyBuilder},
  transport::{HistoryFilter, Transport},
};

use crate::{Error, Result};

/// Events requested per history page.
pub const PAGE_SIZE: u32 = 20;
/// Upper bound on pages fetched for one poll (400 events at the default
/// page size).
pub const MAX_PAGES: u32 = 20;

/// Why the history walk stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanEnd {
  /// The page holding the poll-start event was reached.
  FoundStart,
  /// The room has no older events.
  HistoryExhausted,
  /// [`MAX_PAGES`] pages were scanned without meeting the poll start.
  PageCap,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TallyReport {
  pub tally:   Tally,
  pub pages:   u32,
  pub skipped: u32,
  pub end:     ScanEnd,
}

/// Counts responses to polls in one room.
pub struct TallyEngine<T> {
  transport: Arc<T>,
  room_id:   String,
  page_size: u32,
  max_pages: u32,
}

impl<T: Transport> TallyEngine<T> {
  pub fn new(transport: Arc<T>, room_id: impl Into<String>) -> Self {
    Self {
      transport,
      room_id: room_id.into(),
      page_size: PAGE_SIZE,
      max_pages: MAX_PAGES,
    }
  }

  /// Post the end marker for `poll_id`, then count its responses.
  ///
  /// If the marker cannot be posted nothing is counted.
  pub async fn close_and_count(&self, poll_id: &str) -> Result<TallyReport> {
    self.publish_end(poll_id).await?;
    self.count(poll_id).await
  }

  /// Post the "poll closed" marker referencing `poll_id`.
  pub async fn publish_end(&self, poll_id: &str) -> Result<String> {
    self
      .transport
      .send_message(&self.room_id, POLL_END, poll_end_content(poll_id))
      .await
      .map_err(|e| Error::publish("poll end marker", e))
  }

  /// Walk history and count distinct voters for `poll_id`.
  ///
  /// Fails with [`Error::TallyFetchFailed`] if any page fetch fails; no
  /// partial result is returned.
  pub async fn count(&self, poll_id: &str) -> Result<TallyReport> {
    let filter = HistoryFilter {
      rooms: vec![self.room_id.clone()],
      types: None,
    };

    let mut builder = TallyBuilder::new();
    let mut cursor: Option<String> = None;
    let mut skipped = 0;
    let mut pages = 0;

    let end = loop {
      if pages == self.max_pages {
        break ScanEnd::PageCap;
      }
      pages += 1;

      let page = self
        .transport
        .fetch_history(&self.room_id, cursor.as_deref(), self.page_size, &filter)
        .await
        .map_err(|e| Error::TallyFetchFailed { page: pages, source: Box::new(e) })?;

      tracing::debug!(
        poll_id,
        page = pages,
        events = page.events.len(),
        "scanning history page"
      );

      let mut found_start = false;
      for event in &page.events {
        if event.event_id == poll_id {
          found_start = true;
        }
        match classify(event, poll_id) {
          Classified::Response(vote) => {
            builder.record(vote);
          }
          Classified::Skip(_) => skipped += 1,
        }
      }

      if found_start {
        break ScanEnd::FoundStart;
      }
      match page.next_cursor {
        Some(next) => cursor = Some(next),
        None => break ScanEnd::HistoryExhausted,
      }
    };

    if end != ScanEnd::FoundStart {
      tracing::warn!(poll_id, pages, ?end, "poll start not found, tally is best effort");
    }

    let voters = builder.voters();
    let tally = builder.finish();
    tracing::info!(poll_id, pages, voters, ?tally, "votes counted");

    Ok(TallyReport { tally, pages, skipped, end })
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::testing::{BOT, FakeTransport, VETTING_ROOM};

  fn engine(transport: &Arc<FakeTransport>) -> TallyEngine<FakeTransport> {
    TallyEngine::new(transport.clone(), VETTING_ROOM)
  }

  #[tokio::test]
  async fn counts_distinct_voters() {
    let t = FakeTransport::new();
    let poll = t.push_poll_start(BOT);
    t.push_vote("@a:x", &poll, "yes");
    t.push_vote("@b:x", &poll, "yes");
    t.push_vote("@c:x", &poll, "yes");
    t.push_vote("@d:x", &poll, "no");

    let report = engine(&t).close_and_count(&poll).await.unwrap();
    assert_eq!(report.tally, Tally { yes: 3, no: 1, blank: 0 });
    assert_eq!(report.end, ScanEnd::FoundStart);
    assert_eq!(report.pages, 1);
  }

  #[tokio::test]
  async fn most_recent_vote_per_sender_counts() {
    let t = FakeTransport::new();
    let poll = t.push_poll_start(BOT);
    t.push_vote("@a:x", &poll, "no");
    t.push_vote("@b:x", &poll, "blank");
    t.push_vote("@a:x", &poll, "yes");

    let report = engine(&t).count(&poll).await.unwrap();
    assert_eq!(report.tally, Tally { yes: 1, no: 0, blank: 1 });
  }

  #[tokio::test]
  async fn repeated_identical_votes_count_once() {
    let t = FakeTransport::new();
    let poll = t.push_poll_start(BOT);
    for _ in 0..5 {
      t.push_vote("@a:x", &poll, "yes");
    }

    let report = engine(&t).count(&poll).await.unwrap();
    assert_eq!(report.tally, Tally { yes: 1, no: 0, blank: 0 });
  }

  #[tokio::test]
  async fn ignores_other_polls_and_malformed_responses() {
    let t = FakeTransport::new();
    let other = t.push_poll_start(BOT);
    let poll = t.push_poll_start(BOT);
    t.push_vote("@a:x", &other, "no");
    t.push_vote("@b:x", &poll, "maybe");
    t.push("@c:x", vetting_core::poll::POLL_RESPONSE, serde_json::json!({ "garbage": true }));
    t.push_vote("@d:x", &poll, "yes");

    let report = engine(&t).count(&poll).await.unwrap();
    assert_eq!(report.tally, Tally { yes: 1, no: 0, blank: 0 });
    assert!(report.skipped >= 3);
  }

  #[tokio::test]
  async fn malformed_newest_vote_does_not_hide_older_one() {
    let t = FakeTransport::new();
    let poll = t.push_poll_start(BOT);
    t.push_vote("@a:x", &poll, "no");
    t.push_vote("@a:x", &poll, "maybe");

    let report = engine(&t).count(&poll).await.unwrap();
    assert_eq!(report.tally, Tally { yes: 0, no: 1, blank: 0 });
  }

  #[tokio::test]
  async fn stops_at_page_holding_poll_start() {
    let t = FakeTransport::new();
    // An impossible "vote" older than the poll itself, two pages back.
    let poll_placeholder = "$ev41";
    t.push_vote("@ancient:x", poll_placeholder, "yes");
    t.push_chatter(39);
    let poll = t.push_poll_start(BOT);
    assert_eq!(poll, poll_placeholder);
    t.push_chatter(5);
    t.push_vote("@a:x", &poll, "no");

    let report = engine(&t).count(&poll).await.unwrap();
    assert_eq!(report.end, ScanEnd::FoundStart);
    assert_eq!(report.pages, 1);
    assert_eq!(t.fetches(), 1);
    assert_eq!(report.tally, Tally { yes: 0, no: 1, blank: 0 });
  }

  #[tokio::test]
  async fn follows_cursor_across_pages() {
    let t = FakeTransport::new();
    let poll = t.push_poll_start(BOT);
    t.push_vote("@early:x", &poll, "yes");
    t.push_chatter(45);
    t.push_vote("@late:x", &poll, "blank");

    let report = engine(&t).count(&poll).await.unwrap();
    assert_eq!(report.end, ScanEnd::FoundStart);
    assert_eq!(report.pages, 3);
    assert_eq!(report.tally, Tally { yes: 1, no: 0, blank: 1 });
  }

  #[tokio::test]
  async fn page_cap_bounds_the_scan() {
    let t = FakeTransport::new();
    let poll = "$truncated-away";
    t.push_chatter(500);
    t.push_vote("@a:x", poll, "yes");

    let report = engine(&t).count(poll).await.unwrap();
    assert_eq!(report.end, ScanEnd::PageCap);
    assert_eq!(report.pages, MAX_PAGES);
    assert_eq!(t.fetches(), MAX_PAGES);
    assert_eq!(report.tally, Tally { yes: 1, no: 0, blank: 0 });
  }

  #[tokio::test]
  async fn short_history_without_start_is_exhausted() {
    let t = FakeTransport::new();
    t.push_chatter(25);

    let report = engine(&t).count("$missing").await.unwrap();
    assert_eq!(report.end, ScanEnd::HistoryExhausted);
    assert_eq!(report.pages, 2);
    assert_eq!(report.tally, Tally::default());
  }

  #[tokio::test]
  async fn fetch_failure_aborts_tally() {
    let t = FakeTransport::new();
    let poll = t.push_poll_start(BOT);
    t.push_chatter(30);
    t.fail_page(2);

    let err = engine(&t).count(&poll).await.unwrap_err();
    assert!(matches!(err, Error::TallyFetchFailed { page: 2, .. }));
  }

  #[tokio::test]
  async fn end_marker_failure_skips_counting() {
    let t = FakeTransport::new();
    let poll = t.push_poll_start(BOT);
    t.fail_sends_of(POLL_END);

    let err = engine(&t).close_and_count(&poll).await.unwrap_err();
    assert!(matches!(err, Error::Publish { what: "poll end marker", .. }));
    assert_eq!(t.fetches(), 0);
  }

  #[tokio::test]
  async fn end_marker_references_poll() {
    let t = FakeTransport::new();
    let poll = t.push_poll_start(BOT);
    engine(&t).close_and_count(&poll).await.unwrap();

    let ends = t.sent_of(POLL_END);
    assert_eq!(ends.len(), 1);
    assert_eq!(ends[0].room_id, VETTING_ROOM);
    assert_eq!(ends[0].content["m.relates_to"]["event_id"], poll.as_str());
  }
}
