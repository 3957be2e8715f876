//! The `CaseStore` trait.
//!
//! Implemented by storage backends (e.g. `vetting-store-sqlite`). The engine
//! and server depend on this abstraction, not on any concrete backend.

use std::future::Future;

use chrono::{DateTime, Utc};

use crate::case::VettingCase;

/// Durable repository of vetting cases, keyed by candidate id.
///
/// Each method is a single-statement operation; no cross-call transaction is
/// offered. Cases are never deleted.
///
/// All methods return `Send` futures so stores can be shared with spawned
/// poll-closure tasks.
pub trait CaseStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Persist a new case. Fails with a duplicate-case error if
  /// `candidate_id` already has a record.
  fn create(
    &self,
    candidate_id: String,
    case_room_id: Option<String>,
    created_at: DateTime<Utc>,
  ) -> impl Future<Output = Result<VettingCase, Self::Error>> + Send + '_;

  /// Retrieve a case by candidate id. Returns `None` if not found.
  fn find<'a>(
    &'a self,
    candidate_id: &'a str,
  ) -> impl Future<Output = Result<Option<VettingCase>, Self::Error>> + Send + 'a;

  /// Retrieve the case whose decision message is `decision_id`.
  fn find_by_decision<'a>(
    &'a self,
    decision_id: &'a str,
  ) -> impl Future<Output = Result<Option<VettingCase>, Self::Error>> + Send + 'a;

  /// All cases, newest first.
  fn list(&self) -> impl Future<Output = Result<Vec<VettingCase>, Self::Error>> + Send + '_;

  /// Record the poll id and start time. Fails with a not-found error if no
  /// case exists, and leaves the record untouched if it already has a poll.
  fn start_poll<'a>(
    &'a self,
    candidate_id: &'a str,
    poll_id: &'a str,
    voting_started_at: DateTime<Utc>,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;

  /// Cases with a started poll whose closure has not been recorded.
  fn list_pending(
    &self,
  ) -> impl Future<Output = Result<Vec<VettingCase>, Self::Error>> + Send + '_;

  /// Mark the vote as ended and store the decision message id. Fails with a
  /// not-found error if no case exists.
  fn close_poll<'a>(
    &'a self,
    candidate_id: &'a str,
    decision_id: &'a str,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;
}
