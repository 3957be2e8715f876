//! Deferred poll closure.
//!
//! Every open poll gets one spawned task that sleeps until the poll's
//! deadline, counts the votes, and publishes the decision. Tasks are tracked
//! by candidate id so that a case never has two closures in flight. Only the
//! deadline is durable; [`PollScheduler::recover_all`] rebuilds the tasks
//! from the store after a restart.

use std::{
  collections::HashMap,
  sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use vetting_core::{
  store::CaseStore,
  tally::Tally,
  transport::{ROOM_MESSAGE, Transport, notice},
};

use crate::{
  EngineConfig, Error, Result,
  decision::{DecisionPublisher, Published},
  tally::{ScanEnd, TallyEngine},
};

/// What a completed closure produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollOutcome {
  pub candidate_id: String,
  pub poll_id:      String,
  pub tally:        Tally,
  pub scan_end:     ScanEnd,
  pub published:    Published,
}

type ClosureHandle = JoinHandle<Result<PollOutcome>>;

/// A candidate's entry in the task table.
enum Slot {
  Running(ClosureHandle),
  /// [`PollScheduler::wait`] holds the handle and is awaiting it.
  Awaited,
}

impl Slot {
  fn is_live(&self) -> bool {
    match self {
      Slot::Running(handle) => !handle.is_finished(),
      Slot::Awaited => true,
    }
  }
}

type TaskTable = HashMap<String, Slot>;

struct Inner<S, T> {
  store:     Arc<S>,
  transport: Arc<T>,
  config:    Arc<EngineConfig>,
  tasks:     Mutex<TaskTable>,
}

/// Schedules and tracks poll closures.
///
/// Cloning is cheap; clones share the task table.
pub struct PollScheduler<S, T> {
  inner: Arc<Inner<S, T>>,
}

impl<S, T> Clone for PollScheduler<S, T> {
  fn clone(&self) -> Self { Self { inner: self.inner.clone() } }
}

impl<S, T> PollScheduler<S, T>
where
  S: CaseStore + 'static,
  T: Transport + 'static,
{
  pub fn new(store: Arc<S>, transport: Arc<T>, config: Arc<EngineConfig>) -> Self {
    Self {
      inner: Arc::new(Inner {
        store,
        transport,
        config,
        tasks: Mutex::new(HashMap::new()),
      }),
    }
  }

  /// Spawn the closure for `candidate_id`, firing at `deadline` (or at once
  /// if it has passed).
  ///
  /// Fails with [`Error::AlreadyScheduled`] while an earlier closure for the
  /// same candidate is still running. A finished closure frees the slot.
  pub fn schedule(
    &self,
    candidate_id: &str,
    poll_id: &str,
    deadline: DateTime<Utc>,
  ) -> Result<()> {
    let mut tasks = self.tasks();
    tasks.retain(|_, slot| slot.is_live());

    if tasks.contains_key(candidate_id) {
      tracing::warn!(candidate = candidate_id, poll_id, "closure already in flight");
      return Err(Error::AlreadyScheduled(candidate_id.to_owned()));
    }

    let inner = self.inner.clone();
    let candidate = candidate_id.to_owned();
    let poll = poll_id.to_owned();
    let handle = tokio::spawn(async move { inner.run(candidate, poll, deadline).await });
    tasks.insert(candidate_id.to_owned(), Slot::Running(handle));

    tracing::info!(candidate = candidate_id, poll_id, %deadline, "poll closure scheduled");
    Ok(())
  }

  /// Reschedule every case whose poll is open. Called once at startup.
  ///
  /// Returns the number of closures scheduled.
  pub async fn recover_all(&self) -> Result<usize> {
    let pending = self.inner.store.list_pending().await.map_err(Error::store)?;
    let window = self.inner.config.voting_window;

    let mut scheduled = 0;
    for case in pending {
      let (Some(poll), Some(deadline)) = (case.poll.as_ref(), case.deadline(window)) else {
        continue;
      };
      match self.schedule(&case.candidate_id, &poll.poll_id, deadline) {
        Ok(()) => scheduled += 1,
        Err(Error::AlreadyScheduled(_)) => {}
        Err(e) => return Err(e),
      }
    }

    tracing::info!(scheduled, "recovered pending poll closures");
    Ok(scheduled)
  }

  /// `true` while a closure for `candidate_id` is waiting or running.
  pub fn is_scheduled(&self, candidate_id: &str) -> bool {
    self
      .tasks()
      .get(candidate_id)
      .is_some_and(Slot::is_live)
  }

  /// Candidates with a closure waiting or running.
  pub fn scheduled(&self) -> Vec<String> {
    let mut ids: Vec<String> = self
      .tasks()
      .iter()
      .filter(|(_, slot)| slot.is_live())
      .map(|(id, _)| id.clone())
      .collect();
    ids.sort();
    ids
  }

  /// Wait for the closure of `candidate_id` and return its outcome, or
  /// `None` if nothing was scheduled for it or another caller is already
  /// waiting. The candidate's slot stays taken until the closure has
  /// finished, so [`schedule`](Self::schedule) keeps rejecting it meanwhile.
  pub async fn wait(&self, candidate_id: &str) -> Option<Result<PollOutcome>> {
    let handle = {
      let mut tasks = self.tasks();
      match tasks.remove(candidate_id)? {
        Slot::Running(handle) => {
          tasks.insert(candidate_id.to_owned(), Slot::Awaited);
          handle
        }
        awaited @ Slot::Awaited => {
          tasks.insert(candidate_id.to_owned(), awaited);
          return None;
        }
      }
    };

    let _release = Release { tasks: &self.inner.tasks, candidate_id };
    Some(handle.await.map_err(Error::from).and_then(|outcome| outcome))
  }

  fn tasks(&self) -> MutexGuard<'_, TaskTable> { lock(&self.inner.tasks) }
}

fn lock(tasks: &Mutex<TaskTable>) -> MutexGuard<'_, TaskTable> {
  tasks.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Frees a slot marked [`Slot::Awaited`] when the waiter is done, or when
/// its future is dropped.
struct Release<'a> {
  tasks:        &'a Mutex<TaskTable>,
  candidate_id: &'a str,
}

impl Drop for Release<'_> {
  fn drop(&mut self) {
    let mut tasks = lock(self.tasks);
    if matches!(tasks.get(self.candidate_id), Some(Slot::Awaited)) {
      tasks.remove(self.candidate_id);
    }
  }
}

impl<S: CaseStore, T: Transport> Inner<S, T> {
  async fn run(
    &self,
    candidate_id: String,
    poll_id: String,
    deadline: DateTime<Utc>,
  ) -> Result<PollOutcome> {
    let remaining = (deadline - Utc::now()).to_std().unwrap_or_default();
    tokio::time::sleep(remaining).await;

    tracing::info!(candidate = %candidate_id, %poll_id, "closing poll");
    let result = self.resolve(&candidate_id, &poll_id).await;

    if let Err(e) = &result {
      tracing::error!(candidate = %candidate_id, %poll_id, error = %e, "poll closure failed");
    }
    let notice_text = result.as_ref().err().map(|e| failure_notice(&candidate_id, e));
    if let Some(text) = notice_text {
      self.report(&candidate_id, &text).await;
    }
    result
  }

  async fn resolve(&self, candidate_id: &str, poll_id: &str) -> Result<PollOutcome> {
    let room_id = &self.config.rooms.vetting_room_id;

    let report = TallyEngine::new(self.transport.clone(), room_id.clone())
      .close_and_count(poll_id)
      .await?;

    let published = DecisionPublisher::new(
      self.store.clone(),
      self.transport.clone(),
      room_id.clone(),
      self.config.policy,
    )
    .publish(candidate_id, &report.tally)
    .await?;

    Ok(PollOutcome {
      candidate_id: candidate_id.to_owned(),
      poll_id: poll_id.to_owned(),
      tally: report.tally,
      scan_end: report.end,
      published,
    })
  }

  /// Tell the vetting room that a closure failed.
  async fn report(&self, candidate_id: &str, text: &str) {
    if let Err(e) = self
      .transport
      .send_message(&self.config.rooms.vetting_room_id, ROOM_MESSAGE, notice(text))
      .await
    {
      tracing::error!(candidate = candidate_id, error = %e, "failed to report closure failure");
    }
  }
}

fn failure_notice(candidate_id: &str, error: &Error) -> String {
  match error {
    Error::TallyFetchFailed { .. } => "Unable to gather votes.".to_owned(),
    other => format!("Unable to close the poll for `{candidate_id}`: {other}"),
  }
}
