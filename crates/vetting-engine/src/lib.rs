//! The vetting-case lifecycle and poll-resolution engine.
//!
//! - [`tally::TallyEngine`] closes a poll and counts distinct voters from
//!   room history.
//! - [`decision::DecisionPublisher`] applies the thresholds, announces the
//!   result and records it.
//! - [`scheduler::PollScheduler`] fires one closure per open poll at its
//!   deadline and rebuilds those timers after a restart.
//! - [`service::VettingService`] opens cases, starts polls and confirms
//!   admissions.
//!
//! Everything is generic over a [`vetting_core::store::CaseStore`] and a
//! [`vetting_core::transport::Transport`].

pub mod config;
pub mod decision;
pub mod error;
pub mod scheduler;
pub mod service;
pub mod tally;

pub use config::EngineConfig;
pub use error::{Error, Result};

#[cfg(test)]
mod testing;
