//! Core types and trait definitions for the vetting bot.
//!
//! Nothing here talks to a network or a database. The store, transport,
//! engine and server crates all build on these types.

// Trait futures are spelled out as `impl Future + Send`; implementors use
// plain `async fn`.
#![allow(async_fn_in_trait)]

pub mod case;
pub mod error;
pub mod poll;
pub mod store;
pub mod tally;
pub mod transport;

pub use error::{Error, Result};
