//! Matrix client-server transport for the vetting bot.
//!
//! [`MatrixClient`] implements [`vetting_core::transport::Transport`] over
//! the `/_matrix/client/v3` HTTP API with a bearer access token.

mod client;

pub mod error;

pub use client::{MatrixClient, MatrixConfig};
pub use error::{Error, Result};
