//! Route handlers for the operator API.

pub mod cases;
pub mod decisions;
