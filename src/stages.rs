//! Upgrade pipeline stage implementations.
//!
//! Each stage is a standalone operation over the filesystem or the
//! target's control script; the orchestrator runs them in a fixed order
//! and aborts at the first failure.

pub mod inject;
pub mod locate;
pub mod staging;
pub mod trigger;

#[cfg(test)]
pub(crate) mod fixtures;
