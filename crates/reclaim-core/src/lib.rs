#![deny(missing_docs)]
//! Reclaim core library.
//!
//! Transport-agnostic account recovery relay: upstream strategies, the
//! multi-method resolver, batch pacing, membership gating and the per-user
//! conversation state machine.

/// Paced bulk processing of targets.
pub mod batch;
/// Configuration management.
pub mod config;
/// Conversation state machine and chat gateway boundary.
pub mod conversation;
/// Required-group membership gate.
pub mod gate;
/// Multi-method resolver.
pub mod resolver;
/// Per-user session storage.
pub mod session;
/// Upstream client and recovery strategies.
pub mod upstream;
/// Utility functions.
pub mod utils;

#[cfg(test)]
pub mod testing;
