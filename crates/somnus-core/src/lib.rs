//! # Somnus Core
//!
//! Core types, traits, and errors for the Somnus sleep coordinator.
//!
//! This crate provides the foundational abstractions that let the same
//! coordinator logic run against a real platform and against the in-memory
//! mocks used by tests.
//!
//! ## Key Traits
//!
//! - [`PlatformExecutor`]: the opaque device suspend/resume choreography
//! - [`IdleMonitor`]: the idleness signal that gates autosleep
//! - [`SleepNotifier`]: synchronous phase-change subscriber
//!
//! ## Key Types
//!
//! - [`SleepState`]: ordered power states with canonical labels
//! - [`SleepPhase`] / [`PhaseDirection`]: named transition steps
//! - [`TestLevel`]: diagnostic truncation points
//! - [`TransitionOutcome`] / [`TransitionError`]: attempt results

pub mod error;
pub mod mock;
pub mod outcome;
pub mod phase;
pub mod state;
pub mod traits;

// Re-export main types
pub use error::*;
pub use mock::*;
pub use outcome::*;
pub use phase::*;
pub use state::*;
pub use traits::*;
