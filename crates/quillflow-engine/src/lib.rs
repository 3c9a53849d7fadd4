//! # Quillflow Engine
//!
//! The orchestrator. Owns the record store handle, the identity oracle, the
//! venue configuration and the clock, and runs every edit the same way:
//!
//! ```text
//! edit ──► paper lock ──► plan (lifecycle / assign) ──► commit batch
//!                                                         │
//!                                    WorkflowEvent ◄──────┘
//!                                          │
//!                               policy ──► outbox (NotifyRouter)
//! ```
//!
//! Sweeps take the same paper lock, so a reminder can never be derived from
//! a paper that a concurrent transition has already closed.

pub mod engine;
pub mod notes;
pub mod recruit;

#[cfg(test)]
mod scenarios;
#[cfg(test)]
mod testing;

pub use engine::{Engine, ReplayReport};
