//! Boundary traits for the engine's external collaborators.

pub mod identity;
pub mod notifier;
pub mod store;

pub use identity::{IdentityOracle, ProfileStatus};
pub use notifier::{Notifier, RecordingNotifier};
pub use store::{Batch, RecordStore};
