//! # Quillflow Core
//!
//! Shared vocabulary for the editorial workflow engine: venue configuration,
//! the error taxonomy, identifiers and roles, the record-store entities, and
//! the traits every external collaborator implements.
//!
//! ## Collaborators
//! ```text
//! Engine
//!   ├── RecordStore     versioned entities + edit audit trail
//!   ├── IdentityOracle  conflicts of interest, profile status
//!   ├── Notifier        fire-and-forget delivery
//!   └── Clock           wall clock in production, manual in tests
//! ```

pub mod clock;
pub mod config;
pub mod directory;
pub mod error;
pub mod groups;
pub mod locks;
pub mod message;
pub mod model;
pub mod traits;
pub mod types;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::VenueConfig;
pub use directory::StaticDirectory;
pub use error::{QuillflowError, Result};
pub use groups::{EVERYONE, GroupIds};
pub use message::Message;
pub use types::{Actor, EdgeId, PaperId, PaperState, Role};
