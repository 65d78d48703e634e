//! # symptom-core
//!
//! Core library for the symptom tracker: the in-memory live tracker, the
//! record models persisted by `symptom-store`, and shared configuration.
//!
//! ## Design Principles
//!
//! - **Synchronous**: No async runtime dependency.
//! - **Not thread-safe**: One owner drives a `LiveTracker`; callers add their
//!   own synchronization if they need to share it.
//! - **Silent rejection**: Invalid tracker input is a no-op, never an error.
//!
//! ## Quick Start
//!
//! ```rust
//! use symptom_core::LiveTracker;
//!
//! let mut tracker = LiveTracker::new();
//! tracker.set_intensity(6);
//! tracker.record_intensity();
//! tracker.log_quantity("water", 2.0);
//! assert_eq!(tracker.history().len(), 2);
//! ```

pub mod config;
pub mod error;
pub mod events;
pub mod patterns;
pub mod records;
pub mod storage;
pub mod time;
pub mod tracker;

pub use config::{load_config, InterventionSeed, TrackerConfig};
pub use error::{Result, TrackerError};
pub use events::{EventKind, TrackerEvent};
pub use records::*;
pub use storage::StorageConfig;
pub use tracker::*;
