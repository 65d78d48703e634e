//! # symptom-store
//!
//! Durable storage for headache sessions and the intervention and followup
//! records attached to them, backed by a local SQLite file.
//!
//! Records are insert-only. The only removal is [`SessionStore::clear_all`],
//! which empties all three collections in a single transaction.

pub mod db;
pub mod error;
pub mod repo;

pub use db::{CollectionCounts, Db};
pub use error::{Result, StoreError};
pub use repo::{SessionBundle, SessionStore};
