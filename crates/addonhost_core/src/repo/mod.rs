//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define the persistence contract for registry snapshots.
//! - Isolate SQLite query details from service orchestration.
//!
//! # Invariants
//! - Stores only accept connections migrated to the latest schema.

pub mod registry_repo;
