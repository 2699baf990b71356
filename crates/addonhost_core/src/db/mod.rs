//! SQLite storage for the persisted extension registry.
//!
//! # Responsibility
//! - Open registry connections and bring the schema up to date.
//! - Report which migration failed when an upgrade of the schema aborts.
//!
//! # Schema
//! - `extensions`: one row per known extension id with version and state.
//! - `bundle_entries`: effective bundle order, one row per `(bundle, position)`.
//!   Rows are owned by an `extensions` row and go with it (`ON DELETE CASCADE`),
//!   so deleting an extension row never leaves orphaned bundle entries.
//! - `install_history`: append-only lifecycle log keyed by operation uuid.
//!
//! # Invariants
//! - Schema version is `PRAGMA user_version`; migrations run in one transaction.
//! - `foreign_keys` is enabled on every connection handed out by `open_db*`,
//!   otherwise the ownership cascade above would be silently skipped.

use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod migrations;
mod open;

pub use open::{open_db, open_db_in_memory};

pub type DbResult<T> = Result<T, DbError>;

#[derive(Debug)]
pub enum DbError {
    Sqlite(rusqlite::Error),
    /// The registry file was written by a newer host.
    UnsupportedSchemaVersion {
        db_version: u32,
        latest_supported: u32,
    },
    /// One migration script failed; nothing from the run was committed.
    Migration {
        version: u32,
        name: &'static str,
        source: rusqlite::Error,
    },
}

impl Display for DbError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sqlite(err) => write!(f, "registry database error: {err}"),
            Self::UnsupportedSchemaVersion {
                db_version,
                latest_supported,
            } => write!(
                f,
                "registry schema version {db_version} is newer than supported {latest_supported}"
            ),
            Self::Migration {
                version,
                name,
                source,
            } => write!(f, "registry migration {version:04}_{name} failed: {source}"),
        }
    }
}

impl Error for DbError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Sqlite(err) => Some(err),
            Self::Migration { source, .. } => Some(source),
            Self::UnsupportedSchemaVersion { .. } => None,
        }
    }
}

impl From<rusqlite::Error> for DbError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}
