//! Registry snapshot store contracts and SQLite implementation.
//!
//! # Responsibility
//! - Persist extension install states and bundle manifests.
//! - Record one history row per lifecycle operation.
//!
//! # Invariants
//! - `save_snapshot` replaces stored state inside one immediate transaction.
//! - Bundle entries are stored with their effective position and reloaded in
//!   that order.
//! - Read paths reject invalid persisted values instead of masking them.

use crate::bundle::{AssetBundle, BundleEntry};
use crate::db::migrations::{current_user_version, latest_version};
use crate::db::DbError;
use crate::extension::asset::parse_asset_kind;
use crate::extension::kernel::{ExtensionRecord, ExtensionState, RegistrySnapshot};
use rusqlite::{params, Connection, Transaction, TransactionBehavior};
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

pub type StoreResult<T> = Result<T, StoreError>;

/// Registry store errors.
#[derive(Debug)]
pub enum StoreError {
    Db(DbError),
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    InvalidData(String),
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "registry store requires schema version {expected_version}, got {actual_version}"
            ),
            Self::InvalidData(message) => write!(f, "invalid persisted registry data: {message}"),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::UninitializedConnection { .. } => None,
            Self::InvalidData(_) => None,
        }
    }
}

impl From<DbError> for StoreError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Lifecycle operation kinds recorded in history.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleOperation {
    Install,
    Upgrade,
    Uninstall,
}

impl LifecycleOperation {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Install => "install",
            Self::Upgrade => "upgrade",
            Self::Uninstall => "uninstall",
        }
    }

    fn parse(value: &str) -> Option<Self> {
        match value {
            "install" => Some(Self::Install),
            "upgrade" => Some(Self::Upgrade),
            "uninstall" => Some(Self::Uninstall),
            _ => None,
        }
    }
}

/// One recorded lifecycle operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    pub operation_id: Uuid,
    pub operation: LifecycleOperation,
    pub extension_id: String,
    /// Extensions whose state changed, in application order.
    pub affected: Vec<String>,
}

impl HistoryEntry {
    pub fn new(operation: LifecycleOperation, extension_id: &str, affected: Vec<String>) -> Self {
        Self {
            operation_id: Uuid::new_v4(),
            operation,
            extension_id: extension_id.to_string(),
            affected,
        }
    }
}

/// Persistence contract for registry snapshots.
pub trait RegistryStore {
    /// Replaces the stored snapshot and appends `entry` to history atomically.
    fn save_snapshot(&self, snapshot: &RegistrySnapshot, entry: &HistoryEntry) -> StoreResult<()>;
    fn load_snapshot(&self) -> StoreResult<RegistrySnapshot>;
    /// Lists history oldest first.
    fn history(&self) -> StoreResult<Vec<HistoryEntry>>;
}

/// SQLite-backed registry store.
pub struct SqliteRegistryStore<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteRegistryStore<'conn> {
    /// Creates a store from a migrated connection.
    pub fn try_new(conn: &'conn Connection) -> StoreResult<Self> {
        let expected_version = latest_version();
        let actual_version = current_user_version(conn)?;
        if actual_version != expected_version {
            return Err(StoreError::UninitializedConnection {
                expected_version,
                actual_version,
            });
        }
        Ok(Self { conn })
    }
}

impl RegistryStore for SqliteRegistryStore<'_> {
    fn save_snapshot(&self, snapshot: &RegistrySnapshot, entry: &HistoryEntry) -> StoreResult<()> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        tx.execute("DELETE FROM bundle_entries;", [])?;
        tx.execute("DELETE FROM extensions;", [])?;

        for record in &snapshot.extensions {
            tx.execute(
                "INSERT INTO extensions (id, version, state) VALUES (?1, ?2, ?3);",
                params![record.id, record.version, record.state.as_str()],
            )?;
        }

        for bundle in &snapshot.bundles {
            insert_bundle(&tx, bundle)?;
        }

        tx.execute(
            "INSERT INTO install_history (operation_id, operation, extension_id, affected)
             VALUES (?1, ?2, ?3, ?4);",
            params![
                entry.operation_id.to_string(),
                entry.operation.as_str(),
                entry.extension_id,
                entry.affected.join(","),
            ],
        )?;

        tx.commit()?;
        Ok(())
    }

    fn load_snapshot(&self) -> StoreResult<RegistrySnapshot> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, version, state FROM extensions ORDER BY id ASC;")?;
        let mut rows = stmt.query([])?;
        let mut extensions = Vec::new();
        while let Some(row) = rows.next()? {
            let id: String = row.get(0)?;
            let raw_state: String = row.get(2)?;
            let state = ExtensionState::parse(&raw_state).ok_or_else(|| {
                StoreError::InvalidData(format!("unknown state `{raw_state}` for {id}"))
            })?;
            extensions.push(ExtensionRecord {
                id,
                version: row.get(1)?,
                state,
            });
        }

        let mut stmt = self.conn.prepare(
            "SELECT bundle, owner, path, kind, priority, sequence
             FROM bundle_entries
             ORDER BY bundle ASC, position ASC;",
        )?;
        let mut rows = stmt.query([])?;
        let mut grouped: BTreeMap<String, Vec<BundleEntry>> = BTreeMap::new();
        while let Some(row) = rows.next()? {
            let bundle: String = row.get(0)?;
            let raw_kind: String = row.get(3)?;
            let kind = parse_asset_kind(&raw_kind)
                .map_err(|err| StoreError::InvalidData(err.to_string()))?;
            let sequence: i64 = row.get(5)?;
            let sequence = u64::try_from(sequence).map_err(|_| {
                StoreError::InvalidData(format!("negative sequence in bundle {bundle}"))
            })?;
            grouped.entry(bundle).or_default().push(BundleEntry {
                owner: row.get(1)?,
                path: row.get(2)?,
                kind,
                priority: row.get(4)?,
                sequence,
            });
        }

        let bundles = grouped
            .into_iter()
            .map(|(name, entries)| AssetBundle::from_entries(name, entries))
            .collect();
        Ok(RegistrySnapshot {
            extensions,
            bundles,
        })
    }

    fn history(&self) -> StoreResult<Vec<HistoryEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT operation_id, operation, extension_id, affected
             FROM install_history
             ORDER BY seq ASC;",
        )?;
        let mut rows = stmt.query([])?;
        let mut entries = Vec::new();
        while let Some(row) = rows.next()? {
            let raw_id: String = row.get(0)?;
            let operation_id = Uuid::parse_str(&raw_id)
                .map_err(|err| StoreError::InvalidData(format!("invalid operation id: {err}")))?;
            let raw_operation: String = row.get(1)?;
            let operation = LifecycleOperation::parse(&raw_operation).ok_or_else(|| {
                StoreError::InvalidData(format!("unknown operation `{raw_operation}`"))
            })?;
            let affected: String = row.get(3)?;
            entries.push(HistoryEntry {
                operation_id,
                operation,
                extension_id: row.get(2)?,
                affected: affected
                    .split(',')
                    .filter(|value| !value.is_empty())
                    .map(str::to_string)
                    .collect(),
            });
        }
        Ok(entries)
    }
}

fn insert_bundle(tx: &Transaction<'_>, bundle: &AssetBundle) -> StoreResult<()> {
    for (position, entry) in bundle.entries().iter().enumerate() {
        let sequence = i64::try_from(entry.sequence).map_err(|_| {
            StoreError::InvalidData(format!("sequence overflow in bundle {}", bundle.name()))
        })?;
        tx.execute(
            "INSERT INTO bundle_entries (bundle, position, owner, path, kind, priority, sequence)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7);",
            params![
                bundle.name(),
                position as i64,
                entry.owner,
                entry.path,
                entry.kind.as_str(),
                entry.priority,
                sequence,
            ],
        )?;
    }
    Ok(())
}
