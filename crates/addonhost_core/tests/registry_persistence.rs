use addonhost_core::db::migrations::latest_version;
use addonhost_core::db::{open_db, open_db_in_memory, DbError};
use addonhost_core::{
    ExtensionRegistry, ExtensionState, FirstPartyExtensionAdapter, InstallService,
    LifecycleOperation, RegistryStore, SqliteRegistryStore, KANBAN_THEME_ID,
    KANBAN_THEME_RENDERER_PATCH, KANBAN_THEME_STYLESHEET, WEB_ASSETS_BACKEND, WEB_EXTENSION_ID,
};
use rusqlite::Connection;

fn loaded_registry() -> ExtensionRegistry {
    let web = FirstPartyExtensionAdapter::web_baseline();
    let theme = FirstPartyExtensionAdapter::kanban_theme().unwrap();
    let mut registry = ExtensionRegistry::new();
    registry.load_all(&[&web, &theme]).unwrap();
    registry
}

#[test]
fn open_db_in_memory_applies_all_migrations() {
    let conn = open_db_in_memory().unwrap();

    assert_eq!(schema_version(&conn), latest_version());
    assert_table_exists(&conn, "extensions");
    assert_table_exists(&conn, "bundle_entries");
    assert_table_exists(&conn, "install_history");
}

#[test]
fn opening_database_with_newer_schema_version_returns_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("future.db");

    let conn = Connection::open(&path).unwrap();
    conn.execute_batch("PRAGMA user_version = 999;").unwrap();
    drop(conn);

    let err = open_db(&path).unwrap_err();
    match err {
        DbError::UnsupportedSchemaVersion {
            db_version,
            latest_supported,
        } => {
            assert_eq!(db_version, 999);
            assert_eq!(latest_supported, latest_version());
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn installed_state_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("registry.db");

    {
        let conn = open_db(&path).unwrap();
        let store = SqliteRegistryStore::try_new(&conn).unwrap();
        let mut service = InstallService::open(loaded_registry(), store).unwrap();
        let report = service.install(KANBAN_THEME_ID).unwrap();
        assert_eq!(report.installed, vec![WEB_EXTENSION_ID, KANBAN_THEME_ID]);
    }

    let conn = open_db(&path).unwrap();
    let store = SqliteRegistryStore::try_new(&conn).unwrap();
    let service = InstallService::open(loaded_registry(), store).unwrap();
    let registry = service.registry();
    assert_eq!(registry.state(KANBAN_THEME_ID), Some(ExtensionState::Installed));
    assert_eq!(
        registry.bundle(WEB_ASSETS_BACKEND).unwrap().paths(),
        vec![KANBAN_THEME_STYLESHEET, KANBAN_THEME_RENDERER_PATCH]
    );
}

#[test]
fn lifecycle_operations_are_recorded_in_history() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteRegistryStore::try_new(&conn).unwrap();
    let mut service = InstallService::open(loaded_registry(), store).unwrap();

    service.install(KANBAN_THEME_ID).unwrap();
    service.upgrade(KANBAN_THEME_ID, None).unwrap();
    service.uninstall(WEB_EXTENSION_ID).unwrap();

    let history = service.store().history().unwrap();
    let operations: Vec<LifecycleOperation> = history.iter().map(|entry| entry.operation).collect();
    assert_eq!(
        operations,
        vec![
            LifecycleOperation::Install,
            LifecycleOperation::Upgrade,
            LifecycleOperation::Uninstall
        ]
    );
    assert_eq!(history[2].affected, vec![KANBAN_THEME_ID, WEB_EXTENSION_ID]);
    assert_ne!(history[0].operation_id, history[1].operation_id);

    let snapshot = service.store().load_snapshot().unwrap();
    assert!(snapshot.bundles.is_empty());
    assert!(snapshot
        .extensions
        .iter()
        .all(|record| record.state == ExtensionState::Uninstalled));
}

#[test]
fn reinstalling_an_installed_extension_is_recorded_as_upgrade() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteRegistryStore::try_new(&conn).unwrap();
    let mut service = InstallService::open(loaded_registry(), store).unwrap();

    service.install(KANBAN_THEME_ID).unwrap();
    let report = service.install(KANBAN_THEME_ID).unwrap();
    assert_eq!(report.upgraded, vec![KANBAN_THEME_ID]);

    let history = service.store().history().unwrap();
    let operations: Vec<LifecycleOperation> = history.iter().map(|entry| entry.operation).collect();
    assert_eq!(
        operations,
        vec![LifecycleOperation::Install, LifecycleOperation::Upgrade]
    );
    assert_eq!(history[1].extension_id, KANBAN_THEME_ID);
    assert_eq!(history[1].affected, vec![KANBAN_THEME_ID]);
}

#[test]
fn failed_operation_writes_nothing() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteRegistryStore::try_new(&conn).unwrap();
    let mut service = InstallService::open(loaded_registry(), store).unwrap();

    assert!(service.uninstall(KANBAN_THEME_ID).is_err());
    assert!(service.store().history().unwrap().is_empty());
    assert!(service.store().load_snapshot().unwrap().extensions.is_empty());
}

fn schema_version(conn: &Connection) -> u32 {
    conn.query_row("PRAGMA user_version;", [], |row| row.get(0))
        .unwrap()
}

fn assert_table_exists(conn: &Connection, table_name: &str) {
    let exists: i64 = conn
        .query_row(
            "SELECT EXISTS(
                SELECT 1
                FROM sqlite_master
                WHERE type = 'table' AND name = ?1
            );",
            [table_name],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(exists, 1, "table {table_name} does not exist");
}
