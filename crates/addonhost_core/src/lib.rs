//! Extension host core.
//!
//! Loads extension descriptors, orders them by dependency and merges their
//! asset contributions into the host's named bundles. Ships the first-party
//! `web` baseline and the modern kanban theme descriptor.

pub mod bundle;
pub mod config;
pub mod db;
pub mod extension;
pub mod logging;
pub mod repo;
pub mod service;

pub use bundle::{AssetBundle, BundleEntry, BundleManifest, MergeOutcome};
pub use config::{ConfigError, HostConfig, MissingAssetPolicy};
pub use extension::asset::{AssetKind, AssetPathError, AssetRef};
pub use extension::builtin::{
    KANBAN_THEME_ID, KANBAN_THEME_RENDERER_PATCH, KANBAN_THEME_STYLESHEET, WEB_ASSETS_BACKEND,
    WEB_EXTENSION_ID,
};
pub use extension::kernel::{
    AddonDirAdapter, ExtensionAdapter, ExtensionKernelError, ExtensionRecord, ExtensionRegistry,
    ExtensionSource, ExtensionState, FirstPartyExtensionAdapter, InstallReport,
    RegisteredExtension, RegistrySnapshot,
};
pub use extension::manifest::{ExtensionManifest, ManifestParseError, ManifestValidationError};
pub use logging::{default_log_level, init_logging, init_logging_from_config, logging_status};
pub use repo::registry_repo::{
    HistoryEntry, LifecycleOperation, RegistryStore, SqliteRegistryStore, StoreError, StoreResult,
};
pub use service::install_service::{InstallService, ServiceError, ServiceResult};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
