//! Install use-case service.
//!
//! # Responsibility
//! - Run registry lifecycle operations and persist the resulting snapshot.
//! - Keep memory and storage consistent when persistence fails.
//!
//! # Invariants
//! - A call either updates both the registry and the store, or neither.
//! - Every successful operation appends exactly one history row.

use crate::extension::kernel::{ExtensionKernelError, ExtensionRegistry, InstallReport};
use crate::extension::manifest::ExtensionManifest;
use crate::repo::registry_repo::{HistoryEntry, LifecycleOperation, RegistryStore, StoreError};
use log::error;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Install service errors.
#[derive(Debug)]
pub enum ServiceError {
    Kernel(ExtensionKernelError),
    Store(StoreError),
}

impl Display for ServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Kernel(err) => write!(f, "{err}"),
            Self::Store(err) => write!(f, "failed to persist registry: {err}"),
        }
    }
}

impl Error for ServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Kernel(err) => Some(err),
            Self::Store(err) => Some(err),
        }
    }
}

impl From<ExtensionKernelError> for ServiceError {
    fn from(value: ExtensionKernelError) -> Self {
        Self::Kernel(value)
    }
}

impl From<StoreError> for ServiceError {
    fn from(value: StoreError) -> Self {
        Self::Store(value)
    }
}

/// Use-case wrapper pairing a registry with its persistent store.
pub struct InstallService<S: RegistryStore> {
    registry: ExtensionRegistry,
    store: S,
}

impl<S: RegistryStore> InstallService<S> {
    /// Creates a service and restores previously persisted state onto the
    /// descriptors already loaded in `registry`.
    pub fn open(mut registry: ExtensionRegistry, store: S) -> ServiceResult<Self> {
        let snapshot = store.load_snapshot()?;
        if !snapshot.extensions.is_empty() {
            registry.restore(snapshot)?;
        }
        Ok(Self { registry, store })
    }

    pub fn registry(&self) -> &ExtensionRegistry {
        &self.registry
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Installs an extension and persists the result.
    ///
    /// An already installed extension is re-applied by the registry and
    /// recorded as an upgrade.
    pub fn install(&mut self, extension_id: &str) -> ServiceResult<InstallReport> {
        self.run(extension_id, |registry| {
            let report = registry.install(extension_id)?;
            let operation = if report.upgraded.iter().any(|id| id == extension_id) {
                LifecycleOperation::Upgrade
            } else {
                LifecycleOperation::Install
            };
            let affected = affected_ids(&report);
            Ok((report, operation, affected))
        })
    }

    /// Upgrades an installed extension and persists the result.
    pub fn upgrade(
        &mut self,
        extension_id: &str,
        manifest: Option<ExtensionManifest>,
    ) -> ServiceResult<InstallReport> {
        self.run(extension_id, |registry| {
            let report = registry.upgrade(extension_id, manifest)?;
            let affected = affected_ids(&report);
            Ok((report, LifecycleOperation::Upgrade, affected))
        })
    }

    /// Uninstalls an extension with its dependents and persists the result.
    pub fn uninstall(&mut self, extension_id: &str) -> ServiceResult<Vec<String>> {
        self.run(extension_id, |registry| {
            let removed = registry.uninstall(extension_id)?;
            Ok((removed.clone(), LifecycleOperation::Uninstall, removed))
        })
    }

    fn run<T>(
        &mut self,
        extension_id: &str,
        apply: impl FnOnce(
            &mut ExtensionRegistry,
        ) -> Result<(T, LifecycleOperation, Vec<String>), ExtensionKernelError>,
    ) -> ServiceResult<T> {
        let previous = self.registry.clone();
        let (output, operation, affected) = apply(&mut self.registry)?;

        let entry = HistoryEntry::new(operation, extension_id, affected);
        if let Err(err) = self.store.save_snapshot(&self.registry.snapshot(), &entry) {
            error!(
                "event=registry_persist module=service status=error operation={} extension={} error={}",
                operation.as_str(),
                extension_id,
                err
            );
            self.registry = previous;
            return Err(err.into());
        }
        Ok(output)
    }
}

fn affected_ids(report: &InstallReport) -> Vec<String> {
    report
        .installed
        .iter()
        .chain(&report.upgraded)
        .chain(&report.auto_installed)
        .cloned()
        .collect()
}
