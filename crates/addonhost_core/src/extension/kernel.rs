//! Extension registry: loading, dependency ordering and install lifecycle.
//!
//! # Responsibility
//! - Register descriptors from first-party adapters or addon directories.
//! - Resolve install order over the dependency DAG.
//! - Install, upgrade and uninstall extensions, merging their assets into
//!   host bundles.
//!
//! # Invariants
//! - Identifiers are unique; every dependency is loaded before dependents.
//! - Operations are all-or-nothing: a failed call leaves states and bundles
//!   exactly as they were.
//! - Only `Installed` extensions own bundle entries.

use crate::bundle::{AssetBundle, BundleManifest};
use crate::config::{HostConfig, MissingAssetPolicy};
use crate::extension::asset::AssetRef;
use crate::extension::graph::topological_sort;
use crate::extension::manifest::{ExtensionManifest, ManifestParseError, MANIFEST_FILE_NAME};
use log::{info, warn};
use std::collections::{BTreeMap, BTreeSet};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::Path;

/// Host install state of one extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ExtensionState {
    Uninstalled,
    Installing,
    Installed,
    Upgrading,
}

impl ExtensionState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Uninstalled => "uninstalled",
            Self::Installing => "installing",
            Self::Installed => "installed",
            Self::Upgrading => "upgrading",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "uninstalled" => Some(Self::Uninstalled),
            "installing" => Some(Self::Installing),
            "installed" => Some(Self::Installed),
            "upgrading" => Some(Self::Upgrading),
            _ => None,
        }
    }

    /// Returns whether the host lifecycle allows `self -> next`.
    pub fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Uninstalled, Self::Installing)
                | (Self::Installing, Self::Installed)
                | (Self::Installed, Self::Upgrading)
                | (Self::Upgrading, Self::Installed)
                | (Self::Installed, Self::Uninstalled)
        )
    }
}

/// Where a registered descriptor came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtensionSource {
    FirstParty,
    AddonsPath,
}

/// Registered extension snapshot in the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisteredExtension {
    pub manifest: ExtensionManifest,
    pub source: ExtensionSource,
    pub state: ExtensionState,
}

impl RegisteredExtension {
    pub fn id(&self) -> &str {
        &self.manifest.id
    }

    pub fn is_installed(&self) -> bool {
        self.state == ExtensionState::Installed
    }
}

/// Descriptor provider consumed by the registry.
pub trait ExtensionAdapter {
    fn manifest(&self) -> &ExtensionManifest;
    fn source(&self) -> ExtensionSource;
}

/// Adapter for descriptors compiled into the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FirstPartyExtensionAdapter {
    manifest: ExtensionManifest,
}

impl FirstPartyExtensionAdapter {
    pub fn new(manifest: ExtensionManifest) -> Self {
        Self { manifest }
    }
}

impl ExtensionAdapter for FirstPartyExtensionAdapter {
    fn manifest(&self) -> &ExtensionManifest {
        &self.manifest
    }

    fn source(&self) -> ExtensionSource {
        ExtensionSource::FirstParty
    }
}

/// Adapter for a descriptor read from `<addons_root>/<id>/__manifest__.json`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddonDirAdapter {
    manifest: ExtensionManifest,
}

impl AddonDirAdapter {
    pub fn from_dir(dir: &Path) -> Result<Self, ManifestParseError> {
        Ok(Self {
            manifest: ExtensionManifest::from_dir(dir)?,
        })
    }
}

impl ExtensionAdapter for AddonDirAdapter {
    fn manifest(&self) -> &ExtensionManifest {
        &self.manifest
    }

    fn source(&self) -> ExtensionSource {
        ExtensionSource::AddonsPath
    }
}

/// Extensions touched by one lifecycle operation, in application order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstallReport {
    pub installed: Vec<String>,
    pub upgraded: Vec<String>,
    pub auto_installed: Vec<String>,
    /// Asset paths left out under `MissingAssetPolicy::Skip`.
    pub skipped_assets: Vec<String>,
}

/// Persisted state of one extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtensionRecord {
    pub id: String,
    pub version: String,
    pub state: ExtensionState,
}

/// Registry state that survives a host restart.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegistrySnapshot {
    pub extensions: Vec<ExtensionRecord>,
    pub bundles: Vec<AssetBundle>,
}

/// In-process extension registry.
#[derive(Debug, Clone, Default)]
pub struct ExtensionRegistry {
    config: HostConfig,
    entries: BTreeMap<String, RegisteredExtension>,
    bundles: BundleManifest,
}

impl ExtensionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: HostConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    pub fn config(&self) -> &HostConfig {
        &self.config
    }

    /// Registers one descriptor after validation.
    ///
    /// Every dependency must already be loaded.
    pub fn load(&mut self, adapter: &impl ExtensionAdapter) -> Result<(), ExtensionKernelError> {
        self.load_all(&[adapter as &dyn ExtensionAdapter])
    }

    /// Registers a batch of descriptors in dependency order.
    ///
    /// Dependencies may be satisfied by the registry or by the batch itself;
    /// input order does not matter. Nothing is registered if any descriptor
    /// fails.
    pub fn load_all(
        &mut self,
        adapters: &[&dyn ExtensionAdapter],
    ) -> Result<(), ExtensionKernelError> {
        let mut batch: BTreeMap<&str, &dyn ExtensionAdapter> = BTreeMap::new();
        for adapter in adapters {
            let manifest = adapter.manifest();
            manifest
                .validate()
                .map_err(|err| ExtensionKernelError::MalformedDescriptor(err.into()))?;
            let id = manifest.id.as_str();
            if self.entries.contains_key(id) || batch.insert(id, *adapter).is_some() {
                return Err(ExtensionKernelError::DuplicateIdentifier(id.to_string()));
            }
        }

        for (id, adapter) in &batch {
            for dependency in &adapter.manifest().depends {
                if !self.entries.contains_key(dependency) && !batch.contains_key(dependency.as_str())
                {
                    return Err(ExtensionKernelError::UnresolvedDependency {
                        extension: (*id).to_string(),
                        dependency: dependency.clone(),
                    });
                }
            }
        }

        let edges = batch.iter().flat_map(|(id, adapter)| {
            adapter
                .manifest()
                .depends
                .iter()
                .map(move |dependency| (dependency.as_str(), *id))
        });
        let order = topological_sort(batch.keys().copied(), edges).map_err(|err| {
            ExtensionKernelError::CyclicDependency(
                err.unresolved.into_iter().map(str::to_string).collect(),
            )
        })?;

        for id in order {
            let adapter = batch[id];
            self.entries.insert(
                id.to_string(),
                RegisteredExtension {
                    manifest: adapter.manifest().clone(),
                    source: adapter.source(),
                    state: ExtensionState::Uninstalled,
                },
            );
            info!(
                "event=extension_load module=extension status=ok extension={} version={}",
                id,
                adapter.manifest().version
            );
        }
        Ok(())
    }

    /// Loads every `<root>/<id>/__manifest__.json` below the configured addons root.
    ///
    /// Returns loaded ids sorted by name. Directories without a descriptor
    /// are ignored, and so are addons whose id is already registered. A
    /// malformed descriptor or a dependency problem rejects the whole scan.
    pub fn discover(&mut self) -> Result<Vec<String>, ExtensionKernelError> {
        let Some(root) = self.config.addons_root.clone() else {
            return Ok(Vec::new());
        };
        let read_dir = std::fs::read_dir(&root).map_err(|err| {
            ExtensionKernelError::AddonsPath(format!("{}: {err}", root.display()))
        })?;

        let mut dirs = Vec::new();
        for entry in read_dir {
            let entry = entry.map_err(|err| {
                ExtensionKernelError::AddonsPath(format!("{}: {err}", root.display()))
            })?;
            let path = entry.path();
            if path.join(MANIFEST_FILE_NAME).is_file() {
                dirs.push(path);
            }
        }
        dirs.sort();

        let mut adapters = Vec::with_capacity(dirs.len());
        for dir in &dirs {
            let adapter =
                AddonDirAdapter::from_dir(dir).map_err(ExtensionKernelError::MalformedDescriptor)?;
            let id = adapter.manifest().id.as_str();
            if let Some(existing) = self.entries.get(id) {
                warn!(
                    "event=extension_load module=extension status=skipped reason=duplicate_id extension={} registered_source={:?} path={}",
                    id,
                    existing.source,
                    dir.display()
                );
                continue;
            }
            adapters.push(adapter);
        }
        let refs: Vec<&dyn ExtensionAdapter> = adapters
            .iter()
            .map(|adapter| adapter as &dyn ExtensionAdapter)
            .collect();
        self.load_all(&refs)?;

        Ok(adapters
            .iter()
            .map(|adapter| adapter.manifest().id.clone())
            .collect())
    }

    /// Returns every loaded extension with dependencies before dependents.
    pub fn resolve_install_order(&self) -> Result<Vec<&RegisteredExtension>, ExtensionKernelError> {
        let ids = self.install_order_ids(self.entries.keys().map(String::as_str))?;
        Ok(ids.into_iter().filter_map(|id| self.entries.get(id)).collect())
    }

    /// Installs `extension_id` and any uninstalled dependencies, then every
    /// auto-install extension whose dependencies became satisfied.
    ///
    /// Installing an already installed extension re-applies its assets.
    pub fn install(&mut self, extension_id: &str) -> Result<InstallReport, ExtensionKernelError> {
        let current = self.require(extension_id)?;
        if current.is_installed() {
            return self.upgrade(extension_id, None);
        }

        let mut staged = self.clone();
        let mut report = InstallReport::default();
        staged.install_closure(extension_id, &mut report)?;
        staged.auto_install(&mut report)?;

        info!(
            "event=extension_install module=extension status=ok extension={} installed={} auto_installed={} skipped_assets={}",
            extension_id,
            report.installed.len(),
            report.auto_installed.len(),
            report.skipped_assets.len()
        );
        *self = staged;
        Ok(report)
    }

    /// Re-applies an installed extension, optionally with a new descriptor.
    ///
    /// New dependencies are installed first. The bundle ends with exactly one
    /// entry per declared asset.
    pub fn upgrade(
        &mut self,
        extension_id: &str,
        manifest: Option<ExtensionManifest>,
    ) -> Result<InstallReport, ExtensionKernelError> {
        let current = self.require(extension_id)?;
        if !current.is_installed() {
            return Err(ExtensionKernelError::NotInstalled(extension_id.to_string()));
        }

        let mut staged = self.clone();
        let mut report = InstallReport::default();
        if let Some(manifest) = manifest {
            staged.replace_manifest(extension_id, manifest)?;
        }

        let depends = staged.require(extension_id)?.manifest.depends.clone();
        for dependency in &depends {
            if !staged.require_dependency(extension_id, dependency)?.is_installed() {
                staged.install_closure(dependency, &mut report)?;
            }
        }

        staged.transition(extension_id, ExtensionState::Upgrading)?;
        staged.apply_assets(extension_id, &mut report)?;
        staged.transition(extension_id, ExtensionState::Installed)?;
        report.upgraded.push(extension_id.to_string());
        staged.auto_install(&mut report)?;

        info!(
            "event=extension_upgrade module=extension status=ok extension={} version={}",
            extension_id,
            staged.require(extension_id)?.manifest.version
        );
        *self = staged;
        Ok(report)
    }

    /// Uninstalls `extension_id` and every installed extension that depends
    /// on it, dependents first. Returns the uninstalled ids in that order.
    pub fn uninstall(&mut self, extension_id: &str) -> Result<Vec<String>, ExtensionKernelError> {
        if !self.require(extension_id)?.is_installed() {
            return Err(ExtensionKernelError::NotInstalled(extension_id.to_string()));
        }

        let mut affected = BTreeSet::from([extension_id]);
        loop {
            let before = affected.len();
            for entry in self.entries.values().filter(|entry| entry.is_installed()) {
                if entry
                    .manifest
                    .depends
                    .iter()
                    .any(|dependency| affected.contains(dependency.as_str()))
                {
                    affected.insert(entry.id());
                }
            }
            if affected.len() == before {
                break;
            }
        }

        let mut order = self.install_order_ids(affected.iter().copied())?;
        order.reverse();
        let order: Vec<String> = order.into_iter().map(str::to_string).collect();

        let mut staged = self.clone();
        for id in &order {
            let removed = staged.bundles.remove_owner(id);
            staged.transition(id, ExtensionState::Uninstalled)?;
            info!(
                "event=extension_uninstall module=extension status=ok extension={} assets_removed={}",
                id, removed
            );
        }
        *self = staged;
        Ok(order)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, extension_id: &str) -> Option<&RegisteredExtension> {
        self.entries.get(extension_id)
    }

    pub fn state(&self, extension_id: &str) -> Option<ExtensionState> {
        self.entries.get(extension_id).map(|entry| entry.state)
    }

    /// Installed extension ids in install order.
    pub fn installed_ids(&self) -> Result<Vec<String>, ExtensionKernelError> {
        Ok(self
            .resolve_install_order()?
            .into_iter()
            .filter(|entry| entry.is_installed())
            .map(|entry| entry.id().to_string())
            .collect())
    }

    /// Extensions flagged as top-level applications.
    pub fn list_applications(&self) -> Vec<&RegisteredExtension> {
        self.entries
            .values()
            .filter(|entry| entry.manifest.application)
            .collect()
    }

    pub fn bundle(&self, name: &str) -> Option<&AssetBundle> {
        self.bundles.bundle(name)
    }

    pub fn bundles(&self) -> &BundleManifest {
        &self.bundles
    }

    /// Declared priority of `path` inside `bundle`.
    pub fn priority_of(&self, bundle: &str, path: &str) -> Option<i32> {
        self.bundles.bundle(bundle)?.priority_of(path)
    }

    /// Captures extension states and bundles for persistence.
    pub fn snapshot(&self) -> RegistrySnapshot {
        RegistrySnapshot {
            extensions: self
                .entries
                .values()
                .map(|entry| ExtensionRecord {
                    id: entry.manifest.id.clone(),
                    version: entry.manifest.version.clone(),
                    state: entry.state,
                })
                .collect(),
            bundles: self.bundles.bundles().cloned().collect(),
        }
    }

    /// Restores persisted states and bundles onto loaded descriptors.
    ///
    /// Every recorded extension must be loaded; unrecorded ones stay
    /// uninstalled.
    pub fn restore(&mut self, snapshot: RegistrySnapshot) -> Result<(), ExtensionKernelError> {
        let mut staged = self.clone();
        for entry in staged.entries.values_mut() {
            entry.state = ExtensionState::Uninstalled;
        }
        for record in snapshot.extensions {
            let entry = staged
                .entries
                .get_mut(&record.id)
                .ok_or_else(|| ExtensionKernelError::NotLoaded(record.id.clone()))?;
            if entry.manifest.version != record.version {
                warn!(
                    "event=registry_restore module=extension status=degraded extension={} stored_version={} loaded_version={}",
                    record.id, record.version, entry.manifest.version
                );
            }
            entry.state = record.state;
        }

        staged.bundles = BundleManifest::new();
        for bundle in snapshot.bundles {
            staged.bundles.insert(bundle);
        }
        *self = staged;
        Ok(())
    }

    fn require(&self, extension_id: &str) -> Result<&RegisteredExtension, ExtensionKernelError> {
        self.entries
            .get(extension_id)
            .ok_or_else(|| ExtensionKernelError::NotLoaded(extension_id.to_string()))
    }

    fn require_dependency(
        &self,
        extension_id: &str,
        dependency: &str,
    ) -> Result<&RegisteredExtension, ExtensionKernelError> {
        self.entries
            .get(dependency)
            .ok_or_else(|| ExtensionKernelError::UnresolvedDependency {
                extension: extension_id.to_string(),
                dependency: dependency.to_string(),
            })
    }

    fn install_order_ids<'a>(
        &'a self,
        ids: impl Iterator<Item = &'a str>,
    ) -> Result<Vec<&'a str>, ExtensionKernelError> {
        let nodes: Vec<&str> = ids.collect();
        let edges = nodes.iter().flat_map(|id| {
            self.entries
                .get(*id)
                .into_iter()
                .flat_map(|entry| entry.manifest.depends.iter())
                .map(move |dependency| (dependency.as_str(), *id))
        });
        topological_sort(nodes.iter().copied(), edges).map_err(|err| {
            ExtensionKernelError::CyclicDependency(
                err.unresolved.into_iter().map(str::to_string).collect(),
            )
        })
    }

    fn install_closure(
        &mut self,
        extension_id: &str,
        report: &mut InstallReport,
    ) -> Result<(), ExtensionKernelError> {
        let mut pending = BTreeSet::new();
        let mut stack = vec![extension_id.to_string()];
        while let Some(id) = stack.pop() {
            let entry = self.require(&id)?;
            if entry.is_installed() || !pending.insert(id.clone()) {
                continue;
            }
            if !entry.manifest.installable {
                return Err(ExtensionKernelError::NotInstallable(id));
            }
            for dependency in &entry.manifest.depends {
                self.require_dependency(&id, dependency)?;
                stack.push(dependency.clone());
            }
        }

        let order: Vec<String> = self
            .install_order_ids(pending.iter().map(String::as_str))?
            .into_iter()
            .map(str::to_string)
            .collect();
        for id in order {
            self.transition(&id, ExtensionState::Installing)?;
            self.apply_assets(&id, report)?;
            self.transition(&id, ExtensionState::Installed)?;
            report.installed.push(id);
        }
        Ok(())
    }

    fn auto_install(&mut self, report: &mut InstallReport) -> Result<(), ExtensionKernelError> {
        loop {
            let ready: Vec<String> = self
                .entries
                .values()
                .filter(|entry| {
                    entry.state == ExtensionState::Uninstalled
                        && entry.manifest.auto_install
                        && entry.manifest.installable
                        && entry.manifest.depends.iter().all(|dependency| {
                            self.entries
                                .get(dependency)
                                .is_some_and(RegisteredExtension::is_installed)
                        })
                })
                .map(|entry| entry.manifest.id.clone())
                .collect();
            if ready.is_empty() {
                return Ok(());
            }

            for id in ready {
                let before = report.installed.len();
                self.install_closure(&id, report)?;
                let installed: Vec<String> = report.installed.drain(before..).collect();
                report.auto_installed.extend(installed);
            }
        }
    }

    fn apply_assets(
        &mut self,
        extension_id: &str,
        report: &mut InstallReport,
    ) -> Result<(), ExtensionKernelError> {
        let manifest = &self.require(extension_id)?.manifest;
        let mut assets: BTreeMap<String, Vec<AssetRef>> = BTreeMap::new();
        for (bundle, contribution) in &manifest.assets {
            let mut kept = Vec::with_capacity(contribution.len());
            for asset in contribution {
                if self.config.asset_exists(&asset.path) {
                    kept.push(asset.clone());
                    continue;
                }
                match self.config.missing_asset_policy {
                    MissingAssetPolicy::Abort => {
                        return Err(ExtensionKernelError::MissingAssetFile {
                            extension: extension_id.to_string(),
                            path: asset.path.clone(),
                        });
                    }
                    MissingAssetPolicy::Skip => {
                        warn!(
                            "event=asset_missing module=extension status=skipped extension={} bundle={} path={}",
                            extension_id, bundle, asset.path
                        );
                        report.skipped_assets.push(asset.path.clone());
                    }
                }
            }
            assets.insert(bundle.clone(), kept);
        }

        let outcome = self.bundles.apply_owner(extension_id, &assets);
        info!(
            "event=bundle_merge module=bundle status=ok extension={} added={} kept={} dropped={} reordered={}",
            extension_id, outcome.added, outcome.kept, outcome.dropped, outcome.reordered
        );
        Ok(())
    }

    fn replace_manifest(
        &mut self,
        extension_id: &str,
        manifest: ExtensionManifest,
    ) -> Result<(), ExtensionKernelError> {
        manifest
            .validate()
            .map_err(|err| ExtensionKernelError::MalformedDescriptor(err.into()))?;
        if manifest.id != extension_id {
            return Err(ExtensionKernelError::IdentifierMismatch {
                expected: extension_id.to_string(),
                actual: manifest.id,
            });
        }
        if !manifest.installable {
            return Err(ExtensionKernelError::NotInstallable(extension_id.to_string()));
        }
        for dependency in &manifest.depends {
            self.require_dependency(extension_id, dependency)?;
        }
        if let Some(entry) = self.entries.get_mut(extension_id) {
            entry.manifest = manifest;
        }
        self.install_order_ids(self.entries.keys().map(String::as_str))?;
        Ok(())
    }

    fn transition(
        &mut self,
        extension_id: &str,
        next: ExtensionState,
    ) -> Result<(), ExtensionKernelError> {
        let entry = self
            .entries
            .get_mut(extension_id)
            .ok_or_else(|| ExtensionKernelError::NotLoaded(extension_id.to_string()))?;
        if !entry.state.can_transition_to(next) {
            return Err(ExtensionKernelError::InvalidTransition {
                extension: extension_id.to_string(),
                from: entry.state,
                to: next,
            });
        }
        entry.state = next;
        Ok(())
    }
}

/// Registry errors. All of them abort the operation with nothing applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtensionKernelError {
    MalformedDescriptor(ManifestParseError),
    UnresolvedDependency {
        extension: String,
        dependency: String,
    },
    MissingAssetFile {
        extension: String,
        path: String,
    },
    DuplicateIdentifier(String),
    CyclicDependency(Vec<String>),
    NotInstallable(String),
    NotLoaded(String),
    NotInstalled(String),
    IdentifierMismatch {
        expected: String,
        actual: String,
    },
    InvalidTransition {
        extension: String,
        from: ExtensionState,
        to: ExtensionState,
    },
    AddonsPath(String),
}

impl Display for ExtensionKernelError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MalformedDescriptor(err) => write!(f, "malformed extension descriptor: {err}"),
            Self::UnresolvedDependency {
                extension,
                dependency,
            } => write!(
                f,
                "extension {extension} depends on unknown extension {dependency}"
            ),
            Self::MissingAssetFile { extension, path } => {
                write!(f, "extension {extension} references missing asset file {path}")
            }
            Self::DuplicateIdentifier(value) => {
                write!(f, "extension id already registered: {value}")
            }
            Self::CyclicDependency(ids) => {
                write!(f, "cyclic extension dependencies among: {}", ids.join(", "))
            }
            Self::NotInstallable(value) => write!(f, "extension is not installable: {value}"),
            Self::NotLoaded(value) => write!(f, "extension is not loaded: {value}"),
            Self::NotInstalled(value) => write!(f, "extension is not installed: {value}"),
            Self::IdentifierMismatch { expected, actual } => write!(
                f,
                "descriptor id {actual} does not match extension {expected}"
            ),
            Self::InvalidTransition {
                extension,
                from,
                to,
            } => write!(
                f,
                "extension {extension} cannot move from {} to {}",
                from.as_str(),
                to.as_str()
            ),
            Self::AddonsPath(message) => write!(f, "failed to scan addons path: {message}"),
        }
    }
}

impl Error for ExtensionKernelError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::MalformedDescriptor(err) => Some(err),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{
        ExtensionKernelError, ExtensionRegistry, ExtensionSource, ExtensionState,
        FirstPartyExtensionAdapter,
    };
    use crate::extension::asset::AssetRef;
    use crate::extension::manifest::ExtensionManifest;

    fn adapter(id: &str, depends: &[&str], assets: &[&str]) -> FirstPartyExtensionAdapter {
        let mut manifest = ExtensionManifest::new(id, id, "19.0.1.0.0");
        manifest.depends = depends.iter().map(|value| value.to_string()).collect();
        if !assets.is_empty() {
            manifest.assets.insert(
                "web.assets_backend".to_string(),
                assets
                    .iter()
                    .map(|path| AssetRef::new(*path).expect("asset"))
                    .collect(),
            );
        }
        FirstPartyExtensionAdapter::new(manifest)
    }

    #[test]
    fn loads_first_party_adapter_uninstalled() {
        let mut registry = ExtensionRegistry::new();
        registry
            .load(&adapter("web", &[], &["web/static/a.scss"]))
            .expect("web load");

        assert_eq!(registry.len(), 1);
        let entry = registry.get("web").expect("registered extension");
        assert_eq!(entry.source, ExtensionSource::FirstParty);
        assert_eq!(entry.state, ExtensionState::Uninstalled);
        assert!(registry.bundle("web.assets_backend").is_none());
    }

    #[test]
    fn rejects_duplicate_extension_id() {
        let mut registry = ExtensionRegistry::new();
        let web = adapter("web", &[], &[]);
        registry.load(&web).expect("first registration should succeed");
        let err = registry
            .load(&web)
            .expect_err("duplicate registration must fail");
        assert_eq!(err, ExtensionKernelError::DuplicateIdentifier("web".to_string()));
    }

    #[test]
    fn batch_load_accepts_any_order_and_is_atomic() {
        let mut registry = ExtensionRegistry::new();
        let theme = adapter("theme", &["web"], &[]);
        let web = adapter("web", &[], &[]);
        registry.load_all(&[&theme, &web]).expect("batch load");
        assert_eq!(registry.len(), 2);

        let mut registry = ExtensionRegistry::new();
        let a = adapter("a", &["b"], &[]);
        let b = adapter("b", &["a"], &[]);
        let err = registry.load_all(&[&a, &b]).expect_err("cycle must fail");
        assert!(matches!(err, ExtensionKernelError::CyclicDependency(_)));
        assert!(registry.is_empty());
    }

    #[test]
    fn install_pulls_dependencies_in_order() {
        let mut registry = ExtensionRegistry::new();
        let base = adapter("base", &[], &[]);
        let web = adapter("web", &["base"], &["web/static/a.scss"]);
        let theme = adapter("theme", &["web"], &["theme/static/b.scss"]);
        registry.load_all(&[&base, &web, &theme]).expect("load");

        let report = registry.install("theme").expect("install");
        assert_eq!(report.installed, vec!["base", "web", "theme"]);
        assert_eq!(
            registry.bundle("web.assets_backend").unwrap().paths(),
            vec!["web/static/a.scss", "theme/static/b.scss"]
        );
    }

    #[test]
    fn not_installable_fails_without_side_effects() {
        let mut registry = ExtensionRegistry::new();
        let web = adapter("web", &[], &["web/static/a.scss"]);
        let mut theme = adapter("theme", &["web"], &["theme/static/b.scss"]);
        theme.manifest.installable = false;
        registry.load_all(&[&web, &theme]).expect("load");

        let err = registry.install("theme").expect_err("not installable");
        assert_eq!(err, ExtensionKernelError::NotInstallable("theme".to_string()));
        assert_eq!(registry.state("web"), Some(ExtensionState::Uninstalled));
        assert!(registry.bundles().bundle_names().is_empty());
    }

    #[test]
    fn auto_install_follows_satisfied_dependencies() {
        let mut registry = ExtensionRegistry::new();
        let web = adapter("web", &[], &[]);
        let sale = adapter("sale", &["web"], &[]);
        let mut bridge = adapter("sale_theme_bridge", &["sale", "web"], &[]);
        bridge.manifest.auto_install = true;
        registry.load_all(&[&web, &sale, &bridge]).expect("load");

        let report = registry.install("web").expect("install web");
        assert!(report.auto_installed.is_empty());
        assert_eq!(registry.state("sale_theme_bridge"), Some(ExtensionState::Uninstalled));

        let report = registry.install("sale").expect("install sale");
        assert_eq!(report.auto_installed, vec!["sale_theme_bridge"]);
        assert_eq!(registry.state("sale_theme_bridge"), Some(ExtensionState::Installed));
    }

    #[test]
    fn uninstall_cascades_to_dependents() {
        let mut registry = ExtensionRegistry::new();
        let web = adapter("web", &[], &["web/static/a.scss"]);
        let theme = adapter("theme", &["web"], &["theme/static/b.scss"]);
        let other = adapter("other", &[], &["other/static/c.js"]);
        registry.load_all(&[&web, &theme, &other]).expect("load");
        registry.install("theme").expect("install theme");
        registry.install("other").expect("install other");

        let removed = registry.uninstall("web").expect("uninstall");
        assert_eq!(removed, vec!["theme", "web"]);
        assert_eq!(
            registry.bundle("web.assets_backend").unwrap().paths(),
            vec!["other/static/c.js"]
        );
        assert_eq!(registry.installed_ids().unwrap(), vec!["other"]);
    }

    #[test]
    fn uninstall_requires_installed_extension() {
        let mut registry = ExtensionRegistry::new();
        registry.load(&adapter("web", &[], &[])).expect("load");
        let err = registry.uninstall("web").expect_err("not installed");
        assert_eq!(err, ExtensionKernelError::NotInstalled("web".to_string()));
        let err = registry.uninstall("nope").expect_err("not loaded");
        assert_eq!(err, ExtensionKernelError::NotLoaded("nope".to_string()));
    }

    #[test]
    fn upgrade_with_new_descriptor_rewrites_contribution() {
        let mut registry = ExtensionRegistry::new();
        let web = adapter("web", &[], &["web/static/a.scss"]);
        let theme = adapter("theme", &["web"], &["theme/static/b.scss", "theme/static/c.js"]);
        registry.load_all(&[&web, &theme]).expect("load");
        registry.install("theme").expect("install");

        let mut next = theme.manifest.clone();
        next.version = "19.0.1.1.0".to_string();
        next.assets.insert(
            "web.assets_backend".to_string(),
            vec![
                AssetRef::new("theme/static/b.scss").unwrap(),
                AssetRef::new("theme/static/d.js").unwrap(),
            ],
        );
        let report = registry.upgrade("theme", Some(next)).expect("upgrade");
        assert_eq!(report.upgraded, vec!["theme"]);
        assert_eq!(
            registry.bundle("web.assets_backend").unwrap().paths(),
            vec!["web/static/a.scss", "theme/static/b.scss", "theme/static/d.js"]
        );
        assert_eq!(registry.get("theme").unwrap().manifest.version, "19.0.1.1.0");
    }

    #[test]
    fn upgrade_rejects_mismatched_identifier() {
        let mut registry = ExtensionRegistry::new();
        let web = adapter("web", &[], &[]);
        registry.load(&web).expect("load");
        registry.install("web").expect("install");

        let other = ExtensionManifest::new("not_web", "Other", "1.0");
        let err = registry.upgrade("web", Some(other)).expect_err("id mismatch");
        assert!(matches!(err, ExtensionKernelError::IdentifierMismatch { .. }));
    }

    #[test]
    fn upgrade_rejects_descriptor_marked_not_installable() {
        let mut registry = ExtensionRegistry::new();
        let web = adapter("web", &[], &[]);
        let theme = adapter("theme", &["web"], &["theme/static/b.scss"]);
        registry.load_all(&[&web, &theme]).expect("load");
        registry.install("theme").expect("install");

        let mut next = theme.manifest.clone();
        next.version = "19.0.2.0.0".to_string();
        next.installable = false;
        let err = registry.upgrade("theme", Some(next)).expect_err("not installable");
        assert_eq!(err, ExtensionKernelError::NotInstallable("theme".to_string()));
        let entry = registry.get("theme").expect("theme");
        assert!(entry.manifest.installable);
        assert_eq!(entry.manifest.version, "19.0.1.0.0");
        assert_eq!(entry.state, ExtensionState::Installed);
    }

    #[test]
    fn state_machine_rejects_skipping_states() {
        assert!(ExtensionState::Uninstalled.can_transition_to(ExtensionState::Installing));
        assert!(!ExtensionState::Uninstalled.can_transition_to(ExtensionState::Installed));
        assert!(!ExtensionState::Installing.can_transition_to(ExtensionState::Upgrading));
        assert!(ExtensionState::Installed.can_transition_to(ExtensionState::Uninstalled));
        for state in [
            ExtensionState::Uninstalled,
            ExtensionState::Installing,
            ExtensionState::Installed,
            ExtensionState::Upgrading,
        ] {
            assert_eq!(ExtensionState::parse(state.as_str()), Some(state));
        }
    }

    #[test]
    fn snapshot_restores_onto_fresh_registry() {
        let mut registry = ExtensionRegistry::new();
        let web = adapter("web", &[], &["web/static/a.scss"]);
        let theme = adapter("theme", &["web"], &["theme/static/b.scss"]);
        registry.load_all(&[&web, &theme]).expect("load");
        registry.install("theme").expect("install");

        let mut restored = ExtensionRegistry::new();
        restored.load_all(&[&web, &theme]).expect("load");
        restored.restore(registry.snapshot()).expect("restore");
        assert_eq!(restored.installed_ids().unwrap(), vec!["web", "theme"]);
        assert_eq!(restored.bundles(), registry.bundles());

        let mut empty = ExtensionRegistry::new();
        let err = empty.restore(registry.snapshot()).expect_err("unknown ids");
        assert!(matches!(err, ExtensionKernelError::NotLoaded(_)));
    }
}
