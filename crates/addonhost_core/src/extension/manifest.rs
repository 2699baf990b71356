//! Extension descriptor declaration, parsing and validation.
//!
//! # Responsibility
//! - Turn a descriptor file into a typed `ExtensionManifest`.
//! - Enforce declaration-level invariants before the registry sees it.
//!
//! # Invariants
//! - The identifier is the directory name that holds the descriptor file.
//! - `name` (human title) and `depends` are required keys.
//! - Every asset reference is a relative path of a recognized kind.

use crate::extension::asset::{classify_asset_path, AssetPathError, AssetRef};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::Path;

/// File name of the descriptor inside an extension directory.
pub const MANIFEST_FILE_NAME: &str = "__manifest__.json";

static EXTENSION_ID_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z][a-z0-9_]*$").expect("extension id regex"));
static VERSION_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d+(\.\d+){1,4}$").expect("version regex"));
static BUNDLE_NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z][a-z0-9_]*\.[a-z0-9_]+$").expect("bundle name regex"));

/// Returns whether `value` is a well-formed extension identifier.
pub fn is_valid_extension_id(value: &str) -> bool {
    EXTENSION_ID_RE.is_match(value)
}

/// Returns whether `value` is a well-formed `<extension>.<bundle>` name.
pub fn is_valid_bundle_name(value: &str) -> bool {
    BUNDLE_NAME_RE.is_match(value)
}

/// Typed extension descriptor.
///
/// Descriptive fields (`summary`, `category`, `author`, `license`) carry no
/// behavior; lifecycle flags drive the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtensionManifest {
    /// Stable technical identifier, e.g. `theme_kanban_modern`.
    pub id: String,
    /// Human title shown to operators.
    pub name: String,
    /// Host-scoped version, e.g. `19.0.1.0.0`.
    pub version: String,
    pub summary: Option<String>,
    pub category: Option<String>,
    pub author: Option<String>,
    pub license: Option<String>,
    /// Extensions that must be installed first, in declaration order.
    pub depends: Vec<String>,
    /// Target bundle name -> ordered asset references.
    pub assets: BTreeMap<String, Vec<AssetRef>>,
    pub installable: bool,
    pub auto_install: bool,
    pub application: bool,
}

impl ExtensionManifest {
    /// Creates a descriptor with required fields and host defaults.
    pub fn new(id: impl Into<String>, name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            version: version.into(),
            summary: None,
            category: None,
            author: None,
            license: None,
            depends: Vec::new(),
            assets: BTreeMap::new(),
            installable: true,
            auto_install: false,
            application: false,
        }
    }

    /// Parses a JSON descriptor for the extension named `id`.
    pub fn from_json_str(id: &str, json: &str) -> Result<Self, ManifestParseError> {
        let raw: RawManifest =
            serde_json::from_str(json).map_err(|err| ManifestParseError::Json(err.to_string()))?;
        let manifest = raw.into_manifest(id)?;
        manifest.validate()?;
        Ok(manifest)
    }

    /// Reads `<dir>/__manifest__.json`, using the directory name as identifier.
    pub fn from_dir(dir: &Path) -> Result<Self, ManifestParseError> {
        let id = dir
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| ManifestParseError::Io(format!("invalid extension dir: {}", dir.display())))?
            .to_string();
        let path = dir.join(MANIFEST_FILE_NAME);
        let content = std::fs::read_to_string(&path)
            .map_err(|err| ManifestParseError::Io(format!("{}: {err}", path.display())))?;
        Self::from_json_str(&id, &content)
    }

    /// Validates declaration-level descriptor invariants.
    pub fn validate(&self) -> Result<(), ManifestValidationError> {
        if self.id.trim().is_empty() {
            return Err(ManifestValidationError::EmptyId);
        }
        if !is_valid_extension_id(&self.id) {
            return Err(ManifestValidationError::InvalidId(self.id.clone()));
        }
        if self.name.trim().is_empty() {
            return Err(ManifestValidationError::EmptyName);
        }

        if self.version.trim().is_empty() {
            return Err(ManifestValidationError::EmptyVersion);
        }
        if !VERSION_RE.is_match(&self.version) {
            return Err(ManifestValidationError::InvalidVersion(
                self.version.clone(),
            ));
        }

        let mut seen_depends = BTreeSet::<&str>::new();
        for dependency in &self.depends {
            if !is_valid_extension_id(dependency) {
                return Err(ManifestValidationError::InvalidDependency(
                    dependency.clone(),
                ));
            }
            if dependency == &self.id {
                return Err(ManifestValidationError::SelfDependency(dependency.clone()));
            }
            if !seen_depends.insert(dependency.as_str()) {
                return Err(ManifestValidationError::DuplicateDependency(
                    dependency.clone(),
                ));
            }
        }

        for (bundle, assets) in &self.assets {
            if !is_valid_bundle_name(bundle) {
                return Err(ManifestValidationError::InvalidBundleName(bundle.clone()));
            }
            if assets.is_empty() {
                return Err(ManifestValidationError::EmptyBundleContribution(
                    bundle.clone(),
                ));
            }

            let mut seen_paths = BTreeSet::<&str>::new();
            for asset in assets {
                let kind = classify_asset_path(&asset.path).map_err(|error| {
                    ManifestValidationError::InvalidAsset {
                        bundle: bundle.clone(),
                        error,
                    }
                })?;
                if kind != asset.kind {
                    return Err(ManifestValidationError::AssetKindMismatch(
                        asset.path.clone(),
                    ));
                }
                if !seen_paths.insert(asset.path.as_str()) {
                    return Err(ManifestValidationError::DuplicateAsset {
                        bundle: bundle.clone(),
                        path: asset.path.clone(),
                    });
                }
            }
        }

        Ok(())
    }

    /// Returns this descriptor's contribution to one bundle.
    pub fn contribution(&self, bundle: &str) -> &[AssetRef] {
        self.assets.get(bundle).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Total number of asset references across all bundles.
    pub fn asset_count(&self) -> usize {
        self.assets.values().map(Vec::len).sum()
    }
}

#[derive(Debug, Deserialize)]
struct RawManifest {
    name: Option<String>,
    version: Option<String>,
    summary: Option<String>,
    category: Option<String>,
    author: Option<String>,
    license: Option<String>,
    depends: Option<Vec<String>>,
    #[serde(default)]
    assets: BTreeMap<String, Vec<RawAssetEntry>>,
    #[serde(default = "default_true")]
    installable: bool,
    #[serde(default)]
    auto_install: bool,
    #[serde(default)]
    application: bool,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawAssetEntry {
    Path(String),
    Detailed {
        path: String,
        #[serde(default)]
        priority: i32,
    },
}

fn default_true() -> bool {
    true
}

impl RawManifest {
    fn into_manifest(self, id: &str) -> Result<ExtensionManifest, ManifestParseError> {
        let name = self.name.ok_or(ManifestParseError::MissingField("name"))?;
        let depends = self
            .depends
            .ok_or(ManifestParseError::MissingField("depends"))?;
        // Hosts default the version when a descriptor omits it.
        let version = self.version.unwrap_or_else(|| "1.0".to_string());

        let mut assets = BTreeMap::new();
        for (bundle, entries) in self.assets {
            let mut refs = Vec::with_capacity(entries.len());
            for entry in entries {
                let asset = match entry {
                    RawAssetEntry::Path(path) => AssetRef::new(path),
                    RawAssetEntry::Detailed { path, priority } => {
                        AssetRef::with_priority(path, priority)
                    }
                }
                .map_err(|error| {
                    ManifestParseError::Invalid(ManifestValidationError::InvalidAsset {
                        bundle: bundle.clone(),
                        error,
                    })
                })?;
                refs.push(asset);
            }
            assets.insert(bundle, refs);
        }

        Ok(ExtensionManifest {
            id: id.trim().to_string(),
            name,
            version,
            summary: self.summary,
            category: self.category,
            author: self.author,
            license: self.license,
            depends,
            assets,
            installable: self.installable,
            auto_install: self.auto_install,
            application: self.application,
        })
    }
}

/// Descriptor validation errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManifestValidationError {
    EmptyId,
    InvalidId(String),
    EmptyName,
    EmptyVersion,
    InvalidVersion(String),
    InvalidDependency(String),
    SelfDependency(String),
    DuplicateDependency(String),
    InvalidBundleName(String),
    EmptyBundleContribution(String),
    InvalidAsset {
        bundle: String,
        error: AssetPathError,
    },
    AssetKindMismatch(String),
    DuplicateAsset {
        bundle: String,
        path: String,
    },
}

impl Display for ManifestValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyId => write!(f, "descriptor id must not be empty"),
            Self::InvalidId(value) => write!(f, "descriptor id is invalid: {value}"),
            Self::EmptyName => write!(f, "descriptor name must not be empty"),
            Self::EmptyVersion => write!(f, "descriptor version must not be empty"),
            Self::InvalidVersion(value) => write!(
                f,
                "descriptor version is invalid: {value} (expected 2 to 5 numeric parts)"
            ),
            Self::InvalidDependency(value) => {
                write!(f, "descriptor dependency id is invalid: {value}")
            }
            Self::SelfDependency(value) => {
                write!(f, "descriptor must not depend on itself: {value}")
            }
            Self::DuplicateDependency(value) => {
                write!(f, "descriptor dependency is duplicated: {value}")
            }
            Self::InvalidBundleName(value) => write!(f, "asset bundle name is invalid: {value}"),
            Self::EmptyBundleContribution(value) => {
                write!(f, "asset bundle contribution is empty: {value}")
            }
            Self::InvalidAsset { bundle, error } => {
                write!(f, "invalid asset in bundle {bundle}: {error}")
            }
            Self::AssetKindMismatch(value) => {
                write!(f, "asset kind does not match its path: {value}")
            }
            Self::DuplicateAsset { bundle, path } => {
                write!(f, "asset {path} is listed twice in bundle {bundle}")
            }
        }
    }
}

impl Error for ManifestValidationError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidAsset { error, .. } => Some(error),
            _ => None,
        }
    }
}

/// Descriptor file read/parse errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManifestParseError {
    Io(String),
    Json(String),
    MissingField(&'static str),
    Invalid(ManifestValidationError),
}

impl Display for ManifestParseError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(message) => write!(f, "failed to read descriptor: {message}"),
            Self::Json(message) => write!(f, "descriptor is not valid JSON: {message}"),
            Self::MissingField(name) => write!(f, "descriptor missing required field: {name}"),
            Self::Invalid(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ManifestParseError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Invalid(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ManifestValidationError> for ManifestParseError {
    fn from(value: ManifestValidationError) -> Self {
        Self::Invalid(value)
    }
}
