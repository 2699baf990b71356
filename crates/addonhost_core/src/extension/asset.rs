//! Asset kinds and asset references contributed by extension descriptors.

use std::error::Error;
use std::fmt::{Display, Formatter};

/// Host-recognized asset kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AssetKind {
    Stylesheet,
    Script,
    Template,
}

impl AssetKind {
    /// Stable string id used in persisted bundle manifests.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Stylesheet => ASSET_KIND_STYLESHEET,
            Self::Script => ASSET_KIND_SCRIPT,
            Self::Template => ASSET_KIND_TEMPLATE,
        }
    }

    /// User-facing short description.
    pub fn description(self) -> &'static str {
        match self {
            Self::Stylesheet => "Style sheet source compiled into the bundle stylesheet.",
            Self::Script => "Script module loaded with the bundle.",
            Self::Template => "Markup template registered with the bundle.",
        }
    }
}

/// Persisted string value for style sheet assets.
pub const ASSET_KIND_STYLESHEET: &str = "stylesheet";
/// Persisted string value for script assets.
pub const ASSET_KIND_SCRIPT: &str = "script";
/// Persisted string value for template assets.
pub const ASSET_KIND_TEMPLATE: &str = "template";

const STYLESHEET_EXTENSIONS: &[&str] = &["css", "scss", "sass", "less"];
const SCRIPT_EXTENSIONS: &[&str] = &["js", "mjs", "ts"];
const TEMPLATE_EXTENSIONS: &[&str] = &["xml"];

/// Returns file extensions recognized for each asset kind.
pub fn supported_file_extensions() -> [(AssetKind, &'static [&'static str]); 3] {
    [
        (AssetKind::Stylesheet, STYLESHEET_EXTENSIONS),
        (AssetKind::Script, SCRIPT_EXTENSIONS),
        (AssetKind::Template, TEMPLATE_EXTENSIONS),
    ]
}

/// Parses a persisted asset kind id.
pub fn parse_asset_kind(value: &str) -> Result<AssetKind, AssetPathError> {
    match value.trim() {
        ASSET_KIND_STYLESHEET => Ok(AssetKind::Stylesheet),
        ASSET_KIND_SCRIPT => Ok(AssetKind::Script),
        ASSET_KIND_TEMPLATE => Ok(AssetKind::Template),
        other => Err(AssetPathError::UnsupportedKind(other.to_string())),
    }
}

/// Classifies one asset path by its file extension.
///
/// Extension matching is case-sensitive; hosts ship lowercase suffixes.
pub fn classify_asset_path(path: &str) -> Result<AssetKind, AssetPathError> {
    let normalized = path.trim();
    if normalized.is_empty() {
        return Err(AssetPathError::EmptyPath);
    }
    if normalized.starts_with('/') || normalized.contains('\\') {
        return Err(AssetPathError::NotRelative(normalized.to_string()));
    }
    if normalized.split('/').any(|segment| segment.is_empty() || segment == "..") {
        return Err(AssetPathError::NotRelative(normalized.to_string()));
    }

    let file_name = normalized.rsplit('/').next().unwrap_or(normalized);
    let Some((_, suffix)) = file_name.rsplit_once('.') else {
        return Err(AssetPathError::UnsupportedKind(normalized.to_string()));
    };

    supported_file_extensions()
        .into_iter()
        .find(|(_, extensions)| extensions.contains(&suffix))
        .map(|(kind, _)| kind)
        .ok_or_else(|| AssetPathError::UnsupportedKind(normalized.to_string()))
}

/// One asset file reference inside a descriptor's bundle contribution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetRef {
    /// Path relative to the addons root, e.g. `theme/static/src/css/a.scss`.
    pub path: String,
    pub kind: AssetKind,
    /// Declared override priority; entries with a higher value load later.
    pub priority: i32,
}

impl AssetRef {
    /// Builds a reference with the default priority, classifying its kind.
    pub fn new(path: impl Into<String>) -> Result<Self, AssetPathError> {
        Self::with_priority(path, 0)
    }

    pub fn with_priority(path: impl Into<String>, priority: i32) -> Result<Self, AssetPathError> {
        let path = path.into().trim().to_string();
        let kind = classify_asset_path(&path)?;
        Ok(Self {
            path,
            kind,
            priority,
        })
    }

    /// Returns the final path segment.
    pub fn file_name(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or(self.path.as_str())
    }
}

/// Asset path classification errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssetPathError {
    EmptyPath,
    NotRelative(String),
    UnsupportedKind(String),
}

impl Display for AssetPathError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyPath => write!(f, "asset path must not be empty"),
            Self::NotRelative(value) => {
                write!(f, "asset path must be a plain relative path: {value}")
            }
            Self::UnsupportedKind(value) => write!(f, "asset kind is unsupported: {value}"),
        }
    }
}

impl Error for AssetPathError {}
