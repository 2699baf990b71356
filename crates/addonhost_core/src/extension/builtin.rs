//! First-party descriptors shipped with the host.

use crate::extension::asset::{AssetPathError, AssetRef};
use crate::extension::kernel::FirstPartyExtensionAdapter;
use crate::extension::manifest::ExtensionManifest;

/// Identifier of the base web capability.
pub const WEB_EXTENSION_ID: &str = "web";
/// Backend asset bundle that themes extend.
pub const WEB_ASSETS_BACKEND: &str = "web.assets_backend";
/// Identifier of the modern kanban theme.
pub const KANBAN_THEME_ID: &str = "theme_kanban_modern";

/// Style sheet overriding the kanban look.
pub const KANBAN_THEME_STYLESHEET: &str = "theme_kanban_modern/static/src/css/kanban_modern.scss";
/// Script patching the kanban renderer.
pub const KANBAN_THEME_RENDERER_PATCH: &str =
    "theme_kanban_modern/static/src/js/kanban_renderer_patch.js";

impl FirstPartyExtensionAdapter {
    /// Base web capability. Its own assets belong to the host and are not
    /// modelled, so it contributes nothing.
    pub fn web_baseline() -> Self {
        let mut manifest = ExtensionManifest::new(WEB_EXTENSION_ID, "Web", "19.0.1.0");
        manifest.category = Some("Hidden".to_string());
        manifest.license = Some("LGPL-3".to_string());
        manifest.auto_install = true;
        Self::new(manifest)
    }

    /// Modern Kanban View Theme descriptor.
    pub fn kanban_theme() -> Result<Self, AssetPathError> {
        let mut manifest =
            ExtensionManifest::new(KANBAN_THEME_ID, "Modern Kanban View Theme", "19.0.1.0.0");
        manifest.summary = Some("Global modern theme for every kanban view".to_string());
        manifest.category = Some("Technical".to_string());
        manifest.author = Some("Alphaqueb Consulting SAS".to_string());
        manifest.license = Some("LGPL-3".to_string());
        manifest.depends = vec![WEB_EXTENSION_ID.to_string()];
        manifest.assets.insert(
            WEB_ASSETS_BACKEND.to_string(),
            vec![
                AssetRef::new(KANBAN_THEME_STYLESHEET)?,
                AssetRef::new(KANBAN_THEME_RENDERER_PATCH)?,
            ],
        );
        Ok(Self::new(manifest))
    }
}
