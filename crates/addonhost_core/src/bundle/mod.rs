//! Host asset bundles.
//!
//! # Responsibility
//! - Hold the ordered asset lists that the host loads per UI surface.
//! - Apply and remove extension contributions without disturbing others.
//!
//! # Invariants
//! - Load order is `(priority, sequence)`; equal priorities mean stable append.
//! - Empty bundles are not kept in the manifest.

pub mod asset_bundle;

pub use asset_bundle::{AssetBundle, BundleEntry, BundleManifest, MergeOutcome};
