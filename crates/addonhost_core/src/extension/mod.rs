//! Extension kernel contracts.
//!
//! This module turns static extension descriptors into registry entries,
//! orders them by dependency and drives their install lifecycle. Asset
//! compilation and rendering stay with the embedding host.

pub mod asset;
pub mod builtin;
pub mod graph;
pub mod kernel;
pub mod manifest;
