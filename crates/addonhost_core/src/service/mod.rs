//! Service layer for registry use-cases.
//!
//! # Responsibility
//! - Expose stable lifecycle entry points to hosts and the CLI.
//! - Orchestrate registry mutations and store persistence.
//!
//! # Invariants
//! - Services never write registry rows outside `RegistryStore`.

pub mod install_service;
