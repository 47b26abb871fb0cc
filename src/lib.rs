//! Workspace façade crate.
//!
//! This crate exists to expose shared feature flags that map to the individual
//! workspace crates. Host applications can depend on `cadence-workspace`, enable
//! `desktop-shims`, and reach the coordinator through the re-export below
//! without wiring each crate individually.

#[cfg(feature = "desktop-shims")]
pub use core_service as service;
