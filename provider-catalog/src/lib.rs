//! # Catalog Provider
//!
//! Client for the third-party track catalog search API.
//!
//! ## Overview
//!
//! This module provides:
//! - `CatalogClient`: search requests with bearer credentials and an
//!   optional minimum interval between calls
//! - Normalisation of the upstream's varying response shapes into `Track`
//! - Failure classification into network, upstream, malformed and auth errors
//! - `CredentialProvider` implementations for static and expiring tokens

pub mod client;
pub mod credential;
pub mod error;
pub mod types;

pub use client::{CatalogClient, CatalogSettings};
pub use credential::{
    CachedCredential, CredentialProvider, IssuedToken, MissingCredential, StaticCredential,
    TokenSource,
};
pub use error::{CatalogError, Result};
pub use types::SearchPage;
