//! Bundle Reconciler
//!
//! Decides which Rego dialect every policy file of a build is parsed with,
//! checks that choice against the target capabilities, and merges the
//! manifests of several input bundles into one deterministic `.manifest`.
//!
//! Runs natively and, with the `wasm` feature, inside JavaScript hosts.

pub mod capabilities;
pub mod config;
pub mod error;
pub mod glob;
pub mod hash;
pub mod manifest;
pub mod merge;
pub mod reconcile;
pub mod resolver;
pub mod source;
pub mod types;
pub mod writer;

#[cfg(feature = "wasm")]
pub mod wasm;

pub use capabilities::Capabilities;
pub use config::ReconcileOptions;
pub use error::{BundleError, Result, Warning};
pub use manifest::{BundleManifest, MergedManifest};
pub use merge::ManifestMerger;
pub use reconcile::{Reconciler, Reconciliation};
pub use resolver::VersionResolver;
pub use source::{BundleInput, SourceCollector};
pub use writer::BundleWriter;

#[cfg(feature = "fs")]
pub use source::DirectoryCollector;
#[cfg(feature = "fs")]
pub use writer::DirectoryWriter;

/// Version of the reconciler.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Re-export commonly used types.
pub mod prelude {
    pub use crate::capabilities::Capabilities;
    pub use crate::config::ReconcileOptions;
    pub use crate::error::{BundleError, Result, Warning};
    pub use crate::manifest::{BundleManifest, MergedManifest};
    pub use crate::reconcile::{Reconciler, Reconciliation};
    pub use crate::source::{BundleInput, SourceCollector};
    pub use crate::types::*;
    pub use crate::writer::BundleWriter;
}
