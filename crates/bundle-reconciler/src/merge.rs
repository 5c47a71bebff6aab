//! Merging the manifests of several input bundles into one.
//!
//! Inputs are processed strictly in invocation order: roots keep their first
//! occurrence, the first declared bundle default anchors the merged default,
//! and per-file overrides are emitted in input order.

use crate::manifest::{BundleManifest, MergedManifest};
use crate::types::{CompatibilityFlags, RegoVersion, ResolvedVersion};
use std::collections::HashSet;
use tracing::info;

/// One input root as seen by the merge.
#[derive(Debug, Clone, Copy)]
pub struct MergeInput<'a> {
    /// Filesystem path of the root, used to qualify override keys.
    pub root: &'a str,

    /// The root's manifest, when present and honored.
    pub manifest: Option<&'a BundleManifest>,

    /// Resolved versions of the root's files, in collection order.
    pub files: &'a [ResolvedVersion<'a>],
}

/// Combines per-root manifests and resolved versions.
#[derive(Debug, Clone, Default)]
pub struct ManifestMerger {
    flags: CompatibilityFlags,
    revision: Option<String>,
}

impl ManifestMerger {
    pub fn new(flags: CompatibilityFlags) -> Self {
        Self {
            flags,
            revision: None,
        }
    }

    /// Replaces whatever revision the merge would compute.
    pub fn with_revision(mut self, revision: Option<String>) -> Self {
        self.revision = revision;
        self
    }

    /// Merges the inputs into the output manifest.
    pub fn merge(&self, inputs: &[MergeInput<'_>]) -> MergedManifest {
        let roots = merge_roots(inputs);
        let revision = match &self.revision {
            Some(revision) => revision.clone(),
            None => merge_revision(inputs),
        };
        let rego_version = self.default_version(inputs);
        let file_rego_versions = file_overrides(inputs, rego_version);

        info!(
            inputs = inputs.len(),
            roots = roots.len(),
            rego_version = %rego_version,
            overrides = file_rego_versions.len(),
            "merged bundle manifests"
        );

        MergedManifest {
            revision,
            roots,
            rego_version,
            file_rego_versions,
        }
    }

    /// Picks the merged default version.
    ///
    /// A single input keeps the `rego_version` its manifest declares. Beyond
    /// that a compatibility flag decides when set. Otherwise the first input
    /// that declares a `rego_version` anchors the default, and without any
    /// declaration the toolchain default applies. Per-file overrides never
    /// influence the choice.
    pub fn default_version(&self, inputs: &[MergeInput<'_>]) -> RegoVersion {
        if let [only] = inputs {
            if let Some(version) = only.manifest.and_then(|m| m.rego_version) {
                return version;
            }
        }

        if let Some(version) = self.flags.version() {
            return version;
        }

        inputs
            .iter()
            .find_map(|input| input.manifest.and_then(|m| m.rego_version))
            .unwrap_or(RegoVersion::DEFAULT)
    }
}

/// Union of all roots, first occurrence wins.
fn merge_roots(inputs: &[MergeInput<'_>]) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut roots = Vec::new();

    for input in inputs {
        let declared = match input.manifest {
            Some(manifest) => manifest.effective_roots(),
            None => vec![String::new()],
        };
        for root in declared {
            if seen.insert(root.clone()) {
                roots.push(root);
            }
        }
    }

    roots
}

/// A revision identifies exactly one source; merges of several inputs drop it.
fn merge_revision(inputs: &[MergeInput<'_>]) -> String {
    match inputs {
        [only] => only
            .manifest
            .map(|m| m.revision.clone())
            .unwrap_or_default(),
        _ => String::new(),
    }
}

/// Root-qualified entries for every file that deviates from the default.
fn file_overrides(inputs: &[MergeInput<'_>], default: RegoVersion) -> Vec<(String, RegoVersion)> {
    let mut seen = HashSet::new();
    let mut overrides = Vec::new();

    for input in inputs {
        for resolved in input.files {
            if resolved.version == default {
                continue;
            }
            let key = crate::types::qualify(input.root, &resolved.file.relative_path);
            if seen.insert(key.clone()) {
                overrides.push((key, resolved.version));
            }
        }
    }

    overrides
}

/// Merges with the given flags and no revision override.
pub fn merge(inputs: &[MergeInput<'_>], flags: CompatibilityFlags) -> MergedManifest {
    ManifestMerger::new(flags).merge(inputs)
}
