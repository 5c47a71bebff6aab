//! The reconciliation pass: resolve every file, validate the result against
//! the capability set, then merge the input manifests.
//!
//! Resolution and validation failures are collected across all roots and
//! returned as one error; no manifest is produced when any occurred.

use crate::capabilities::{Capabilities, CapabilityValidator};
use crate::config::ReconcileOptions;
use crate::error::{BundleError, Result, Warning};
use crate::hash;
use crate::manifest::{BundleManifest, MergedManifest};
use crate::merge::{ManifestMerger, MergeInput};
use crate::resolver::VersionResolver;
use crate::source::BundleInput;
use crate::types::{CompatibilityFlags, InvocationMode, ResolvedVersion};
use crate::writer::BundleWriter;
use tracing::{info, warn};

/// Outcome of a successful reconciliation.
#[derive(Debug, Clone)]
pub struct Reconciliation<'a> {
    /// Manifest of the output bundle.
    pub manifest: MergedManifest,

    /// Resolved version of every input file, in input order.
    pub resolved: Vec<ResolvedVersion<'a>>,

    /// Non-fatal diagnostics.
    pub warnings: Vec<Warning>,

    /// Digest over the qualified paths and contents of all input files.
    pub input_digest: String,
}

/// Runs the reconciliation pass over collected inputs.
#[derive(Debug, Clone)]
pub struct Reconciler {
    mode: InvocationMode,
    flags: CompatibilityFlags,
    capabilities: Capabilities,
    revision: Option<String>,
}

impl Default for Reconciler {
    fn default() -> Self {
        Self {
            mode: InvocationMode::default(),
            flags: CompatibilityFlags::default(),
            capabilities: Capabilities::current(),
            revision: None,
        }
    }
}

impl Reconciler {
    /// Creates a bundle-mode reconciler with toolchain capabilities.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a reconciler from options, loading capabilities as needed.
    pub fn from_options(options: &ReconcileOptions) -> Result<Self> {
        options.validate()?;
        Ok(Self {
            mode: options.mode,
            flags: options.flags,
            capabilities: options.resolve_capabilities()?,
            revision: options.revision.clone(),
        })
    }

    pub fn with_mode(mut self, mode: InvocationMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_flags(mut self, flags: CompatibilityFlags) -> Self {
        self.flags = flags;
        self
    }

    pub fn with_capabilities(mut self, capabilities: Capabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    pub fn with_revision(mut self, revision: Option<String>) -> Self {
        self.revision = revision;
        self
    }

    /// The manifest honored for an input under the current mode.
    fn honored_manifest<'a>(
        &self,
        input: &'a BundleInput,
        warnings: &mut Vec<Warning>,
    ) -> Option<&'a BundleManifest> {
        match self.mode {
            InvocationMode::Bundle => input.manifest.as_ref(),
            InvocationMode::Loose => {
                if input.manifest.is_some() {
                    let warning = Warning::ConflictingRoots {
                        root: input.root.clone(),
                    };
                    warn!(root = %input.root, "{}", warning);
                    warnings.push(warning);
                }
                None
            }
        }
    }

    /// Resolves, validates and merges the inputs, in order.
    pub fn reconcile<'a>(&self, inputs: &'a [BundleInput]) -> Result<Reconciliation<'a>> {
        let resolver = VersionResolver::new(self.flags);
        let validator = CapabilityValidator::new(&self.capabilities);
        let mut warnings = Vec::new();
        let mut errors = Vec::new();
        let mut manifests = Vec::with_capacity(inputs.len());
        let mut per_root = Vec::with_capacity(inputs.len());

        for input in inputs {
            let manifest = self.honored_manifest(input, &mut warnings);
            let (resolved, resolve_errors) = resolver.resolve_all(&input.files, manifest);
            errors.extend(resolve_errors);
            errors.extend(validator.validate_all(&resolved));
            manifests.push(manifest);
            per_root.push(resolved);
        }

        if let Some(err) = BundleError::aggregate(errors) {
            return Err(err);
        }

        let merge_inputs: Vec<MergeInput<'_>> = inputs
            .iter()
            .zip(&manifests)
            .zip(&per_root)
            .map(|((input, manifest), files)| MergeInput {
                root: &input.root,
                manifest: *manifest,
                files,
            })
            .collect();

        let manifest = ManifestMerger::new(self.flags)
            .with_revision(self.revision.clone())
            .merge(&merge_inputs);

        let input_digest = hash::files_digest(inputs.iter().flat_map(|i| i.files.iter()));
        info!(
            roots = inputs.len(),
            input_digest = %input_digest,
            warnings = warnings.len(),
            "reconciled bundle inputs"
        );

        Ok(Reconciliation {
            manifest,
            resolved: per_root.into_iter().flatten().collect(),
            warnings,
            input_digest,
        })
    }

    /// Reconciles the inputs and hands the result to `writer`.
    ///
    /// The writer is only invoked once reconciliation succeeded.
    pub fn build<'a, W: BundleWriter>(
        &self,
        inputs: &'a [BundleInput],
        writer: &W,
    ) -> Result<Reconciliation<'a>> {
        let reconciliation = self.reconcile(inputs)?;
        writer.write(&reconciliation.manifest, &reconciliation.resolved)?;
        Ok(reconciliation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capabilities::FEATURE_REGO_V1;
    use crate::types::{RegoVersion, ResolutionSource};
    use std::cell::Cell;

    struct CountingWriter {
        calls: Cell<usize>,
    }

    impl BundleWriter for CountingWriter {
        fn write(&self, _: &MergedManifest, _: &[ResolvedVersion<'_>]) -> Result<()> {
            self.calls.set(self.calls.get() + 1);
            Ok(())
        }
    }

    fn v0_bundle(root: &str) -> BundleInput {
        BundleInput::new(root)
            .with_manifest(BundleManifest::new().with_rego_version(RegoVersion::V0))
            .with_file("policy.rego", "package a")
    }

    #[test]
    fn test_loose_mode_ignores_manifest_with_warning() {
        let inputs = vec![v0_bundle("/b1")];
        let result = Reconciler::new()
            .with_mode(InvocationMode::Loose)
            .reconcile(&inputs)
            .unwrap();

        assert_eq!(
            result.warnings,
            vec![Warning::ConflictingRoots {
                root: "/b1".to_string()
            }]
        );
        assert_eq!(result.resolved[0].version, RegoVersion::DEFAULT);
        assert_eq!(result.resolved[0].source, ResolutionSource::BuiltinDefault);
        assert_eq!(result.manifest.rego_version, RegoVersion::DEFAULT);
        assert!(result.manifest.file_rego_versions.is_empty());
    }

    #[test]
    fn test_bundle_mode_honors_manifest() {
        let inputs = vec![v0_bundle("/b1")];
        let result = Reconciler::new().reconcile(&inputs).unwrap();

        assert!(result.warnings.is_empty());
        assert_eq!(result.resolved[0].version, RegoVersion::V0);
        assert_eq!(result.manifest.rego_version, RegoVersion::V0);
    }

    #[test]
    fn test_errors_are_collected_across_roots() {
        let ambiguous = BundleManifest::new()
            .with_file_override("*/x.rego", RegoVersion::V0)
            .unwrap()
            .with_file_override("/x*", RegoVersion::V1)
            .unwrap();
        let inputs = vec![
            BundleInput::new("/b1")
                .with_manifest(ambiguous)
                .with_file("x.rego", "")
                .with_file("y.rego", ""),
            BundleInput::new("/b2").with_file("z.rego", ""),
        ];

        let caps = Capabilities::current().without_feature(FEATURE_REGO_V1);
        let err = Reconciler::new()
            .with_capabilities(caps)
            .reconcile(&inputs)
            .unwrap_err();

        let errors = err.errors();
        assert_eq!(errors.len(), 3);
        assert!(matches!(errors[0], BundleError::AmbiguousOverride { .. }));
        assert_eq!(
            errors[1],
            &BundleError::Capability {
                file: "/b1/y.rego".to_string(),
                feature: FEATURE_REGO_V1.to_string(),
            }
        );
        assert!(errors[2].to_string().starts_with("/b2/z.rego:"));
    }

    #[test]
    fn test_build_skips_writer_on_failure() {
        let writer = CountingWriter { calls: Cell::new(0) };
        let inputs = vec![BundleInput::new("/b1").with_file("p.rego", "")];

        let no_v1 = Capabilities::current().without_feature(FEATURE_REGO_V1);
        assert!(Reconciler::new()
            .with_capabilities(no_v1)
            .build(&inputs, &writer)
            .is_err());
        assert_eq!(writer.calls.get(), 0);

        Reconciler::new().build(&inputs, &writer).unwrap();
        assert_eq!(writer.calls.get(), 1);
    }

    #[test]
    fn test_from_options() {
        let options = ReconcileOptions::new()
            .with_flags(CompatibilityFlags::v0_compatible())
            .with_revision("r42");
        let inputs = vec![
            BundleInput::new("/b1").with_file("a.rego", ""),
            BundleInput::new("/b2").with_file("b.rego", ""),
        ];

        let result = Reconciler::from_options(&options)
            .unwrap()
            .reconcile(&inputs)
            .unwrap();
        assert_eq!(result.manifest.revision, "r42");
        assert_eq!(result.manifest.rego_version, RegoVersion::V0);
        assert_eq!(result.input_digest.len(), 64);
    }
}
