//! Per-file Rego version resolution.
//!
//! Precedence, highest first:
//! 1. a `file_rego_versions` pattern of the root's manifest matching the file,
//! 2. the `rego_version` declared by the root's manifest,
//! 3. the compatibility flags (`force_v0` before `force_v1`),
//! 4. [`RegoVersion::DEFAULT`].

use crate::error::{BundleError, Result};
use crate::manifest::BundleManifest;
use crate::types::{CompatibilityFlags, RegoVersion, ResolutionSource, ResolvedVersion, SourceFile};
use tracing::debug;

/// Resolves the dialect of source files.
#[derive(Debug, Clone, Copy, Default)]
pub struct VersionResolver {
    flags: CompatibilityFlags,
}

impl VersionResolver {
    /// Creates a resolver for the given compatibility flags.
    pub fn new(flags: CompatibilityFlags) -> Self {
        Self { flags }
    }

    pub fn flags(&self) -> CompatibilityFlags {
        self.flags
    }

    /// Resolves one file against the manifest of its root.
    pub fn resolve<'a>(
        &self,
        file: &'a SourceFile,
        manifest: Option<&BundleManifest>,
    ) -> Result<ResolvedVersion<'a>> {
        let (version, source) = self.decide(file, manifest)?;
        debug!(
            file = %file.qualified_path(),
            version = %version,
            source = source.as_str(),
            "resolved rego version"
        );
        Ok(ResolvedVersion {
            file,
            version,
            source,
        })
    }

    /// Resolves every file of one root, collecting failures instead of
    /// stopping at the first.
    pub fn resolve_all<'a>(
        &self,
        files: &'a [SourceFile],
        manifest: Option<&BundleManifest>,
    ) -> (Vec<ResolvedVersion<'a>>, Vec<BundleError>) {
        let mut resolved = Vec::with_capacity(files.len());
        let mut errors = Vec::new();

        for file in files {
            match self.resolve(file, manifest) {
                Ok(r) => resolved.push(r),
                Err(e) => errors.push(e),
            }
        }

        (resolved, errors)
    }

    fn decide(
        &self,
        file: &SourceFile,
        manifest: Option<&BundleManifest>,
    ) -> Result<(RegoVersion, ResolutionSource)> {
        if let Some(manifest) = manifest {
            let matches = manifest.matching_overrides(&file.relative_path);
            match matches.as_slice() {
                [] => {}
                [only] => {
                    return Ok((
                        only.version,
                        ResolutionSource::Override {
                            pattern: only.pattern().to_string(),
                        },
                    ))
                }
                many => {
                    return Err(BundleError::AmbiguousOverride {
                        file: file.qualified_path(),
                        patterns: many.iter().map(|o| o.pattern().to_string()).collect(),
                    })
                }
            }

            if let Some(version) = manifest.rego_version {
                return Ok((version, ResolutionSource::BundleDefault));
            }
        }

        match self.flags.version() {
            Some(version) => Ok((version, ResolutionSource::Flag)),
            None => Ok((RegoVersion::DEFAULT, ResolutionSource::BuiltinDefault)),
        }
    }
}

/// Resolves a single file.
pub fn resolve<'a>(
    file: &'a SourceFile,
    manifest: Option<&BundleManifest>,
    flags: CompatibilityFlags,
) -> Result<ResolvedVersion<'a>> {
    VersionResolver::new(flags).resolve(file, manifest)
}
