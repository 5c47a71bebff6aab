//! Error and warning types for bundle reconciliation.

use std::fmt;
use thiserror::Error;

/// Result type for reconciliation operations.
pub type Result<T> = std::result::Result<T, BundleError>;

/// Errors that can occur while resolving, validating or merging bundles.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BundleError {
    /// More than one `file_rego_versions` pattern matches the same file.
    #[error("{file}: ambiguous rego version override, patterns {} all match", .patterns.join(", "))]
    AmbiguousOverride { file: String, patterns: Vec<String> },

    /// The resolved version needs a capability feature that is not declared.
    #[error("{file}: illegal capabilities: {feature} feature required for parsing v1 Rego")]
    Capability { file: String, feature: String },

    /// A `.manifest` descriptor is present but malformed.
    #[error("{root}: invalid bundle manifest: {reason}")]
    ManifestParse { root: String, reason: String },

    /// A path glob could not be compiled.
    #[error("invalid glob pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    /// A version tag is neither 0 nor 1.
    #[error("invalid rego version: {value}")]
    InvalidVersion { value: String },

    /// Reading or writing a bundle on disk failed.
    #[error("{path}: {message}")]
    Io { path: String, message: String },

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Invalid reconciliation options.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Every fatal error collected during one invocation.
    #[error("{}", ErrorList(.0))]
    Aggregate(Vec<BundleError>),
}

impl BundleError {
    /// Builds a single error from a collected list, flattening nested aggregates.
    ///
    /// Returns `None` when the list is empty.
    pub fn aggregate(errors: Vec<BundleError>) -> Option<BundleError> {
        let mut flat = Vec::with_capacity(errors.len());
        for err in errors {
            match err {
                BundleError::Aggregate(inner) => flat.extend(inner),
                other => flat.push(other),
            }
        }
        match flat.len() {
            0 => None,
            1 => flat.pop(),
            _ => Some(BundleError::Aggregate(flat)),
        }
    }

    /// Returns the individual errors this error stands for.
    pub fn errors(&self) -> Vec<&BundleError> {
        match self {
            BundleError::Aggregate(inner) => inner.iter().collect(),
            other => vec![other],
        }
    }

    /// Attaches the owning root to a pattern or version error raised while
    /// reading that root's manifest.
    pub(crate) fn in_manifest(self, root: &str) -> BundleError {
        match self {
            BundleError::ManifestParse { root: owner, reason } if owner.is_empty() => {
                BundleError::ManifestParse {
                    root: root.to_string(),
                    reason,
                }
            }
            BundleError::ManifestParse { .. } => self,
            other => BundleError::ManifestParse {
                root: root.to_string(),
                reason: other.to_string(),
            },
        }
    }
}

struct ErrorList<'a>(&'a [BundleError]);

impl fmt::Display for ErrorList<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} errors occurred:", self.0.len())?;
        for err in self.0 {
            write!(f, "\n{}", err)?;
        }
        Ok(())
    }
}

impl From<serde_json::Error> for BundleError {
    fn from(err: serde_json::Error) -> Self {
        BundleError::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for BundleError {
    fn from(err: serde_yaml::Error) -> Self {
        BundleError::Config(err.to_string())
    }
}

impl From<regex::Error> for BundleError {
    fn from(err: regex::Error) -> Self {
        BundleError::InvalidPattern {
            pattern: String::new(),
            reason: err.to_string(),
        }
    }
}

/// Non-fatal diagnostics reported next to a successful reconciliation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Warning {
    /// A root carries a `.manifest` but the invocation does not treat inputs
    /// as bundles, so the manifest is ignored.
    ConflictingRoots { root: String },
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Warning::ConflictingRoots { root } => write!(
                f,
                "{}: bundle manifest ignored, inputs are not loaded as bundles",
                root
            ),
        }
    }
}
