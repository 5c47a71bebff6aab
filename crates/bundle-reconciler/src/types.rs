//! Core types for version reconciliation.

use crate::error::BundleError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The Rego dialect a source file is parsed with.
///
/// Serialized as the integer used in bundle manifests (`0` or `1`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "u8")]
pub enum RegoVersion {
    /// The legacy dialect.
    V0,
    /// The current dialect.
    V1,
}

impl RegoVersion {
    /// The toolchain's baseline dialect, used when nothing else decides.
    pub const DEFAULT: RegoVersion = RegoVersion::V1;

    pub fn as_int(&self) -> u8 {
        match self {
            RegoVersion::V0 => 0,
            RegoVersion::V1 => 1,
        }
    }

    pub fn from_int(value: i64) -> Option<Self> {
        match value {
            0 => Some(RegoVersion::V0),
            1 => Some(RegoVersion::V1),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RegoVersion::V0 => "v0",
            RegoVersion::V1 => "v1",
        }
    }
}

impl Default for RegoVersion {
    fn default() -> Self {
        RegoVersion::DEFAULT
    }
}

impl fmt::Display for RegoVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<i64> for RegoVersion {
    type Error = BundleError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        RegoVersion::from_int(value).ok_or_else(|| BundleError::InvalidVersion {
            value: value.to_string(),
        })
    }
}

impl From<RegoVersion> for u8 {
    fn from(version: RegoVersion) -> Self {
        version.as_int()
    }
}

/// Global compatibility switches supplied by the invocation.
///
/// `force_v0` takes precedence over `force_v1` when both are set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CompatibilityFlags {
    #[serde(alias = "v0_compatible")]
    pub force_v0: bool,
    #[serde(alias = "v1_compatible")]
    pub force_v1: bool,
}

impl CompatibilityFlags {
    pub fn v0_compatible() -> Self {
        Self {
            force_v0: true,
            force_v1: false,
        }
    }

    pub fn v1_compatible() -> Self {
        Self {
            force_v0: false,
            force_v1: true,
        }
    }

    /// The version forced by these flags, if any.
    pub fn version(&self) -> Option<RegoVersion> {
        if self.force_v0 {
            Some(RegoVersion::V0)
        } else if self.force_v1 {
            Some(RegoVersion::V1)
        } else {
            None
        }
    }
}

/// Whether inputs are loaded as bundles (honoring their manifests) or as
/// loose policy and data files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvocationMode {
    Bundle,
    Loose,
}

impl Default for InvocationMode {
    fn default() -> Self {
        InvocationMode::Bundle
    }
}

/// A source file read from one input root.
///
/// Identified by `(root, relative_path)`. The relative path always uses `/`
/// separators and starts with `/`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub root: String,
    pub relative_path: String,
    pub content: Vec<u8>,
}

impl SourceFile {
    pub fn new(root: impl Into<String>, relative_path: &str, content: impl Into<Vec<u8>>) -> Self {
        Self {
            root: root.into(),
            relative_path: normalize_relative(relative_path),
            content: content.into(),
        }
    }

    /// The path qualified by the originating root, e.g. `/srv/b1/x.rego`.
    pub fn qualified_path(&self) -> String {
        qualify(&self.root, &self.relative_path)
    }
}

/// Normalizes a bundle-relative path to `/`-separated form with a leading `/`.
pub fn normalize_relative(path: &str) -> String {
    let path = path.replace('\\', "/");
    let trimmed = path.trim_start_matches("./").trim_start_matches('/');
    format!("/{}", trimmed)
}

/// Joins a root path and a bundle-relative path.
pub fn qualify(root: &str, relative_path: &str) -> String {
    let root = root.trim_end_matches('/');
    let relative = relative_path.trim_start_matches('/');
    if root.is_empty() {
        format!("/{}", relative)
    } else {
        format!("{}/{}", root, relative)
    }
}

/// Which precedence level decided a file's version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolutionSource {
    /// A `file_rego_versions` pattern of the root's manifest.
    Override { pattern: String },
    /// The `rego_version` declared by the root's manifest.
    BundleDefault,
    /// A global compatibility flag.
    Flag,
    /// The toolchain's baseline dialect.
    BuiltinDefault,
}

impl ResolutionSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResolutionSource::Override { .. } => "override",
            ResolutionSource::BundleDefault => "bundle_default",
            ResolutionSource::Flag => "flag",
            ResolutionSource::BuiltinDefault => "builtin_default",
        }
    }
}

impl fmt::Display for ResolutionSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolutionSource::Override { pattern } => write!(f, "file override '{}'", pattern),
            ResolutionSource::BundleDefault => f.write_str("bundle rego_version"),
            ResolutionSource::Flag => f.write_str("compatibility flag"),
            ResolutionSource::BuiltinDefault => f.write_str("builtin default"),
        }
    }
}

/// The version chosen for one source file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedVersion<'a> {
    pub file: &'a SourceFile,
    pub version: RegoVersion,
    pub source: ResolutionSource,
}
