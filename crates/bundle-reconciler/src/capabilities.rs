//! Capability sets and the dialect capability check.
//!
//! A capability set declares which language features and builtins a target
//! supports. Parsing a file as v1 Rego requires the [`FEATURE_REGO_V1`]
//! feature; the check runs before any file reaches the parser so that a
//! mismatch is reported as a capability error, not a syntax error.

use crate::error::{BundleError, Result};
use crate::types::{RegoVersion, ResolvedVersion};
use serde::{Deserialize, Serialize, Serializer};
use std::collections::HashSet;

/// Feature required to parse files as v1 Rego.
pub const FEATURE_REGO_V1: &str = "rego_v1";

/// Features supported by this toolchain.
const TOOLCHAIN_FEATURES: &[&str] = &[
    "rule_head_ref_string_prefixes",
    "rule_head_refs",
    "rego_v1_import",
    FEATURE_REGO_V1,
    "keywords_in_refs",
];

/// Builtins supported by this toolchain.
const TOOLCHAIN_BUILTINS: &[&str] = &[
    "eq",
    "neq",
    "count",
    "concat",
    "contains",
    "startswith",
    "endswith",
    "sprintf",
    "glob.match",
    "regex.match",
    "json.marshal",
    "json.unmarshal",
    "time.now_ns",
    "io.jwt.decode",
];

/// A builtin function declaration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuiltinDecl {
    pub name: String,

    /// Type declaration, kept opaque.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decl: Option<serde_json::Value>,
}

impl BuiltinDecl {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            decl: None,
        }
    }
}

/// The features and builtins available to a build.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Capabilities {
    #[serde(default)]
    pub builtins: Vec<BuiltinDecl>,

    #[serde(default, serialize_with = "sorted")]
    pub features: HashSet<String>,
}

fn sorted<S: Serializer>(
    set: &HashSet<String>,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    let mut items: Vec<&String> = set.iter().collect();
    items.sort();
    items.serialize(serializer)
}

impl Capabilities {
    /// Everything this toolchain supports.
    pub fn current() -> Self {
        Self {
            builtins: TOOLCHAIN_BUILTINS.iter().map(|b| BuiltinDecl::new(*b)).collect(),
            features: TOOLCHAIN_FEATURES.iter().map(|f| f.to_string()).collect(),
        }
    }

    /// Toolchain capabilities restricted to what the given dialect offers.
    ///
    /// The v0 profile lacks [`FEATURE_REGO_V1`].
    pub fn for_version(version: RegoVersion) -> Self {
        let caps = Self::current();
        match version {
            RegoVersion::V0 => caps.without_feature(FEATURE_REGO_V1),
            RegoVersion::V1 => caps,
        }
    }

    /// Parses a capabilities JSON document. Unknown keys are ignored.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn with_feature(mut self, feature: impl Into<String>) -> Self {
        self.features.insert(feature.into());
        self
    }

    pub fn without_feature(mut self, feature: &str) -> Self {
        self.features.remove(feature);
        self
    }

    pub fn has_feature(&self, feature: &str) -> bool {
        self.features.contains(feature)
    }

    pub fn has_builtin(&self, name: &str) -> bool {
        self.builtins.iter().any(|b| b.name == name)
    }
}

/// The capability feature a dialect needs, if any.
pub fn required_feature(version: RegoVersion) -> Option<&'static str> {
    match version {
        RegoVersion::V0 => None,
        RegoVersion::V1 => Some(FEATURE_REGO_V1),
    }
}

/// Checks that `caps` allows parsing `file` under `version`.
pub fn validate(file: &str, version: RegoVersion, caps: &Capabilities) -> Result<()> {
    match required_feature(version) {
        Some(feature) if !caps.has_feature(feature) => Err(BundleError::Capability {
            file: file.to_string(),
            feature: feature.to_string(),
        }),
        _ => Ok(()),
    }
}

/// Validates every resolved file, collecting all failures.
pub fn validate_all(resolved: &[ResolvedVersion<'_>], caps: &Capabilities) -> Vec<BundleError> {
    CapabilityValidator::new(caps).validate_all(resolved)
}

/// Checks resolved versions against one capability set.
#[derive(Debug, Clone, Copy)]
pub struct CapabilityValidator<'a> {
    caps: &'a Capabilities,
}

impl<'a> CapabilityValidator<'a> {
    pub fn new(caps: &'a Capabilities) -> Self {
        Self { caps }
    }

    pub fn validate(&self, resolved: &ResolvedVersion<'_>) -> Result<()> {
        validate(&resolved.file.qualified_path(), resolved.version, self.caps)
    }

    pub fn validate_all(&self, resolved: &[ResolvedVersion<'_>]) -> Vec<BundleError> {
        resolved.iter().filter_map(|r| self.validate(r).err()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ResolutionSource, SourceFile};

    #[test]
    fn test_current_capabilities() {
        let caps = Capabilities::current();
        assert!(caps.has_feature(FEATURE_REGO_V1));
        assert!(caps.has_builtin("count"));
        assert!(!caps.has_builtin("no.such.builtin"));
    }

    #[test]
    fn test_v0_profile_lacks_rego_v1() {
        let caps = Capabilities::for_version(RegoVersion::V0);
        assert!(!caps.has_feature(FEATURE_REGO_V1));
        assert!(caps.has_feature("rule_head_refs"));
    }

    #[test]
    fn test_v1_requires_feature() {
        let without = Capabilities::current().without_feature(FEATURE_REGO_V1);

        let err = validate("/b/p.rego", RegoVersion::V1, &without).unwrap_err();
        assert_eq!(
            err,
            BundleError::Capability {
                file: "/b/p.rego".to_string(),
                feature: FEATURE_REGO_V1.to_string(),
            }
        );

        assert!(validate("/b/p.rego", RegoVersion::V0, &without).is_ok());
        assert!(validate("/b/p.rego", RegoVersion::V1, &Capabilities::current()).is_ok());
    }

    #[test]
    fn test_validate_all_collects_every_file() {
        let files = [
            SourceFile::new("/b", "a.rego", ""),
            SourceFile::new("/b", "b.rego", ""),
            SourceFile::new("/b", "c.rego", ""),
        ];
        let resolved: Vec<ResolvedVersion> = files
            .iter()
            .zip([RegoVersion::V1, RegoVersion::V0, RegoVersion::V1])
            .map(|(file, version)| ResolvedVersion {
                file,
                version,
                source: ResolutionSource::BuiltinDefault,
            })
            .collect();

        let errors = validate_all(&resolved, &Capabilities::default());
        assert_eq!(errors.len(), 2);
        assert!(errors[0].to_string().starts_with("/b/a.rego:"));
        assert!(errors[1].to_string().starts_with("/b/c.rego:"));
    }

    #[test]
    fn test_capabilities_json() {
        let json = r#"{
            "builtins": [{"name": "count", "decl": {"type": "function"}}],
            "features": ["rego_v1", "rule_head_refs"],
            "wasm_abi_versions": [{"version": 1}]
        }"#;
        let caps = Capabilities::from_json(json).unwrap();
        assert!(caps.has_feature(FEATURE_REGO_V1));
        assert!(caps.has_builtin("count"));

        let out = caps.to_json().unwrap();
        assert!(out.contains(r#""features":["rego_v1","rule_head_refs"]"#));
    }
}
