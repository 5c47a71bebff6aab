//! Bundle manifests: the `.manifest` descriptor read from each input root and
//! the merged manifest written for the output bundle.

use crate::error::{BundleError, Result};
use crate::glob::PathGlob;
use crate::hash;
use crate::types::RegoVersion;
use serde::ser::{SerializeMap, SerializeStruct};
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;

/// File name of the manifest at a bundle root.
pub const MANIFEST_FILE: &str = ".manifest";

/// A per-file version override declared under `file_rego_versions`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionOverride {
    pub glob: PathGlob,
    pub version: RegoVersion,
}

impl VersionOverride {
    pub fn pattern(&self) -> &str {
        self.glob.pattern()
    }
}

/// The manifest of one input bundle.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BundleManifest {
    /// Content fingerprint of the bundle.
    pub revision: String,

    /// Data roots claimed by the bundle; `None` when undeclared.
    pub roots: Option<Vec<String>>,

    /// Default dialect for every file of the bundle.
    pub rego_version: Option<RegoVersion>,

    /// Per-file overrides, ordered by pattern.
    pub file_rego_versions: Vec<VersionOverride>,
}

#[derive(Deserialize)]
struct RawManifest {
    #[serde(default)]
    revision: Option<String>,
    #[serde(default)]
    roots: Option<Vec<String>>,
    #[serde(default)]
    rego_version: Option<Value>,
    #[serde(default)]
    file_rego_versions: Option<serde_json::Map<String, Value>>,
}

impl BundleManifest {
    /// Creates an empty manifest.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the revision.
    pub fn with_revision(mut self, revision: impl Into<String>) -> Self {
        self.revision = revision.into();
        self
    }

    /// Sets the declared roots.
    pub fn with_roots<I, S>(mut self, roots: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.roots = Some(roots.into_iter().map(Into::into).collect());
        self
    }

    /// Sets the bundle-wide default version.
    pub fn with_rego_version(mut self, version: RegoVersion) -> Self {
        self.rego_version = Some(version);
        self
    }

    /// Adds a per-file override.
    pub fn with_file_override(mut self, pattern: &str, version: RegoVersion) -> Result<Self> {
        self.file_rego_versions.push(VersionOverride {
            glob: PathGlob::new(pattern)?,
            version,
        });
        Ok(self)
    }

    /// Parses and validates the `.manifest` of `root`.
    ///
    /// Every failure is reported as a [`BundleError::ManifestParse`] naming
    /// the root; a malformed manifest never degrades to "no manifest".
    pub fn parse(root: &str, bytes: &[u8]) -> Result<Self> {
        Self::parse_inner(bytes).map_err(|e| e.in_manifest(root))
    }

    fn parse_inner(bytes: &[u8]) -> Result<Self> {
        let raw: RawManifest = serde_json::from_slice(bytes)?;

        let rego_version = raw.rego_version.as_ref().map(parse_version).transpose()?;

        let mut file_rego_versions = Vec::new();
        for (pattern, value) in raw.file_rego_versions.unwrap_or_default() {
            file_rego_versions.push(VersionOverride {
                glob: PathGlob::new(&pattern)?,
                version: parse_version(&value)?,
            });
        }

        let manifest = Self {
            revision: raw.revision.unwrap_or_default(),
            roots: raw.roots,
            rego_version,
            file_rego_versions,
        };
        manifest.validate()
    }

    /// Normalizes the declared roots and rejects overlapping ones.
    pub fn validate(mut self) -> Result<Self> {
        if let Some(roots) = self.roots.as_mut() {
            for root in roots.iter_mut() {
                *root = root.trim_matches('/').to_string();
            }

            for i in 0..roots.len() {
                for j in (i + 1)..roots.len() {
                    if roots_overlap(&roots[i], &roots[j]) {
                        return Err(BundleError::ManifestParse {
                            root: String::new(),
                            reason: format!(
                                "manifest has overlapped roots: '{}' and '{}'",
                                roots[i], roots[j]
                            ),
                        });
                    }
                }
            }
        }
        Ok(self)
    }

    /// Roots the bundle contributes to a merge; the empty root when none
    /// are declared.
    pub fn effective_roots(&self) -> Vec<String> {
        match &self.roots {
            Some(roots) => roots.clone(),
            None => vec![String::new()],
        }
    }

    /// All overrides whose pattern matches the bundle-relative path.
    pub fn matching_overrides(&self, relative_path: &str) -> Vec<&VersionOverride> {
        self.file_rego_versions
            .iter()
            .filter(|o| o.glob.is_match(relative_path))
            .collect()
    }
}

fn parse_version(value: &Value) -> Result<RegoVersion> {
    value
        .as_i64()
        .and_then(RegoVersion::from_int)
        .ok_or_else(|| BundleError::InvalidVersion {
            value: value.to_string(),
        })
}

fn roots_overlap(a: &str, b: &str) -> bool {
    a.is_empty()
        || b.is_empty()
        || a == b
        || a.strip_prefix(b).is_some_and(|rest| rest.starts_with('/'))
        || b.strip_prefix(a).is_some_and(|rest| rest.starts_with('/'))
}

/// The manifest of the output bundle.
///
/// Serialized with fields in the order `revision`, `roots`, `rego_version`,
/// `file_rego_versions`. An empty revision and an empty override map are
/// omitted. Override entries keep their insertion order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergedManifest {
    pub revision: String,
    pub roots: Vec<String>,
    pub rego_version: RegoVersion,
    pub file_rego_versions: Vec<(String, RegoVersion)>,
}

impl MergedManifest {
    /// Version recorded for a root-qualified path.
    pub fn version_for(&self, qualified_path: &str) -> RegoVersion {
        self.file_rego_versions
            .iter()
            .find(|(path, _)| path == qualified_path)
            .map(|(_, v)| *v)
            .unwrap_or(self.rego_version)
    }

    /// Compact JSON, as written to the bundle's `.manifest`.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// SHA-256 of the compact serialization.
    pub fn digest(&self) -> Result<String> {
        Ok(hash::sha256_str(&self.to_json()?))
    }
}

impl Serialize for MergedManifest {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let with_revision = !self.revision.is_empty();
        let with_overrides = !self.file_rego_versions.is_empty();
        let len = 2 + usize::from(with_revision) + usize::from(with_overrides);

        let mut s = serializer.serialize_struct("MergedManifest", len)?;
        if with_revision {
            s.serialize_field("revision", &self.revision)?;
        } else {
            s.skip_field("revision")?;
        }
        s.serialize_field("roots", &self.roots)?;
        s.serialize_field("rego_version", &self.rego_version)?;
        if with_overrides {
            s.serialize_field("file_rego_versions", &OrderedVersions(&self.file_rego_versions))?;
        } else {
            s.skip_field("file_rego_versions")?;
        }
        s.end()
    }
}

struct OrderedVersions<'a>(&'a [(String, RegoVersion)]);

impl Serialize for OrderedVersions<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (path, version) in self.0 {
            map.serialize_entry(path, version)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_manifest() {
        let json = r#"{
            "revision": "abc123",
            "roots": ["/a/", "b"],
            "rego_version": 0,
            "file_rego_versions": {"*/test2.rego": 1}
        }"#;

        let manifest = BundleManifest::parse("/b1", json.as_bytes()).unwrap();
        assert_eq!(manifest.revision, "abc123");
        assert_eq!(manifest.roots, Some(vec!["a".to_string(), "b".to_string()]));
        assert_eq!(manifest.rego_version, Some(RegoVersion::V0));
        assert_eq!(manifest.file_rego_versions.len(), 1);
        assert_eq!(manifest.matching_overrides("/test2.rego").len(), 1);
        assert!(manifest.matching_overrides("/test1.rego").is_empty());
    }

    #[test]
    fn test_empty_manifest() {
        let manifest = BundleManifest::parse("/b1", b"{}").unwrap();
        assert_eq!(manifest, BundleManifest::new());
        assert_eq!(manifest.effective_roots(), vec![String::new()]);
    }

    #[test]
    fn test_non_integer_version_is_fatal() {
        for json in [
            r#"{"rego_version": "1"}"#,
            r#"{"rego_version": 1.5}"#,
            r#"{"rego_version": 2}"#,
            r#"{"file_rego_versions": {"/x.rego": "v1"}}"#,
        ] {
            let err = BundleManifest::parse("/b1", json.as_bytes()).unwrap_err();
            match err {
                BundleError::ManifestParse { root, reason } => {
                    assert_eq!(root, "/b1");
                    assert!(reason.contains("invalid rego version"), "{}", reason);
                }
                other => panic!("unexpected error: {:?}", other),
            }
        }
    }

    #[test]
    fn test_invalid_glob_is_fatal() {
        let json = r#"{"file_rego_versions": {"/p[.rego": 1}}"#;
        let err = BundleManifest::parse("/b1", json.as_bytes()).unwrap_err();
        assert!(matches!(err, BundleError::ManifestParse { .. }));
        assert!(err.to_string().contains("/p[.rego"));
    }

    #[test]
    fn test_malformed_json_is_fatal() {
        let err = BundleManifest::parse("/b1", b"{not json").unwrap_err();
        assert!(matches!(err, BundleError::ManifestParse { .. }));
    }

    #[test]
    fn test_overlapped_roots() {
        let err = BundleManifest::parse("/b1", br#"{"roots": ["a", "a/b"]}"#).unwrap_err();
        assert!(err.to_string().contains("overlapped roots"));

        // Sibling roots sharing a string prefix are not nested.
        assert!(BundleManifest::parse("/b1", br#"{"roots": ["a", "ab"]}"#).is_ok());
    }

    #[test]
    fn test_merged_manifest_omits_zero_fields() {
        let manifest = MergedManifest {
            revision: String::new(),
            roots: vec![String::new()],
            rego_version: RegoVersion::V1,
            file_rego_versions: Vec::new(),
        };
        assert_eq!(manifest.to_json().unwrap(), r#"{"roots":[""],"rego_version":1}"#);
    }

    #[test]
    fn test_merged_manifest_keeps_override_order() {
        let manifest = MergedManifest {
            revision: "r1".to_string(),
            roots: vec!["test1".to_string(), "test2".to_string()],
            rego_version: RegoVersion::V0,
            file_rego_versions: vec![
                ("/root/z.rego".to_string(), RegoVersion::V1),
                ("/root/a.rego".to_string(), RegoVersion::V1),
            ],
        };
        assert_eq!(
            manifest.to_json().unwrap(),
            r#"{"revision":"r1","roots":["test1","test2"],"rego_version":0,"file_rego_versions":{"/root/z.rego":1,"/root/a.rego":1}}"#
        );
        assert_eq!(manifest.version_for("/root/a.rego"), RegoVersion::V1);
        assert_eq!(manifest.version_for("/root/other.rego"), RegoVersion::V0);
        assert_eq!(manifest.digest().unwrap().len(), 64);
    }
}
