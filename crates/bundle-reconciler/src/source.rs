//! Source collection: turning input roots into files and manifests.

use crate::error::{BundleError, Result};
use crate::manifest::BundleManifest;
use crate::types::SourceFile;

/// One input root: its files and, if present, its manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundleInput {
    pub root: String,
    pub files: Vec<SourceFile>,
    pub manifest: Option<BundleManifest>,
}

impl BundleInput {
    pub fn new(root: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            files: Vec::new(),
            manifest: None,
        }
    }

    /// Adds a file under this root.
    pub fn with_file(mut self, relative_path: &str, content: impl Into<Vec<u8>>) -> Self {
        let file = SourceFile::new(self.root.clone(), relative_path, content);
        self.files.push(file);
        self
    }

    pub fn with_manifest(mut self, manifest: BundleManifest) -> Self {
        self.manifest = Some(manifest);
        self
    }
}

/// Reads input roots.
pub trait SourceCollector {
    /// Collects the files and manifest of one root.
    fn collect(&self, root: &str) -> Result<BundleInput>;

    /// Collects every root in order, reporting all failures together.
    fn collect_all(&self, roots: &[&str]) -> Result<Vec<BundleInput>> {
        let mut inputs = Vec::with_capacity(roots.len());
        let mut errors = Vec::new();

        for root in roots {
            match self.collect(root) {
                Ok(input) => inputs.push(input),
                Err(e) => errors.push(e),
            }
        }

        match BundleError::aggregate(errors) {
            Some(err) => Err(err),
            None => Ok(inputs),
        }
    }
}

#[cfg(feature = "fs")]
pub use directory::DirectoryCollector;

#[cfg(feature = "fs")]
mod directory {
    use super::*;
    use crate::manifest::MANIFEST_FILE;
    use std::fs;
    use std::path::Path;
    use tracing::debug;
    use walkdir::WalkDir;

    /// Collects policy files from a directory tree.
    #[derive(Debug, Clone)]
    pub struct DirectoryCollector {
        extensions: Vec<String>,
    }

    impl Default for DirectoryCollector {
        fn default() -> Self {
            Self {
                extensions: vec![".rego".to_string()],
            }
        }
    }

    impl DirectoryCollector {
        /// Collects files ending in any of `extensions`.
        pub fn with_extensions<I, S>(extensions: I) -> Self
        where
            I: IntoIterator<Item = S>,
            S: Into<String>,
        {
            Self {
                extensions: extensions.into_iter().map(Into::into).collect(),
            }
        }

        fn recognizes(&self, relative_path: &str) -> bool {
            self.extensions.iter().any(|ext| relative_path.ends_with(ext.as_str()))
        }
    }

    fn io_error(path: &Path, err: impl std::fmt::Display) -> BundleError {
        BundleError::Io {
            path: path.display().to_string(),
            message: err.to_string(),
        }
    }

    impl SourceCollector for DirectoryCollector {
        fn collect(&self, root: &str) -> Result<BundleInput> {
            let root_path = Path::new(root);
            if !root_path.is_dir() {
                return Err(io_error(root_path, "not a directory"));
            }

            let mut input = BundleInput::new(root);

            for entry in WalkDir::new(root_path).sort_by_file_name() {
                let entry = entry.map_err(|e| io_error(root_path, e))?;
                if !entry.file_type().is_file() {
                    continue;
                }

                let path = entry.path();
                let relative = path
                    .strip_prefix(root_path)
                    .map_err(|e| io_error(path, e))?
                    .to_string_lossy()
                    .replace('\\', "/");

                if relative == MANIFEST_FILE {
                    let bytes = fs::read(path).map_err(|e| io_error(path, e))?;
                    input.manifest = Some(BundleManifest::parse(root, &bytes)?);
                } else if self.recognizes(&relative) {
                    let bytes = fs::read(path).map_err(|e| io_error(path, e))?;
                    input.files.push(SourceFile::new(root, &relative, bytes));
                }
            }

            debug!(
                root,
                files = input.files.len(),
                manifest = input.manifest.is_some(),
                "collected input root"
            );
            Ok(input)
        }
    }
}

#[cfg(all(test, feature = "fs"))]
mod tests {
    use super::*;
    use crate::types::RegoVersion;
    use std::fs;
    use tempfile::TempDir;

    fn write(dir: &TempDir, path: &str, content: &str) {
        let full = dir.path().join(path);
        fs::create_dir_all(full.parent().unwrap()).unwrap();
        fs::write(full, content).unwrap();
    }

    #[test]
    fn test_collects_policies_and_manifest() {
        let dir = TempDir::new().unwrap();
        write(&dir, ".manifest", r#"{"roots": ["x"], "rego_version": 0}"#);
        write(&dir, "foo/policy1.rego", "package x.foo");
        write(&dir, "bar/policy2.rego", "package x.bar");
        write(&dir, "data.json", "{}");

        let root = dir.path().to_str().unwrap();
        let input = DirectoryCollector::default().collect(root).unwrap();

        let paths: Vec<&str> = input.files.iter().map(|f| f.relative_path.as_str()).collect();
        assert_eq!(paths, vec!["/bar/policy2.rego", "/foo/policy1.rego"]);
        assert_eq!(input.files[0].content, b"package x.bar");

        let manifest = input.manifest.unwrap();
        assert_eq!(manifest.rego_version, Some(RegoVersion::V0));
        assert_eq!(manifest.roots, Some(vec!["x".to_string()]));
    }

    #[test]
    fn test_custom_extensions() {
        let dir = TempDir::new().unwrap();
        write(&dir, "a.rego", "package a");
        write(&dir, "data.json", "{}");

        let root = dir.path().to_str().unwrap();
        let input = DirectoryCollector::with_extensions([".rego", ".json"])
            .collect(root)
            .unwrap();
        assert_eq!(input.files.len(), 2);
        assert!(input.manifest.is_none());
    }

    #[test]
    fn test_malformed_manifest_fails_root() {
        let dir = TempDir::new().unwrap();
        write(&dir, ".manifest", r#"{"rego_version": "one"}"#);
        write(&dir, "a.rego", "package a");

        let root = dir.path().to_str().unwrap();
        let err = DirectoryCollector::default().collect(root).unwrap_err();
        assert!(matches!(err, BundleError::ManifestParse { .. }));
    }

    #[test]
    fn test_collect_all_reports_every_missing_root() {
        let collector = DirectoryCollector::default();
        let err = collector
            .collect_all(&["/definitely/missing/a", "/definitely/missing/b"])
            .unwrap_err();
        assert_eq!(err.errors().len(), 2);
    }
}
