//! Output bundle writers.

use crate::error::Result;
use crate::manifest::MergedManifest;
use crate::types::ResolvedVersion;

/// Receives the reconciled bundle.
pub trait BundleWriter {
    /// Writes the files and the merged manifest.
    fn write(&self, manifest: &MergedManifest, files: &[ResolvedVersion<'_>]) -> Result<()>;
}

#[cfg(feature = "fs")]
pub use directory::DirectoryWriter;

#[cfg(feature = "fs")]
mod directory {
    use super::*;
    use crate::error::BundleError;
    use crate::manifest::MANIFEST_FILE;
    use std::fs;
    use std::path::{Path, PathBuf};
    use tracing::{info, warn};

    /// Writes the bundle as a directory tree.
    ///
    /// Files land under their root-qualified path; `.manifest` is written
    /// last, so a directory holding one is complete. When a write fails, the
    /// files already written by this call are removed again. Directories it
    /// created are left in place.
    #[derive(Debug, Clone)]
    pub struct DirectoryWriter {
        out: PathBuf,
    }

    impl DirectoryWriter {
        pub fn new(out: impl Into<PathBuf>) -> Self {
            Self { out: out.into() }
        }

        pub fn out_dir(&self) -> &Path {
            &self.out
        }

        fn put(&self, relative: &str, content: &[u8], written: &mut Vec<PathBuf>) -> Result<()> {
            let path = self.out.join(relative.trim_start_matches('/'));
            let io_error = |e: std::io::Error| BundleError::Io {
                path: path.display().to_string(),
                message: e.to_string(),
            };
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).map_err(io_error)?;
            }
            fs::write(&path, content).map_err(io_error)?;
            written.push(path);
            Ok(())
        }

        fn put_all(
            &self,
            manifest: &MergedManifest,
            files: &[ResolvedVersion<'_>],
            written: &mut Vec<PathBuf>,
        ) -> Result<()> {
            for resolved in files {
                self.put(&resolved.file.qualified_path(), &resolved.file.content, written)?;
            }

            let mut json = manifest.to_json()?;
            json.push('\n');
            self.put(MANIFEST_FILE, json.as_bytes(), written)
        }
    }

    impl BundleWriter for DirectoryWriter {
        fn write(&self, manifest: &MergedManifest, files: &[ResolvedVersion<'_>]) -> Result<()> {
            let mut written = Vec::with_capacity(files.len() + 1);
            if let Err(err) = self.put_all(manifest, files, &mut written) {
                for path in &written {
                    if let Err(e) = fs::remove_file(path) {
                        warn!(
                            path = %path.display(),
                            error = %e,
                            "failed to remove partial output"
                        );
                    }
                }
                return Err(err);
            }

            info!(
                out = %self.out.display(),
                files = files.len(),
                "wrote bundle"
            );
            Ok(())
        }
    }
}

#[cfg(all(test, feature = "fs"))]
mod tests {
    use super::*;
    use crate::error::BundleError;
    use crate::types::{RegoVersion, ResolutionSource, SourceFile};
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_directory_writer_layout() {
        let out = TempDir::new().unwrap();
        let file = SourceFile::new("/b1", "x/p.rego", "package x");
        let resolved = vec![ResolvedVersion {
            file: &file,
            version: RegoVersion::V0,
            source: ResolutionSource::Flag,
        }];
        let manifest = MergedManifest {
            revision: String::new(),
            roots: vec![String::new()],
            rego_version: RegoVersion::V1,
            file_rego_versions: vec![("/b1/x/p.rego".to_string(), RegoVersion::V0)],
        };

        DirectoryWriter::new(out.path()).write(&manifest, &resolved).unwrap();

        let policy = fs::read_to_string(out.path().join("b1/x/p.rego")).unwrap();
        assert_eq!(policy, "package x");

        let written = fs::read_to_string(out.path().join(".manifest")).unwrap();
        assert_eq!(
            written,
            "{\"roots\":[\"\"],\"rego_version\":1,\"file_rego_versions\":{\"/b1/x/p.rego\":0}}\n"
        );
    }

    #[test]
    fn test_failed_write_removes_partial_output() {
        let out = TempDir::new().unwrap();
        // A regular file where a directory is needed makes the second write fail.
        fs::write(out.path().join("b2"), "").unwrap();

        let first = SourceFile::new("/b1", "p.rego", "package a");
        let second = SourceFile::new("/b2", "q.rego", "package b");
        let resolved: Vec<ResolvedVersion> = [&first, &second]
            .into_iter()
            .map(|file| ResolvedVersion {
                file,
                version: RegoVersion::V1,
                source: ResolutionSource::BuiltinDefault,
            })
            .collect();
        let manifest = MergedManifest {
            revision: String::new(),
            roots: vec![String::new()],
            rego_version: RegoVersion::V1,
            file_rego_versions: Vec::new(),
        };

        let err = DirectoryWriter::new(out.path())
            .write(&manifest, &resolved)
            .unwrap_err();
        assert!(matches!(err, BundleError::Io { .. }));
        assert!(!out.path().join("b1/p.rego").exists());
        assert!(!out.path().join(".manifest").exists());
    }
}
