//! Reconciliation options, loaded from YAML or JSON.

use crate::capabilities::Capabilities;
use crate::error::{BundleError, Result};
use crate::types::{CompatibilityFlags, InvocationMode};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Supported option file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Yaml,
    Json,
}

impl ConfigFormat {
    /// Detects format from file extension.
    pub fn from_extension(path: &str) -> Option<Self> {
        if path.ends_with(".yaml") || path.ends_with(".yml") {
            Some(ConfigFormat::Yaml)
        } else if path.ends_with(".json") {
            Some(ConfigFormat::Json)
        } else {
            None
        }
    }

    /// Detects format from content.
    pub fn detect(content: &str) -> Self {
        let trimmed = content.trim();
        if trimmed.starts_with('{') {
            ConfigFormat::Json
        } else {
            ConfigFormat::Yaml
        }
    }
}

/// Options for one reconciliation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconcileOptions {
    /// Whether input manifests are honored.
    pub mode: InvocationMode,

    /// Global compatibility switches.
    pub flags: CompatibilityFlags,

    /// Inline capabilities; wins over `capabilities_file`.
    pub capabilities: Option<Capabilities>,

    /// Path of a capabilities JSON document.
    pub capabilities_file: Option<String>,

    /// Revision written to the output manifest instead of the merged one.
    pub revision: Option<String>,

    /// File extensions collected from directory roots.
    pub extensions: Vec<String>,
}

impl Default for ReconcileOptions {
    fn default() -> Self {
        Self {
            mode: InvocationMode::default(),
            flags: CompatibilityFlags::default(),
            capabilities: None,
            capabilities_file: None,
            revision: None,
            extensions: vec![".rego".to_string()],
        }
    }
}

impl ReconcileOptions {
    pub fn new() -> Self {
        Self::default()
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
        self.capabilities = Some(capabilities);
        self
    }

    pub fn with_revision(mut self, revision: impl Into<String>) -> Self {
        self.revision = Some(revision.into());
        self
    }

    /// Parses options from YAML.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let options: ReconcileOptions = serde_yaml::from_str(yaml)?;
        options.validate()?;
        Ok(options)
    }

    /// Parses options from JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        let options: ReconcileOptions =
            serde_json::from_str(json).map_err(|e| BundleError::Config(e.to_string()))?;
        options.validate()?;
        Ok(options)
    }

    /// Parses options, auto-detecting the format.
    pub fn parse(content: &str) -> Result<Self> {
        Self::parse_with_format(content, ConfigFormat::detect(content))
    }

    pub fn parse_with_format(content: &str, format: ConfigFormat) -> Result<Self> {
        match format {
            ConfigFormat::Yaml => Self::from_yaml(content),
            ConfigFormat::Json => Self::from_json(content),
        }
    }

    /// Reads options from a file; the extension decides the format when
    /// it is recognized.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| BundleError::Io {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        let format = ConfigFormat::from_extension(&path.to_string_lossy())
            .unwrap_or_else(|| ConfigFormat::detect(&content));
        Self::parse_with_format(&content, format)
    }

    /// Validates the options.
    pub fn validate(&self) -> Result<()> {
        if self.extensions.is_empty() {
            return Err(BundleError::Config(
                "at least one file extension is required".to_string(),
            ));
        }

        for ext in &self.extensions {
            if !ext.starts_with('.') || ext.len() < 2 {
                return Err(BundleError::Config(format!(
                    "invalid file extension '{}': expected a leading '.'",
                    ext
                )));
            }
        }

        if let Some(revision) = &self.revision {
            if revision.trim().is_empty() {
                return Err(BundleError::Config("revision must not be blank".to_string()));
            }
        }

        Ok(())
    }

    /// The capabilities to validate against: inline, from file, or the
    /// toolchain's own.
    pub fn resolve_capabilities(&self) -> Result<Capabilities> {
        if let Some(caps) = &self.capabilities {
            return Ok(caps.clone());
        }

        match &self.capabilities_file {
            Some(path) => {
                let json = fs::read_to_string(path).map_err(|e| BundleError::Io {
                    path: path.clone(),
                    message: e.to_string(),
                })?;
                Capabilities::from_json(&json).map_err(|e| {
                    BundleError::Config(format!("{}: invalid capabilities: {}", path, e))
                })
            }
            None => Ok(Capabilities::current()),
        }
    }

    /// Directory collector for the configured extensions.
    #[cfg(feature = "fs")]
    pub fn collector(&self) -> crate::source::DirectoryCollector {
        crate::source::DirectoryCollector::with_extensions(self.extensions.iter().cloned())
    }
}
