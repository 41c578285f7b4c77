//! Compiler configuration loaded from ~/.akkado/config.yaml.
//!
//! The file is optional. Command-line flags override whatever it sets.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::AkkadoError;
use crate::samples::SampleBank;

/// How the command-line tool prints a compile result.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Human-readable diagnostics and a summary.
    #[default]
    Text,
    /// The whole compile result as JSON.
    Json,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompilerConfig {
    /// Extra sample names the host has loaded.
    #[serde(default)]
    pub samples: Vec<String>,
    /// Also accept the built-in drum names.
    #[serde(default = "CompilerConfig::default_true")]
    pub default_samples: bool,
    #[serde(default)]
    pub format: OutputFormat,
}

impl CompilerConfig {
    /// Standard config path (~/.akkado/config.yaml).
    pub fn default_path() -> Option<PathBuf> {
        let home = dirs::home_dir()?;
        Some(home.join(".akkado").join("config.yaml"))
    }

    /// Load from the standard path. Returns None if the file is missing or unreadable.
    pub fn load() -> Option<Self> {
        let content = std::fs::read_to_string(Self::default_path()?).ok()?;
        serde_yaml::from_str(&content).ok()
    }

    /// Load from an explicit path, reporting why it failed.
    pub fn load_from(path: &Path) -> Result<Self, AkkadoError> {
        let content = std::fs::read_to_string(path).map_err(|source| AkkadoError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_yaml::from_str(&content).map_err(|source| AkkadoError::Config {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Build the sample registry this config describes.
    pub fn registry(&self) -> SampleBank {
        let mut bank = if self.default_samples {
            SampleBank::with_defaults()
        } else {
            SampleBank::new()
        };
        for name in &self.samples {
            bank.insert(name.as_str());
        }
        bank
    }

    fn default_true() -> bool {
        true
    }
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            samples: Vec::new(),
            default_samples: true,
            format: OutputFormat::Text,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::samples::SampleRegistry;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn default_config() {
        let config = CompilerConfig::default();
        assert!(config.samples.is_empty());
        assert!(config.default_samples);
        assert_eq!(config.format, OutputFormat::Text);
        assert!(config.registry().contains("bd"));
    }

    #[test]
    fn partial_yaml_uses_defaults() {
        let config: CompilerConfig = serde_yaml::from_str("samples: [vox, bass808]\n").unwrap();
        assert!(config.default_samples);
        let bank = config.registry();
        assert!(bank.contains("vox"));
        assert!(bank.contains("bass808"));
        assert!(bank.contains("sd"));
    }

    #[test]
    fn defaults_can_be_disabled() {
        let yaml = r#"
samples:
  - vox
default_samples: false
format: json
"#;
        let config: CompilerConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.format, OutputFormat::Json);
        let bank = config.registry();
        assert!(bank.contains("vox"));
        assert!(!bank.contains("bd"));
        assert_eq!(bank.len(), 1);
    }

    #[test]
    fn load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "samples: [glass]").unwrap();
        let config = CompilerConfig::load_from(file.path()).unwrap();
        assert_eq!(config.samples, vec!["glass".to_string()]);
    }

    #[test]
    fn load_from_reports_bad_yaml() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "samples: {{ not: a list").unwrap();
        let err = CompilerConfig::load_from(file.path()).unwrap_err();
        assert!(matches!(err, AkkadoError::Config { .. }));
    }

    #[test]
    fn load_from_missing_file() {
        let err = CompilerConfig::load_from(Path::new("/nonexistent/akkado.yaml")).unwrap_err();
        assert!(matches!(err, AkkadoError::Read { .. }));
        assert!(err.to_string().contains("/nonexistent/akkado.yaml"));
    }

    #[test]
    fn load_standard_path_does_not_panic() {
        let _ = CompilerConfig::load();
    }
}
