// Configuration for the carbon pipeline

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Name of the config file looked up in the working and home directories
pub const CONFIG_FILE_NAME: &str = ".carbon-pilot.toml";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Per-stage generator timeout in milliseconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_ms: u64,

    #[serde(default = "default_endpoint")]
    pub ollama_endpoint: String,

    #[serde(default = "default_requirements_path")]
    pub requirements_path: PathBuf,

    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Run the requirements stage before optimizing. When off, the
    /// optimizer uses whatever artifact is already on disk.
    #[serde(default = "default_draft_requirements")]
    pub draft_requirements: bool,
}

fn default_model() -> String {
    "gpt-oss:20b".to_string()
}

fn default_temperature() -> f32 {
    0.2
}

fn default_request_timeout() -> u64 {
    120_000
}

fn default_endpoint() -> String {
    "http://localhost:11434".to_string()
}

fn default_requirements_path() -> PathBuf {
    PathBuf::from("business_requirements.json")
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("./reports")
}

fn default_draft_requirements() -> bool {
    true
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            temperature: default_temperature(),
            request_timeout_ms: default_request_timeout(),
            ollama_endpoint: default_endpoint(),
            requirements_path: default_requirements_path(),
            output_dir: default_output_dir(),
            draft_requirements: default_draft_requirements(),
        }
    }
}

impl PipelineConfig {
    /// Load configuration from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_toml(contents: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(contents)
    }

    /// Load from `path` if given, else from the first config file found,
    /// else defaults
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::from_file(path),
            None => match find_config() {
                Some(found) => {
                    tracing::info!(path = %found.display(), "loading config");
                    Self::from_file(found)
                }
                None => Ok(Self::default()),
            },
        }
    }

    /// Apply `OLLAMA_MODEL` and `OLLAMA_HOST` overrides
    pub fn apply_env(&mut self) {
        self.apply_overrides(
            std::env::var("OLLAMA_MODEL").ok(),
            std::env::var("OLLAMA_HOST").ok(),
        );
    }

    fn apply_overrides(&mut self, model: Option<String>, host: Option<String>) {
        if let Some(model) = model.filter(|m| !m.trim().is_empty()) {
            self.model = model;
        }
        if let Some(host) = host.filter(|h| !h.trim().is_empty()) {
            self.ollama_endpoint = host;
        }
    }
}

fn find_config() -> Option<PathBuf> {
    let local_config = PathBuf::from(CONFIG_FILE_NAME);
    if local_config.exists() {
        return Some(local_config);
    }

    if let Some(home) = dirs::home_dir() {
        let home_config = home.join(CONFIG_FILE_NAME);
        if home_config.exists() {
            return Some(home_config);
        }
    }

    None
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config = PipelineConfig::from_toml(
            r#"
model = "llama3.2"
draft_requirements = false
"#,
        )
        .unwrap();

        assert_eq!(config.model, "llama3.2");
        assert!(!config.draft_requirements);
        assert_eq!(config.ollama_endpoint, "http://localhost:11434");
        assert_eq!(config.requirements_path, PathBuf::from("business_requirements.json"));
    }

    #[test]
    fn test_from_file_reports_path() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("broken.toml");
        std::fs::write(&path, "model = [").unwrap();

        let err = PipelineConfig::from_file(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert!(err.to_string().contains("broken.toml"));
    }

    #[test]
    fn test_blank_overrides_are_ignored() {
        let mut config = PipelineConfig::default();
        config.apply_overrides(Some("  ".to_string()), Some("http://gpu-box:11434".to_string()));

        assert_eq!(config.model, "gpt-oss:20b");
        assert_eq!(config.ollama_endpoint, "http://gpu-box:11434");
    }
}
