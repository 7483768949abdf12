pub mod error;

pub use error::*;

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Candidate file names, in priority order
const CANDIDATES: [&str; 3] = ["pageship.local.yaml", "pageship.yaml", ".pageship.yaml"];

/// Settings for one deploy run.
///
/// Every field has a default, so an empty (or missing) file is valid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// Container engine CLI binary
    pub engine: String,
    /// Image name without tag, e.g. `ghcr.io/owner/placeholder`
    pub image: String,
    pub tag: String,
    pub platforms: Vec<String>,
    /// Name of the buildx builder instance
    pub builder: String,
    pub dockerfile: PathBuf,
    pub context: PathBuf,
    pub smoke_test: SmokeTestSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            engine: "docker".to_string(),
            image: "pageship/placeholder".to_string(),
            tag: "latest".to_string(),
            platforms: vec!["linux/amd64".to_string(), "linux/arm64".to_string()],
            builder: "pageship-builder".to_string(),
            dockerfile: PathBuf::from("Dockerfile"),
            context: PathBuf::from("."),
            smoke_test: SmokeTestSettings::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SmokeTestSettings {
    pub container_name: String,
    pub host_port: u16,
    /// Port the page server binds inside the container; passed as `PORT`
    pub container_port: u16,
    pub readiness: ReadinessSettings,
}

impl Default for SmokeTestSettings {
    fn default() -> Self {
        Self {
            container_name: "pageship-smoke-test".to_string(),
            host_port: 8080,
            container_port: 80,
            readiness: ReadinessSettings::default(),
        }
    }
}

/// Backoff schedule for the smoke test's running-state poll
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReadinessSettings {
    pub max_retries: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub multiplier: f64,
}

impl Default for ReadinessSettings {
    fn default() -> Self {
        Self {
            max_retries: 10,
            initial_delay_ms: 500,
            max_delay_ms: 4000,
            multiplier: 2.0,
        }
    }
}

impl Settings {
    /// Full image reference, `image:tag`
    pub fn image_ref(&self) -> String {
        format!("{}:{}", self.image, self.tag)
    }

    /// Load settings from a YAML file
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.to_path_buf()));
        }
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    fn from_yaml(content: &str) -> std::result::Result<Self, serde_yaml::Error> {
        // An empty document deserializes to unit, not to an empty map
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(content)
    }

    /// Resolve settings for a run.
    ///
    /// Priority: environment variables > settings file > defaults.
    /// An explicit path must exist; otherwise the file is discovered with
    /// [`find_config_file`] and may be absent.
    pub fn resolve(explicit: Option<&Path>) -> Result<(Self, Option<PathBuf>)> {
        let path = match explicit {
            Some(path) => Some(path.to_path_buf()),
            None => find_config_file()?,
        };

        let mut settings = match &path {
            Some(path) => Self::load(path)?,
            None => Self::default(),
        };

        settings.apply_env()?;
        settings.validate()?;
        Ok((settings, path))
    }

    /// Override fields from `PAGESHIP_*` environment variables
    pub fn apply_env(&mut self) -> Result<()> {
        if let Some(engine) = env_value("PAGESHIP_ENGINE") {
            self.engine = engine;
        }
        if let Some(image) = env_value("PAGESHIP_IMAGE") {
            self.image = image;
        }
        if let Some(tag) = env_value("PAGESHIP_TAG") {
            self.tag = tag;
        }
        if let Some(platforms) = env_value("PAGESHIP_PLATFORMS") {
            self.platforms = parse_platforms(&platforms);
        }
        if let Some(builder) = env_value("PAGESHIP_BUILDER") {
            self.builder = builder;
        }
        if let Some(port) = env_value("PAGESHIP_TEST_PORT") {
            self.smoke_test.host_port = port.parse().map_err(|_| ConfigError::Invalid {
                key: "PAGESHIP_TEST_PORT",
                reason: format!("'{}' is not a port number", port),
            })?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        let required = [
            ("engine", &self.engine),
            ("image", &self.image),
            ("tag", &self.tag),
            ("builder", &self.builder),
            ("smoke_test.container_name", &self.smoke_test.container_name),
        ];
        for (key, value) in required {
            if value.trim().is_empty() {
                return Err(ConfigError::Invalid {
                    key,
                    reason: "must not be empty".to_string(),
                });
            }
        }

        if self.tag.contains(':') || self.tag.contains('/') {
            return Err(ConfigError::Invalid {
                key: "tag",
                reason: format!("'{}' is not a valid tag", self.tag),
            });
        }
        if self.platforms.is_empty() {
            return Err(ConfigError::Invalid {
                key: "platforms",
                reason: "at least one target platform is required".to_string(),
            });
        }
        if self.smoke_test.host_port == 0 {
            return Err(ConfigError::Invalid {
                key: "smoke_test.host_port",
                reason: "must be non-zero".to_string(),
            });
        }
        if self.smoke_test.container_port == 0 {
            return Err(ConfigError::Invalid {
                key: "smoke_test.container_port",
                reason: "must be non-zero".to_string(),
            });
        }
        if self.smoke_test.readiness.max_retries == 0 {
            return Err(ConfigError::Invalid {
                key: "smoke_test.readiness.max_retries",
                reason: "must be at least 1".to_string(),
            });
        }
        let readiness = &self.smoke_test.readiness;
        if !readiness.multiplier.is_finite() || readiness.multiplier <= 0.0 {
            return Err(ConfigError::Invalid {
                key: "smoke_test.readiness.multiplier",
                reason: format!("{} is not a positive number", readiness.multiplier),
            });
        }
        if readiness.initial_delay_ms > readiness.max_delay_ms {
            return Err(ConfigError::Invalid {
                key: "smoke_test.readiness.initial_delay_ms",
                reason: format!(
                    "{} exceeds max_delay_ms ({})",
                    readiness.initial_delay_ms, readiness.max_delay_ms
                ),
            });
        }
        Ok(())
    }
}

fn env_value(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Split a comma-separated platform list, dropping blanks
pub fn parse_platforms(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(String::from)
        .collect()
}

/// Find the pageship settings file
///
/// Search order:
/// 1. `PAGESHIP_CONFIG_PATH` environment variable (direct path)
/// 2. Current directory: pageship.local.yaml, pageship.yaml, .pageship.yaml
/// 3. Global: `<config dir>/pageship/pageship.yaml`
///
/// Returns `None` when no file exists anywhere.
pub fn find_config_file() -> Result<Option<PathBuf>> {
    if let Some(config_path) = env_value("PAGESHIP_CONFIG_PATH") {
        let path = PathBuf::from(config_path);
        if path.exists() {
            return Ok(Some(path));
        }
    }

    let current_dir = std::env::current_dir()?;
    for filename in &CANDIDATES {
        let path = current_dir.join(filename);
        if path.exists() {
            return Ok(Some(path));
        }
    }

    if let Some(config_dir) = dirs::config_dir() {
        let global_config = config_dir.join("pageship").join("pageship.yaml");
        if global_config.exists() {
            return Ok(Some(global_config));
        }
    }

    Ok(None)
}
