//! The `ContainerEngine` capability and the values passed through it

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Everything the deploy flow needs from a container engine.
///
/// Each method is one blocking step from the caller's point of view: the
/// flow awaits it to completion before issuing the next one.
#[async_trait]
pub trait ContainerEngine: Send + Sync {
    /// Confirm the engine daemon answers. Returns its server version.
    async fn check_daemon(&self) -> Result<String>;

    /// Confirm the multi-architecture build extension is installed.
    /// Returns its version line.
    async fn check_buildx(&self) -> Result<String>;

    /// Create the named builder unless it already exists.
    async fn ensure_builder(&self, name: &str) -> Result<BuilderStatus>;

    /// Make the named builder the active one.
    async fn use_builder(&self, name: &str) -> Result<()>;

    /// Start the builder's backing instance. Slow on first use.
    async fn bootstrap_builder(&self, name: &str) -> Result<()>;

    /// Multi-platform build. Pushes when `request.output` is [`BuildOutput::Push`].
    async fn build(&self, request: &BuildRequest) -> Result<()>;

    async fn pull(&self, image: &str) -> Result<()>;

    /// Start a detached container. Returns the container id.
    async fn run(&self, spec: &RunSpec) -> Result<String>;

    async fn inspect_status(&self, container: &str) -> Result<ContainerStatus>;

    /// Combined stdout and stderr of the container.
    async fn logs(&self, container: &str) -> Result<String>;

    async fn stop(&self, container: &str) -> Result<()>;

    /// Force-remove a container. Removing a missing container succeeds.
    async fn remove(&self, container: &str) -> Result<()>;

    async fn remove_builder(&self, name: &str) -> Result<()>;
}

/// Result of [`ContainerEngine::ensure_builder`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuilderStatus {
    Created,
    Existing,
}

/// Where the result of a build goes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildOutput {
    /// Push the multi-platform manifest to the registry
    Push,
    /// Keep the result in the builder only
    Local,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildRequest {
    /// Full image reference, `name:tag`
    pub image: String,
    pub platforms: Vec<String>,
    pub dockerfile: PathBuf,
    pub context: PathBuf,
    pub output: BuildOutput,
}

impl BuildRequest {
    /// Platforms in the comma-separated form buildx expects
    pub fn platform_list(&self) -> String {
        self.platforms.join(",")
    }

    pub fn pushes(&self) -> bool {
        self.output == BuildOutput::Push
    }
}

/// A detached container with one published port
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSpec {
    pub name: String,
    pub image: String,
    pub host_port: u16,
    pub container_port: u16,
    pub env: Vec<(String, String)>,
}

impl RunSpec {
    pub fn new(name: impl Into<String>, image: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            image: image.into(),
            host_port: 80,
            container_port: 80,
            env: Vec::new(),
        }
    }

    pub fn publish(mut self, host_port: u16, container_port: u16) -> Self {
        self.host_port = host_port;
        self.container_port = container_port;
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }
}

/// Container state as reported by `docker inspect`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerStatus {
    #[serde(rename = "Status")]
    pub status: String,

    #[serde(rename = "Running", default)]
    pub running: bool,

    #[serde(rename = "ExitCode", default)]
    pub exit_code: i64,
}

impl ContainerStatus {
    pub fn running() -> Self {
        Self {
            status: "running".to_string(),
            running: true,
            exit_code: 0,
        }
    }

    pub fn created() -> Self {
        Self {
            status: "created".to_string(),
            running: false,
            exit_code: 0,
        }
    }

    pub fn exited(exit_code: i64) -> Self {
        Self {
            status: "exited".to_string(),
            running: false,
            exit_code,
        }
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// The container will not become running without outside intervention
    pub fn has_stopped(&self) -> bool {
        matches!(self.status.as_str(), "exited" | "dead")
    }
}
