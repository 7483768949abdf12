//! Container engine error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("{binary} not found. Please install Docker or put the engine binary on PATH")]
    EngineNotFound { binary: String },

    #[error(
        "container engine daemon is not reachable: {0}\n\nHint:\n  • Make sure Docker is running\n  • Check that `docker info` works from this shell"
    )]
    DaemonUnreachable(String),

    #[error(
        "docker buildx is not available: {0}\n\nHint:\n  • Install the buildx plugin or update Docker Desktop\n  • Check that `docker buildx version` works from this shell"
    )]
    BuildxUnavailable(String),

    #[error("command failed: {command}\n{stderr}")]
    CommandFailed { command: String, stderr: String },

    #[error("container '{container}' not found")]
    ContainerNotFound { container: String },

    #[error("container '{container}' stopped with status '{status}' (exit code {exit_code})")]
    ContainerExited {
        container: String,
        status: String,
        exit_code: i64,
    },

    #[error("container '{container}' was not running after {attempts} status checks")]
    ReadinessTimeout { container: String, attempts: u32 },

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, EngineError>;
