//! docker CLI adapter
//!
//! Wraps the `docker` command line, including the `buildx` plugin.

use crate::engine::{BuildRequest, BuilderStatus, ContainerEngine, ContainerStatus, RunSpec};
use crate::error::{EngineError, Result};
use async_trait::async_trait;
use std::process::{Output, Stdio};
use tokio::process::Command;

/// docker CLI wrapper
pub struct DockerCli {
    binary: String,
}

impl Default for DockerCli {
    fn default() -> Self {
        Self::new()
    }
}

impl DockerCli {
    pub fn new() -> Self {
        Self::with_binary("docker")
    }

    /// Drive another engine with a docker-compatible CLI (e.g. `podman`)
    pub fn with_binary(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    pub fn binary(&self) -> &str {
        &self.binary
    }

    fn describe(&self, args: &[&str]) -> String {
        format!("{} {}", self.binary, args.join(" "))
    }

    /// Run a command and return its raw output, whatever the exit status
    async fn output(&self, args: &[&str]) -> Result<Output> {
        let mut cmd = Command::new(&self.binary);
        cmd.args(args);
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());

        tracing::debug!("Running: {}", self.describe(args));

        cmd.output().await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                EngineError::EngineNotFound {
                    binary: self.binary.clone(),
                }
            } else {
                EngineError::Io(e)
            }
        })
    }

    /// Run a command and return stdout
    async fn run_command(&self, args: &[&str]) -> Result<String> {
        let output = self.output(args).await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(EngineError::CommandFailed {
                command: self.describe(args),
                stderr: stderr.trim().to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    async fn run_owned(&self, args: &[String]) -> Result<String> {
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        self.run_command(&args).await
    }
}

/// Arguments for `docker buildx build`
pub fn build_args(request: &BuildRequest) -> Vec<String> {
    let mut args = vec![
        "buildx".to_string(),
        "build".to_string(),
        "--platform".to_string(),
        request.platform_list(),
        "-t".to_string(),
        request.image.clone(),
        "-f".to_string(),
        request.dockerfile.display().to_string(),
    ];

    if request.pushes() {
        args.push("--push".to_string());
    }

    args.push(request.context.display().to_string());
    args
}

/// Arguments for `docker run`
pub fn run_args(spec: &RunSpec) -> Vec<String> {
    let mut args = vec![
        "run".to_string(),
        "-d".to_string(),
        "--name".to_string(),
        spec.name.clone(),
        "-p".to_string(),
        format!("{}:{}", spec.host_port, spec.container_port),
    ];

    for (key, value) in &spec.env {
        args.push("-e".to_string());
        args.push(format!("{}={}", key, value));
    }

    args.push(spec.image.clone());
    args
}

fn is_missing_container(stderr: &str) -> bool {
    stderr.contains("No such container") || stderr.contains("No such object")
}

#[async_trait]
impl ContainerEngine for DockerCli {
    async fn check_daemon(&self) -> Result<String> {
        match self
            .run_command(&["info", "--format", "{{.ServerVersion}}"])
            .await
        {
            Ok(version) => Ok(version.trim().to_string()),
            Err(EngineError::CommandFailed { stderr, .. }) => {
                Err(EngineError::DaemonUnreachable(stderr))
            }
            Err(e) => Err(e),
        }
    }

    async fn check_buildx(&self) -> Result<String> {
        match self.run_command(&["buildx", "version"]).await {
            Ok(version) => Ok(version.trim().to_string()),
            Err(EngineError::CommandFailed { stderr, .. }) => {
                Err(EngineError::BuildxUnavailable(stderr))
            }
            Err(e) => Err(e),
        }
    }

    async fn ensure_builder(&self, name: &str) -> Result<BuilderStatus> {
        match self.run_command(&["buildx", "inspect", name]).await {
            Ok(_) => Ok(BuilderStatus::Existing),
            Err(EngineError::CommandFailed { .. }) => {
                self.run_command(&[
                    "buildx",
                    "create",
                    "--name",
                    name,
                    "--driver",
                    "docker-container",
                ])
                .await?;
                Ok(BuilderStatus::Created)
            }
            Err(e) => Err(e),
        }
    }

    async fn use_builder(&self, name: &str) -> Result<()> {
        self.run_command(&["buildx", "use", name]).await?;
        Ok(())
    }

    async fn bootstrap_builder(&self, name: &str) -> Result<()> {
        self.run_command(&["buildx", "inspect", name, "--bootstrap"])
            .await?;
        Ok(())
    }

    async fn build(&self, request: &BuildRequest) -> Result<()> {
        self.run_owned(&build_args(request)).await?;
        Ok(())
    }

    async fn pull(&self, image: &str) -> Result<()> {
        self.run_command(&["pull", image]).await?;
        Ok(())
    }

    async fn run(&self, spec: &RunSpec) -> Result<String> {
        let id = self.run_owned(&run_args(spec)).await?;
        Ok(id.trim().to_string())
    }

    async fn inspect_status(&self, container: &str) -> Result<ContainerStatus> {
        let output = match self
            .run_command(&["inspect", "--format", "{{json .State}}", container])
            .await
        {
            Ok(output) => output,
            Err(EngineError::CommandFailed { stderr, .. }) if is_missing_container(&stderr) => {
                return Err(EngineError::ContainerNotFound {
                    container: container.to_string(),
                });
            }
            Err(e) => return Err(e),
        };

        let status: ContainerStatus = serde_json::from_str(output.trim())?;
        Ok(status)
    }

    async fn logs(&self, container: &str) -> Result<String> {
        let args = ["logs", container];
        let output = self.output(&args).await?;
        let stderr = String::from_utf8_lossy(&output.stderr);

        if !output.status.success() {
            if is_missing_container(&stderr) {
                return Err(EngineError::ContainerNotFound {
                    container: container.to_string(),
                });
            }
            return Err(EngineError::CommandFailed {
                command: self.describe(&args),
                stderr: stderr.trim().to_string(),
            });
        }

        // `docker logs` replays the container's stderr on its own stderr
        let mut combined = String::from_utf8_lossy(&output.stdout).to_string();
        combined.push_str(&stderr);
        Ok(combined)
    }

    async fn stop(&self, container: &str) -> Result<()> {
        self.run_command(&["stop", container]).await?;
        Ok(())
    }

    async fn remove(&self, container: &str) -> Result<()> {
        match self.run_command(&["rm", "-f", container]).await {
            Ok(_) => Ok(()),
            Err(EngineError::CommandFailed { stderr, .. }) if is_missing_container(&stderr) => {
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    async fn remove_builder(&self, name: &str) -> Result<()> {
        self.run_command(&["buildx", "rm", name]).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::BuildOutput;
    use std::path::PathBuf;

    fn request(output: BuildOutput) -> BuildRequest {
        BuildRequest {
            image: "pageship/placeholder:latest".to_string(),
            platforms: vec!["linux/amd64".to_string(), "linux/arm64".to_string()],
            dockerfile: PathBuf::from("Dockerfile"),
            context: PathBuf::from("."),
            output,
        }
    }

    #[test]
    fn test_build_args_push() {
        let args = build_args(&request(BuildOutput::Push));
        assert_eq!(
            args,
            vec![
                "buildx",
                "build",
                "--platform",
                "linux/amd64,linux/arm64",
                "-t",
                "pageship/placeholder:latest",
                "-f",
                "Dockerfile",
                "--push",
                ".",
            ]
        );
    }

    #[test]
    fn test_build_args_local_has_no_push() {
        let args = build_args(&request(BuildOutput::Local));
        assert!(!args.iter().any(|a| a == "--push"));
        assert_eq!(args.last().map(String::as_str), Some("."));
    }

    #[test]
    fn test_run_args() {
        let spec = RunSpec::new("pageship-smoke-test", "pageship/placeholder:latest")
            .publish(8080, 80)
            .env("PORT", "80");

        assert_eq!(
            run_args(&spec),
            vec![
                "run",
                "-d",
                "--name",
                "pageship-smoke-test",
                "-p",
                "8080:80",
                "-e",
                "PORT=80",
                "pageship/placeholder:latest",
            ]
        );
    }

    #[test]
    fn test_missing_container_detection() {
        assert!(is_missing_container(
            "Error response from daemon: No such container: smoke"
        ));
        assert!(is_missing_container("Error: No such object: smoke"));
        assert!(!is_missing_container("permission denied"));
    }

    #[tokio::test]
    async fn test_missing_binary_is_reported() {
        let engine = DockerCli::with_binary("pageship-definitely-not-installed");
        let err = engine.check_daemon().await.unwrap_err();
        assert!(matches!(err, EngineError::EngineNotFound { .. }));
    }

    /// Needs a running docker daemon: `cargo test -- --ignored`
    #[tokio::test]
    #[ignore = "requires a running docker daemon"]
    async fn test_check_daemon_against_real_engine() {
        let engine = DockerCli::new();
        let version = engine.check_daemon().await.unwrap();
        assert!(!version.is_empty());
    }
}
