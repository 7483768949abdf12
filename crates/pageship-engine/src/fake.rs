//! In-memory container engine
//!
//! Records every call and keeps just enough state (builders, containers,
//! pushed images) for tests to assert what a deploy run left behind.

use crate::engine::{BuildRequest, BuilderStatus, ContainerEngine, ContainerStatus, RunSpec};
use crate::error::{EngineError, Result};
use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet, HashSet, VecDeque};
use std::sync::{Mutex, MutexGuard};

/// Engine operation, used for failure injection and call counting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    CheckDaemon,
    CheckBuildx,
    EnsureBuilder,
    UseBuilder,
    BootstrapBuilder,
    Build,
    Pull,
    Run,
    InspectStatus,
    Logs,
    Stop,
    Remove,
    RemoveBuilder,
}

/// A recorded engine call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    CheckDaemon,
    CheckBuildx,
    EnsureBuilder(String),
    UseBuilder(String),
    BootstrapBuilder(String),
    Build(BuildRequest),
    Pull(String),
    Run(RunSpec),
    InspectStatus(String),
    Logs(String),
    Stop(String),
    Remove(String),
    RemoveBuilder(String),
}

impl Call {
    pub fn op(&self) -> Op {
        match self {
            Call::CheckDaemon => Op::CheckDaemon,
            Call::CheckBuildx => Op::CheckBuildx,
            Call::EnsureBuilder(_) => Op::EnsureBuilder,
            Call::UseBuilder(_) => Op::UseBuilder,
            Call::BootstrapBuilder(_) => Op::BootstrapBuilder,
            Call::Build(_) => Op::Build,
            Call::Pull(_) => Op::Pull,
            Call::Run(_) => Op::Run,
            Call::InspectStatus(_) => Op::InspectStatus,
            Call::Logs(_) => Op::Logs,
            Call::Stop(_) => Op::Stop,
            Call::Remove(_) => Op::Remove,
            Call::RemoveBuilder(_) => Op::RemoveBuilder,
        }
    }

    /// Calls that change engine or registry state
    pub fn is_mutation(&self) -> bool {
        !matches!(
            self.op(),
            Op::CheckDaemon | Op::CheckBuildx | Op::InspectStatus | Op::Logs
        )
    }
}

#[derive(Debug)]
struct FakeState {
    calls: Vec<Call>,
    daemon_available: bool,
    buildx_available: bool,
    failing: HashSet<Op>,
    builders: BTreeSet<String>,
    active_builder: Option<String>,
    registry: BTreeSet<String>,
    images: BTreeSet<String>,
    containers: BTreeMap<String, ContainerStatus>,
    status_script: VecDeque<ContainerStatus>,
    logs: String,
}

/// Scriptable [`ContainerEngine`] that never touches a real daemon
#[derive(Debug)]
pub struct FakeEngine {
    state: Mutex<FakeState>,
}

impl Default for FakeEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeEngine {
    /// Daemon up, buildx installed, no builders, empty registry
    pub fn new() -> Self {
        Self {
            state: Mutex::new(FakeState {
                calls: Vec::new(),
                daemon_available: true,
                buildx_available: true,
                failing: HashSet::new(),
                builders: BTreeSet::new(),
                active_builder: None,
                registry: BTreeSet::new(),
                images: BTreeSet::new(),
                containers: BTreeMap::new(),
                status_script: VecDeque::new(),
                logs: String::new(),
            }),
        }
    }

    pub fn without_daemon(self) -> Self {
        self.lock().daemon_available = false;
        self
    }

    pub fn without_buildx(self) -> Self {
        self.lock().buildx_available = false;
        self
    }

    /// Make every call of `op` fail with a command error
    pub fn failing_on(self, op: Op) -> Self {
        self.lock().failing.insert(op);
        self
    }

    pub fn with_builder(self, name: &str) -> Self {
        self.lock().builders.insert(name.to_string());
        self
    }

    /// Container left over from an earlier run
    pub fn with_container(self, name: &str, status: ContainerStatus) -> Self {
        self.lock().containers.insert(name.to_string(), status);
        self
    }

    /// Image already present in the registry
    pub fn with_registry_image(self, image: &str) -> Self {
        self.lock().registry.insert(image.to_string());
        self
    }

    /// Statuses returned by successive `inspect_status` calls. Once the
    /// script runs out, the container keeps its last status.
    pub fn with_status_sequence(self, statuses: Vec<ContainerStatus>) -> Self {
        self.lock().status_script = statuses.into();
        self
    }

    pub fn with_logs(self, logs: &str) -> Self {
        self.lock().logs = logs.to_string();
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.lock().calls.clone()
    }

    pub fn ops(&self) -> Vec<Op> {
        self.lock().calls.iter().map(Call::op).collect()
    }

    pub fn count(&self, op: Op) -> usize {
        self.lock().calls.iter().filter(|c| c.op() == op).count()
    }

    pub fn has_builder(&self, name: &str) -> bool {
        self.lock().builders.contains(name)
    }

    pub fn active_builder(&self) -> Option<String> {
        self.lock().active_builder.clone()
    }

    pub fn has_container(&self, name: &str) -> bool {
        self.lock().containers.contains_key(name)
    }

    pub fn is_pushed(&self, image: &str) -> bool {
        self.lock().registry.contains(image)
    }

    fn lock(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Record the call and apply failure injection
    fn enter(&self, call: Call) -> Result<MutexGuard<'_, FakeState>> {
        let mut state = self.lock();
        let op = call.op();
        state.calls.push(call);

        if state.failing.contains(&op) {
            return Err(EngineError::CommandFailed {
                command: format!("fake {:?}", op),
                stderr: "injected failure".to_string(),
            });
        }
        Ok(state)
    }
}

#[async_trait]
impl ContainerEngine for FakeEngine {
    async fn check_daemon(&self) -> Result<String> {
        let state = self.enter(Call::CheckDaemon)?;
        if !state.daemon_available {
            return Err(EngineError::DaemonUnreachable(
                "Cannot connect to the Docker daemon".to_string(),
            ));
        }
        Ok("fake".to_string())
    }

    async fn check_buildx(&self) -> Result<String> {
        let state = self.enter(Call::CheckBuildx)?;
        if !state.buildx_available {
            return Err(EngineError::BuildxUnavailable(
                "'buildx' is not a docker command".to_string(),
            ));
        }
        Ok("github.com/docker/buildx fake".to_string())
    }

    async fn ensure_builder(&self, name: &str) -> Result<BuilderStatus> {
        let mut state = self.enter(Call::EnsureBuilder(name.to_string()))?;
        if state.builders.insert(name.to_string()) {
            Ok(BuilderStatus::Created)
        } else {
            Ok(BuilderStatus::Existing)
        }
    }

    async fn use_builder(&self, name: &str) -> Result<()> {
        let mut state = self.enter(Call::UseBuilder(name.to_string()))?;
        if !state.builders.contains(name) {
            return Err(EngineError::CommandFailed {
                command: format!("buildx use {}", name),
                stderr: format!("no builder {:?} found", name),
            });
        }
        state.active_builder = Some(name.to_string());
        Ok(())
    }

    async fn bootstrap_builder(&self, name: &str) -> Result<()> {
        let state = self.enter(Call::BootstrapBuilder(name.to_string()))?;
        if !state.builders.contains(name) {
            return Err(EngineError::CommandFailed {
                command: format!("buildx inspect {} --bootstrap", name),
                stderr: format!("no builder {:?} found", name),
            });
        }
        Ok(())
    }

    async fn build(&self, request: &BuildRequest) -> Result<()> {
        let mut state = self.enter(Call::Build(request.clone()))?;
        if request.pushes() {
            state.registry.insert(request.image.clone());
        }
        Ok(())
    }

    async fn pull(&self, image: &str) -> Result<()> {
        let mut state = self.enter(Call::Pull(image.to_string()))?;
        if !state.registry.contains(image) {
            return Err(EngineError::CommandFailed {
                command: format!("pull {}", image),
                stderr: format!("manifest for {} not found", image),
            });
        }
        state.images.insert(image.to_string());
        Ok(())
    }

    async fn run(&self, spec: &RunSpec) -> Result<String> {
        let mut state = self.enter(Call::Run(spec.clone()))?;
        if state.containers.contains_key(&spec.name) {
            return Err(EngineError::CommandFailed {
                command: format!("run --name {}", spec.name),
                stderr: format!("container name {:?} is already in use", spec.name),
            });
        }
        state
            .containers
            .insert(spec.name.clone(), ContainerStatus::running());
        Ok(format!("fake-{}", spec.name))
    }

    async fn inspect_status(&self, container: &str) -> Result<ContainerStatus> {
        let mut state = self.enter(Call::InspectStatus(container.to_string()))?;
        if !state.containers.contains_key(container) {
            return Err(EngineError::ContainerNotFound {
                container: container.to_string(),
            });
        }
        if let Some(next) = state.status_script.pop_front() {
            state.containers.insert(container.to_string(), next);
        }
        state
            .containers
            .get(container)
            .cloned()
            .ok_or_else(|| EngineError::ContainerNotFound {
                container: container.to_string(),
            })
    }

    async fn logs(&self, container: &str) -> Result<String> {
        let state = self.enter(Call::Logs(container.to_string()))?;
        if !state.containers.contains_key(container) {
            return Err(EngineError::ContainerNotFound {
                container: container.to_string(),
            });
        }
        Ok(state.logs.clone())
    }

    async fn stop(&self, container: &str) -> Result<()> {
        let mut state = self.enter(Call::Stop(container.to_string()))?;
        match state.containers.get_mut(container) {
            Some(status) => {
                *status = ContainerStatus::exited(0);
                Ok(())
            }
            None => Err(EngineError::ContainerNotFound {
                container: container.to_string(),
            }),
        }
    }

    async fn remove(&self, container: &str) -> Result<()> {
        let mut state = self.enter(Call::Remove(container.to_string()))?;
        state.containers.remove(container);
        Ok(())
    }

    async fn remove_builder(&self, name: &str) -> Result<()> {
        let mut state = self.enter(Call::RemoveBuilder(name.to_string()))?;
        if !state.builders.remove(name) {
            return Err(EngineError::CommandFailed {
                command: format!("buildx rm {}", name),
                stderr: format!("no builder {:?} found", name),
            });
        }
        if state.active_builder.as_deref() == Some(name) {
            state.active_builder = None;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_ensure_builder_is_idempotent() {
        let engine = FakeEngine::new();

        assert_eq!(
            engine.ensure_builder("b").await.unwrap(),
            BuilderStatus::Created
        );
        assert_eq!(
            engine.ensure_builder("b").await.unwrap(),
            BuilderStatus::Existing
        );
        assert!(engine.has_builder("b"));
    }

    #[tokio::test]
    async fn test_injected_failure_is_recorded() {
        let engine = FakeEngine::new().failing_on(Op::Pull);

        let err = engine.pull("img:latest").await.unwrap_err();
        assert!(matches!(
            err,
            EngineError::CommandFailed { ref stderr, .. } if stderr.contains("injected")
        ));
        assert_eq!(engine.calls(), vec![Call::Pull("img:latest".to_string())]);
    }

    #[tokio::test]
    async fn test_pull_requires_pushed_image() {
        let engine = FakeEngine::new();
        assert!(engine.pull("img:latest").await.is_err());

        let engine = FakeEngine::new().with_registry_image("img:latest");
        assert!(engine.pull("img:latest").await.is_ok());
    }
}
