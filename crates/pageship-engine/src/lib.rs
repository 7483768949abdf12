//! Container engine abstraction for pageship
//!
//! The deploy flow never talks to docker directly. It goes through the
//! [`ContainerEngine`] trait, which has two implementations:
//!
//! - [`DockerCli`]: drives the `docker` command line (including `buildx`)
//! - `FakeEngine` (feature `fake`): in-memory engine for tests
//!
//! # Example
//!
//! ```ignore
//! use pageship_engine::{ContainerEngine, DockerCli};
//!
//! let engine = DockerCli::new();
//! let version = engine.check_daemon().await?;
//! let status = engine.ensure_builder("pageship-builder").await?;
//! ```

pub mod docker;
pub mod engine;
pub mod error;
#[cfg(feature = "fake")]
pub mod fake;
pub mod waiter;

pub use docker::DockerCli;
pub use engine::{BuildOutput, BuildRequest, BuilderStatus, ContainerEngine, ContainerStatus, RunSpec};
pub use error::{EngineError, Result};
#[cfg(feature = "fake")]
pub use fake::{Call, FakeEngine, Op};
pub use waiter::{WaitConfig, wait_until_running};
