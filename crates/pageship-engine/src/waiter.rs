//! Container readiness polling with exponential backoff

use crate::engine::{ContainerEngine, ContainerStatus};
use crate::error::{EngineError, Result};
use std::time::Duration;
use tokio::time::sleep;

/// Backoff schedule for readiness polling
#[derive(Debug, Clone, PartialEq)]
pub struct WaitConfig {
    pub max_retries: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub multiplier: f64,
}

impl Default for WaitConfig {
    fn default() -> Self {
        Self {
            max_retries: 10,
            initial_delay_ms: 500,
            max_delay_ms: 4000,
            multiplier: 2.0,
        }
    }
}

impl WaitConfig {
    /// Delay before the check following `attempt` (0-based), capped at `max_delay_ms`
    pub fn delay_for_attempt(&self, attempt: u32) -> u64 {
        let delay = self.initial_delay_ms as f64 * self.multiplier.powi(attempt as i32);
        if delay >= self.max_delay_ms as f64 {
            self.max_delay_ms
        } else {
            delay as u64
        }
    }

    /// Upper bound on time spent sleeping across all attempts
    pub fn total_budget_ms(&self) -> u64 {
        (0..self.max_retries.saturating_sub(1))
            .map(|attempt| self.delay_for_attempt(attempt))
            .sum()
    }
}

/// Poll the container until it reports running.
///
/// A container that is not visible yet counts as not ready. A container
/// that has already exited fails immediately instead of burning the
/// remaining attempts.
pub async fn wait_until_running<E>(
    engine: &E,
    container: &str,
    config: &WaitConfig,
) -> Result<ContainerStatus>
where
    E: ContainerEngine + ?Sized,
{
    for attempt in 0..config.max_retries {
        match engine.inspect_status(container).await {
            Ok(status) if status.is_running() => {
                tracing::debug!(container, attempt, "container is running");
                return Ok(status);
            }
            Ok(status) if status.has_stopped() => {
                return Err(EngineError::ContainerExited {
                    container: container.to_string(),
                    status: status.status,
                    exit_code: status.exit_code,
                });
            }
            Ok(status) => {
                tracing::debug!(container, attempt, status = %status.status, "not running yet");
            }
            Err(e) => {
                tracing::debug!(container, attempt, error = %e, "status not available yet");
            }
        }

        if attempt + 1 < config.max_retries {
            sleep(Duration::from_millis(config.delay_for_attempt(attempt))).await;
        }
    }

    Err(EngineError::ReadinessTimeout {
        container: container.to_string(),
        attempts: config.max_retries,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delay_calculation() {
        let config = WaitConfig {
            max_retries: 5,
            initial_delay_ms: 1000,
            max_delay_ms: 10000,
            multiplier: 2.0,
        };

        assert_eq!(config.delay_for_attempt(0), 1000);
        assert_eq!(config.delay_for_attempt(1), 2000);
        assert_eq!(config.delay_for_attempt(2), 4000);
        assert_eq!(config.delay_for_attempt(3), 8000);
        assert_eq!(config.delay_for_attempt(4), 10000); // capped at max
    }

    #[test]
    fn test_default_budget_is_bounded() {
        let config = WaitConfig::default();
        // 500 + 1000 + 2000 + 4000 * 6
        assert_eq!(config.total_budget_ms(), 27500);
    }

    #[test]
    fn test_single_attempt_never_sleeps() {
        let config = WaitConfig {
            max_retries: 1,
            ..Default::default()
        };
        assert_eq!(config.total_budget_ms(), 0);
    }
}
