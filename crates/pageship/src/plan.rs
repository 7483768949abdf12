use crate::deploy::Stage;
use colored::Colorize;
use pageship_config::Settings;
use pageship_engine::{BuildOutput, BuildRequest, RunSpec, WaitConfig};
use std::path::Path;

/// What this run does, fixed from the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunMode {
    pub push: bool,
    pub test: bool,
    pub cleanup: bool,
}

impl Default for RunMode {
    fn default() -> Self {
        Self {
            push: true,
            test: false,
            cleanup: false,
        }
    }
}

impl RunMode {
    pub fn build_output(&self) -> BuildOutput {
        if self.push {
            BuildOutput::Push
        } else {
            BuildOutput::Local
        }
    }
}

/// Settings and run mode for one invocation. Built once, never mutated.
#[derive(Debug, Clone)]
pub struct DeployPlan {
    pub settings: Settings,
    pub mode: RunMode,
}

impl DeployPlan {
    pub fn new(settings: Settings, mode: RunMode) -> anyhow::Result<Self> {
        // The smoke test pulls from the registry
        if mode.test && !mode.push {
            anyhow::bail!("the smoke test needs a pushed image; --test cannot be combined with --no-push");
        }
        Ok(Self { settings, mode })
    }

    pub fn image_ref(&self) -> String {
        self.settings.image_ref()
    }

    pub fn build_request(&self) -> BuildRequest {
        BuildRequest {
            image: self.image_ref(),
            platforms: self.settings.platforms.clone(),
            dockerfile: self.settings.dockerfile.clone(),
            context: self.settings.context.clone(),
            output: self.mode.build_output(),
        }
    }

    /// Container for the smoke test. `PORT` and the published container
    /// port are the same value so the server answers on the mapped port.
    pub fn smoke_test_spec(&self) -> RunSpec {
        let test = &self.settings.smoke_test;
        RunSpec::new(&test.container_name, self.image_ref())
            .publish(test.host_port, test.container_port)
            .env("PORT", test.container_port.to_string())
    }

    pub fn readiness(&self) -> WaitConfig {
        let r = &self.settings.smoke_test.readiness;
        WaitConfig {
            max_retries: r.max_retries,
            initial_delay_ms: r.initial_delay_ms,
            max_delay_ms: r.max_delay_ms,
            multiplier: r.multiplier,
        }
    }

    /// Worst-case time spent waiting for the smoke test container
    pub fn readiness_window(&self) -> String {
        let readiness = self.readiness();
        format!(
            "{} checks within {:.1}s",
            readiness.max_retries,
            readiness.total_budget_ms() as f64 / 1000.0
        )
    }

    pub fn test_url(&self) -> String {
        format!("http://localhost:{}", self.settings.smoke_test.host_port)
    }

    /// Stages this run will go through, in order
    pub fn stages(&self) -> Vec<Stage> {
        let mut stages = vec![Stage::CheckPrereqs, Stage::SetupBuilder];
        stages.push(if self.mode.push {
            Stage::BuildAndPush
        } else {
            Stage::BuildOnly
        });
        if self.mode.test {
            stages.push(Stage::TestImage);
        }
        if self.mode.cleanup {
            stages.push(Stage::CleanupBuilder);
        }
        stages
    }

    pub fn print_summary(&self, config_path: Option<&Path>) {
        println!("{}", "pageship".bold());
        match config_path {
            Some(path) => println!("📄 Settings: {}", path.display().to_string().cyan()),
            None => println!("📄 Settings: {}", "defaults".dimmed()),
        }
        println!("Image: {}", self.image_ref().cyan());
        println!("Platforms: {}", self.settings.platforms.join(", ").cyan());
        println!("Builder: {}", self.settings.builder.cyan());
        if self.mode.test {
            println!(
                "Smoke test: {} ({})",
                self.test_url().cyan(),
                self.readiness_window()
            );
        }
        println!(
            "Stages: {}",
            self.stages()
                .iter()
                .map(|s| s.to_string())
                .collect::<Vec<_>>()
                .join(" → ")
        );
        println!();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_push_with_test_is_rejected() {
        let mode = RunMode {
            push: false,
            test: true,
            cleanup: false,
        };
        assert!(DeployPlan::new(Settings::default(), mode).is_err());
    }

    #[test]
    fn test_stages_for_full_run() {
        let mode = RunMode {
            push: true,
            test: true,
            cleanup: true,
        };
        let plan = DeployPlan::new(Settings::default(), mode).unwrap();

        assert_eq!(
            plan.stages(),
            vec![
                Stage::CheckPrereqs,
                Stage::SetupBuilder,
                Stage::BuildAndPush,
                Stage::TestImage,
                Stage::CleanupBuilder,
            ]
        );
    }

    #[test]
    fn test_stages_for_local_build() {
        let mode = RunMode {
            push: false,
            ..Default::default()
        };
        let plan = DeployPlan::new(Settings::default(), mode).unwrap();

        assert_eq!(
            plan.stages(),
            vec![Stage::CheckPrereqs, Stage::SetupBuilder, Stage::BuildOnly]
        );
        assert_eq!(plan.build_request().output, BuildOutput::Local);
    }

    #[test]
    fn test_smoke_test_spec_uses_same_port_for_env_and_mapping() {
        let mut settings = Settings::default();
        settings.smoke_test.host_port = 18080;
        settings.smoke_test.container_port = 8081;
        let plan = DeployPlan::new(settings, RunMode::default()).unwrap();

        let spec = plan.smoke_test_spec();
        assert_eq!(spec.image, "pageship/placeholder:latest");
        assert_eq!(spec.host_port, 18080);
        assert_eq!(spec.container_port, 8081);
        assert_eq!(spec.env, vec![("PORT".to_string(), "8081".to_string())]);
        assert_eq!(plan.test_url(), "http://localhost:18080");
    }

    #[test]
    fn test_readiness_window_from_settings() {
        let plan = DeployPlan::new(Settings::default(), RunMode::default()).unwrap();
        assert_eq!(plan.readiness_window(), "10 checks within 27.5s");
    }
}
