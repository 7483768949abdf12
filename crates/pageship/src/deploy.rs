//! The deploy flow: prerequisites → builder → build/push → smoke test → cleanup
//!
//! Every stage stops the run on its first error. Nothing already done is
//! rolled back.

use crate::plan::DeployPlan;
use crate::progress::StepProgress;
use anyhow::Context;
use colored::Colorize;
use pageship_engine::{BuilderStatus, ContainerEngine, wait_until_running};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    CheckPrereqs,
    SetupBuilder,
    BuildAndPush,
    BuildOnly,
    TestImage,
    CleanupBuilder,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::CheckPrereqs => "check prerequisites",
            Stage::SetupBuilder => "set up builder",
            Stage::BuildAndPush => "build and push",
            Stage::BuildOnly => "build",
            Stage::TestImage => "smoke test",
            Stage::CleanupBuilder => "remove builder",
        };
        f.write_str(name)
    }
}

/// What a successful run did
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    pub builder: BuilderStatus,
    pub pushed: bool,
    /// URL the smoke test container answered on, when the test ran
    pub test_url: Option<String>,
    pub builder_removed: bool,
}

pub async fn run<E>(engine: &E, plan: &DeployPlan) -> anyhow::Result<Outcome>
where
    E: ContainerEngine + ?Sized,
{
    check_prerequisites(engine)
        .await
        .with_context(|| format!("{} failed", Stage::CheckPrereqs))?;

    let builder = setup_builder(engine, plan)
        .await
        .with_context(|| format!("{} failed", Stage::SetupBuilder))?;

    let build_stage = if plan.mode.push {
        Stage::BuildAndPush
    } else {
        Stage::BuildOnly
    };
    build_image(engine, plan)
        .await
        .with_context(|| format!("{} failed", build_stage))?;

    let test_url = if plan.mode.test {
        let url = smoke_test(engine, plan)
            .await
            .with_context(|| format!("{} failed", Stage::TestImage))?;
        Some(url)
    } else {
        None
    };

    if plan.mode.cleanup {
        cleanup_builder(engine, plan)
            .await
            .with_context(|| format!("{} failed", Stage::CleanupBuilder))?;
    }

    println!();
    println!("{}", "✓ All done!".green().bold());

    Ok(Outcome {
        builder,
        pushed: plan.mode.push,
        test_url,
        builder_removed: plan.mode.cleanup,
    })
}

pub async fn check_prerequisites<E>(engine: &E) -> anyhow::Result<()>
where
    E: ContainerEngine + ?Sized,
{
    println!("{}", "Checking prerequisites...".blue());

    let version = engine.check_daemon().await?;
    println!("  {} Docker daemon is running (server {})", "✓".green(), version.cyan());

    let buildx = engine.check_buildx().await?;
    println!("  {} buildx is available ({})", "✓".green(), buildx.dimmed());

    Ok(())
}

/// Create (or reuse) the builder, select it and bootstrap it
pub async fn setup_builder<E>(engine: &E, plan: &DeployPlan) -> anyhow::Result<BuilderStatus>
where
    E: ContainerEngine + ?Sized,
{
    let name = plan.settings.builder.as_str();

    println!();
    println!("{}", format!("🔧 Preparing builder '{}'...", name).blue());

    let status = engine.ensure_builder(name).await?;
    match status {
        BuilderStatus::Created => println!("  {} Builder created", "✓".green()),
        BuilderStatus::Existing => {
            println!("  {} Builder already exists, reusing it", "ℹ".blue())
        }
    }

    engine.use_builder(name).await?;
    println!("  {} Using builder {}", "✓".green(), name.cyan());

    let progress = StepProgress::new("Bootstrapping builder (first run can take a while)...");
    match engine.bootstrap_builder(name).await {
        Ok(()) => progress.finish_success("Builder ready"),
        Err(e) => {
            progress.finish_error("Bootstrap failed");
            return Err(e.into());
        }
    }

    Ok(status)
}

pub async fn build_image<E>(engine: &E, plan: &DeployPlan) -> anyhow::Result<()>
where
    E: ContainerEngine + ?Sized,
{
    let request = plan.build_request();

    println!();
    println!(
        "{}",
        format!("🔨 Building {}...", request.image).green().bold()
    );
    println!("  → Platforms: {}", request.platform_list().cyan());
    println!(
        "  → Dockerfile: {}",
        request.dockerfile.display().to_string().cyan()
    );
    println!("  → Context: {}", request.context.display().to_string().cyan());

    let progress = StepProgress::new(if request.pushes() {
        "Building and pushing..."
    } else {
        "Building..."
    });
    match engine.build(&request).await {
        Ok(()) => progress.finish_success("Build complete"),
        Err(e) => {
            progress.finish_error("Build failed");
            return Err(e.into());
        }
    }

    if request.pushes() {
        println!("  {} Pushed {}", "✓".green(), request.image.cyan());
    } else {
        println!(
            "  {} Local build only, nothing was pushed",
            "ℹ".blue()
        );
    }

    Ok(())
}

/// Pull the pushed image, run it and wait for it to report running.
/// Returns the URL the page is served on.
pub async fn smoke_test<E>(engine: &E, plan: &DeployPlan) -> anyhow::Result<String>
where
    E: ContainerEngine + ?Sized,
{
    let image = plan.image_ref();
    let spec = plan.smoke_test_spec();
    let name = spec.name.as_str();

    println!();
    println!("{}", "🧪 Smoke testing the pushed image...".blue().bold());

    let progress = StepProgress::new(&format!("Pulling {}...", image));
    match engine.pull(&image).await {
        Ok(()) => progress.finish_success("Pulled"),
        Err(e) => {
            progress.finish_error("Pull failed");
            return Err(e.into());
        }
    }

    // A container left behind by an interrupted run would block the name
    engine
        .remove(name)
        .await
        .context("failed to remove a stale smoke test container")?;

    if let Err(e) = engine.run(&spec).await {
        discard_container(engine, name).await;
        return Err(e.into());
    }
    println!(
        "  {} Started {} ({}:{})",
        "✓".green(),
        name.cyan(),
        spec.host_port,
        spec.container_port
    );

    match wait_until_running(engine, name, &plan.readiness()).await {
        Ok(_) => {
            let url = plan.test_url();
            println!("  {} Container is running", "✓".green());
            println!("  {} Test URL: {}", "→".blue(), url.cyan());

            if let Err(e) = engine.stop(name).await {
                tracing::warn!(container = name, error = %e, "failed to stop smoke test container");
                println!("  {} Could not stop {}: {}", "⚠".yellow(), name, e);
            }
            discard_container(engine, name).await;

            Ok(url)
        }
        Err(e) => {
            println!("  {} Container did not start", "✗".red().bold());
            print_container_logs(engine, name).await;
            discard_container(engine, name).await;
            Err(anyhow::Error::new(e).context("smoke test container is not running"))
        }
    }
}

pub async fn cleanup_builder<E>(engine: &E, plan: &DeployPlan) -> anyhow::Result<()>
where
    E: ContainerEngine + ?Sized,
{
    let name = plan.settings.builder.as_str();

    println!();
    println!("{}", format!("🧹 Removing builder '{}'...", name).blue());
    engine.remove_builder(name).await?;
    println!("  {} Builder removed", "✓".green());

    Ok(())
}

/// Best-effort removal; failures are reported, never returned
async fn discard_container<E>(engine: &E, name: &str)
where
    E: ContainerEngine + ?Sized,
{
    match engine.remove(name).await {
        Ok(()) => println!("  {} Removed {}", "✓".green(), name.cyan()),
        Err(e) => {
            tracing::warn!(container = name, error = %e, "failed to remove smoke test container");
            println!("  {} Could not remove {}: {}", "⚠".yellow(), name, e);
        }
    }
}

async fn print_container_logs<E>(engine: &E, name: &str)
where
    E: ContainerEngine + ?Sized,
{
    match engine.logs(name).await {
        Ok(logs) if logs.trim().is_empty() => {
            println!("  {} Container produced no logs", "ℹ".blue());
        }
        Ok(logs) => {
            println!("{}", format!("=== {} logs ===", name).cyan().bold());
            print!("{}", logs);
            if !logs.ends_with('\n') {
                println!();
            }
        }
        Err(e) => {
            println!("  {} Could not fetch logs: {}", "⚠".yellow(), e);
        }
    }
}
