mod deploy;
mod plan;
mod progress;

use anyhow::Context;
use clap::Parser;
use colored::Colorize;
use pageship_engine::DockerCli;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "pageship", version)]
#[command(
    about = "Build the placeholder page image for every target platform and push it to the registry",
    long_about = None
)]
struct Cli {
    /// Pull the pushed image and run it as a smoke test
    #[arg(short, long)]
    test: bool,

    /// Build only; do not push to the registry
    #[arg(long, conflicts_with = "test")]
    no_push: bool,

    /// Remove the buildx builder when everything is done
    #[arg(long)]
    cleanup: bool,

    /// Settings file (default: pageship.yaml in the current directory)
    #[arg(short, long, env = "PAGESHIP_CONFIG_PATH")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Progress goes to stdout; diagnostics to stderr
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    if let Err(e) = run(cli).await {
        eprintln!();
        eprintln!("{} {:#}", "✗".red().bold(), e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let (settings, config_path) = pageship_config::Settings::resolve(cli.config.as_deref())
        .context("failed to load settings")?;

    let mode = plan::RunMode {
        push: !cli.no_push,
        test: cli.test,
        cleanup: cli.cleanup,
    };
    let plan = plan::DeployPlan::new(settings, mode)?;
    plan.print_summary(config_path.as_deref());

    let engine = DockerCli::with_binary(&plan.settings.engine);
    let outcome = deploy::run(&engine, &plan).await?;

    println!();
    println!("{}", "Summary:".bold());
    let builder_state = match (outcome.builder, outcome.builder_removed) {
        (_, true) => "removed",
        (pageship_engine::BuilderStatus::Created, false) => "created, kept",
        (pageship_engine::BuilderStatus::Existing, false) => "reused, kept",
    };
    println!("  {} builder {}: {}", "•".cyan(), plan.settings.builder, builder_state);
    if outcome.pushed {
        println!("  {} pushed {}", "•".cyan(), plan.image_ref().cyan());
    } else {
        println!("  {} built {} (not pushed)", "•".cyan(), plan.image_ref());
    }
    if let Some(url) = &outcome.test_url {
        println!("  {} smoke test passed ({})", "•".cyan(), url);
    }

    Ok(())
}
