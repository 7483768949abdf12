use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use std::process::Command;

/// Render the placeholder page for $PORT, then exec the web server
#[derive(Parser)]
#[command(name = "pageship-entry", version)]
struct Args {
    /// Page template containing the {{PORT}} placeholder
    #[arg(long, default_value = "/usr/share/pageship/index.html.template")]
    template: PathBuf,

    /// Where the web server serves the page from
    #[arg(long, default_value = "/usr/share/nginx/html/index.html")]
    output: PathBuf,

    /// Server config template; skipped when the file does not exist
    #[arg(long, default_value = "/usr/share/pageship/default.conf.template")]
    server_template: PathBuf,

    /// Rendered server config location
    #[arg(long, default_value = "/etc/nginx/conf.d/default.conf")]
    server_config: PathBuf,

    /// Server command to run in the foreground (after `--`)
    #[arg(last = true, default_values = ["nginx", "-g", "daemon off;"])]
    command: Vec<String>,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let port = pageship_entry::port_from_env()?;
    tracing::info!(port, "rendering placeholder page");

    pageship_entry::render_file(&args.template, &args.output, port)
        .context("failed to render page template")?;

    if args.server_template.exists() {
        let ipv6 = pageship_entry::ipv6_available();
        if !ipv6 {
            tracing::info!("IPv6 not available, listening on IPv4 only");
        }
        pageship_entry::render_server_config(
            &args.server_template,
            &args.server_config,
            port,
            ipv6,
        )
        .context("failed to render server config template")?;
    }

    let (program, rest) = args
        .command
        .split_first()
        .ok_or_else(|| anyhow::anyhow!("no server command given"))?;

    tracing::info!(command = %args.command.join(" "), "starting web server");
    let mut cmd = Command::new(program);
    cmd.args(rest);
    exec(cmd).with_context(|| format!("failed to start {}", program))
}

/// Replace this process with the server so it receives container signals
#[cfg(unix)]
fn exec(mut cmd: Command) -> anyhow::Result<()> {
    use std::os::unix::process::CommandExt;
    // exec only returns on failure
    Err(cmd.exec().into())
}

#[cfg(not(unix))]
fn exec(mut cmd: Command) -> anyhow::Result<()> {
    let status = cmd.status()?;
    if !status.success() {
        anyhow::bail!("server exited with {}", status);
    }
    Ok(())
}
