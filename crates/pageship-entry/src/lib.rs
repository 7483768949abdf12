//! Container entry process for the pageship placeholder page
//!
//! Runs once per container start: resolve the port from `PORT`, substitute
//! it into the page (and optionally the server config) templates, then hand
//! the process over to the web server.

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Literal token replaced with the port in every template
pub const PLACEHOLDER: &str = "{{PORT}}";

/// Environment variable carrying the port
pub const PORT_ENV: &str = "PORT";

pub const DEFAULT_PORT: u16 = 80;

/// Present only when the kernel has IPv6 enabled
const IF_INET6: &str = "/proc/net/if_inet6";

#[derive(Error, Debug)]
pub enum EntryError {
    #[error("PORT='{0}' is not a valid port number (1-65535)")]
    InvalidPort(String),

    #[error("template not found: {}", .0.display())]
    TemplateNotFound(PathBuf),

    #[error("failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, EntryError>;

/// Port from the raw `PORT` value. Unset or blank means [`DEFAULT_PORT`].
pub fn resolve_port(value: Option<&str>) -> Result<u16> {
    let value = match value.map(str::trim) {
        None | Some("") => return Ok(DEFAULT_PORT),
        Some(v) => v,
    };

    match value.parse::<u16>() {
        Ok(0) | Err(_) => Err(EntryError::InvalidPort(value.to_string())),
        Ok(port) => Ok(port),
    }
}

/// Port from the process environment
pub fn port_from_env() -> Result<u16> {
    let value = std::env::var(PORT_ENV).ok();
    resolve_port(value.as_deref())
}

/// Replace every occurrence of [`PLACEHOLDER`] with `port`
pub fn render(template: &str, port: u16) -> String {
    template.replace(PLACEHOLDER, &port.to_string())
}

/// Render `template` into `output`, creating parent directories as needed.
/// Returns the number of substitutions made.
pub fn render_file(template: &Path, output: &Path, port: u16) -> Result<usize> {
    write_rendered(template, output, port, |rendered| rendered)
}

/// Render the server config template. Without IPv6 on the host, `[::]`
/// listen directives are dropped so the server can still bind.
pub fn render_server_config(
    template: &Path,
    output: &Path,
    port: u16,
    ipv6: bool,
) -> Result<usize> {
    write_rendered(template, output, port, |rendered| {
        if ipv6 {
            rendered
        } else {
            strip_ipv6_listen(&rendered)
        }
    })
}

/// Drop `listen [::]:...` lines from a server config
pub fn strip_ipv6_listen(config: &str) -> String {
    config
        .lines()
        .filter(|line| {
            let line = line.trim_start();
            !(line.starts_with("listen") && line.contains("[::]"))
        })
        .map(|line| format!("{}\n", line))
        .collect()
}

/// Whether the kernel exposes any IPv6 interface
pub fn ipv6_available() -> bool {
    Path::new(IF_INET6).exists()
}

fn write_rendered<F>(template: &Path, output: &Path, port: u16, finish: F) -> Result<usize>
where
    F: FnOnce(String) -> String,
{
    if !template.exists() {
        return Err(EntryError::TemplateNotFound(template.to_path_buf()));
    }
    let content = std::fs::read_to_string(template)?;
    let count = content.matches(PLACEHOLDER).count();

    if let Some(parent) = output.parent() {
        std::fs::create_dir_all(parent).map_err(|source| EntryError::Write {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    let rendered = finish(render(&content, port));
    std::fs::write(output, rendered).map_err(|source| EntryError::Write {
        path: output.to_path_buf(),
        source,
    })?;

    tracing::debug!(
        template = %template.display(),
        output = %output.display(),
        count,
        "rendered template"
    );
    Ok(count)
}
