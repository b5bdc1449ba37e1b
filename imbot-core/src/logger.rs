//! Tracing initialization: console and log file share the same fmt layer (level, target, span, fields).
//!
//! Without `RUST_LOG`, the workspace crates log at `info` and dependencies (HTTP client, OpenAI
//! client, runtime) only at `warn`.

use std::fs::OpenOptions;
use std::io;
use std::path::Path;
use std::sync::Arc;

use tracing_subscriber::{
    fmt::format::FmtSpan,
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Registry,
};

/// Crates whose events pass the default filter at `info`.
pub const WORKSPACE_CRATES: [&str; 4] = ["imbot_core", "imbot_wechat", "cosmos_dispatcher", "cosmos"];

/// Filter directives used when `RUST_LOG` is unset: `warn` globally, `level` for the workspace.
pub fn default_directives(level: &str) -> String {
    std::iter::once("warn".to_string())
        .chain(WORKSPACE_CRATES.iter().map(|krate| format!("{}={}", krate, level)))
        .collect::<Vec<_>>()
        .join(",")
}

/// Installs the global tracing subscriber, writing every event to stdout and to `log_file_path`.
///
/// The level comes from `RUST_LOG` (default: [`default_directives`] at `info`). Load `.env` before calling this or
/// `RUST_LOG` from the file is not seen. Parent directories of the log file are created.
pub fn init_tracing(log_file_path: &str) -> anyhow::Result<()> {
    if let Some(parent) = Path::new(log_file_path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_file_path)?;
    let file = Arc::new(file);

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives("info")));

    use tracing_subscriber::fmt::writer::MakeWriterExt;
    let writer = io::stdout.and(file);

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_writer(writer)
        .with_span_events(FmtSpan::CLOSE)
        .with_target(true)
        .with_thread_ids(true)
        .with_level(true)
        .with_file(false)
        .with_line_number(false);

    Registry::default()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to set global subscriber: {}", e))?;

    Ok(())
}
