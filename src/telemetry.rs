//! Tracing subscriber setup for the `worklog` binary.

use std::path::Path;

use anyhow::Result;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::writer::BoxMakeWriter;

const DEFAULT_FILTER: &str = "worklog=info";
const VERBOSE_FILTER: &str = "worklog=debug";

/// How log output should be rendered.
#[derive(Debug, Clone, Default)]
pub struct TelemetryOptions<'a> {
    pub verbose: bool,
    pub json: bool,
    /// Write a daily-rotated log file here instead of stderr.
    pub log_dir: Option<&'a Path>,
}

/// Install the global subscriber. `RUST_LOG` wins over the verbosity flag.
///
/// Keep the returned guard alive for the life of the process when logging to
/// a file, otherwise buffered lines are lost on exit.
pub fn init(options: TelemetryOptions<'_>) -> Result<Option<WorkerGuard>> {
    let fallback = if options.verbose {
        VERBOSE_FILTER
    } else {
        DEFAULT_FILTER
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));

    let (writer, guard) = match options.log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)?;
            let appender = tracing_appender::rolling::daily(dir, "worklog.log");
            let (non_blocking, guard) = tracing_appender::non_blocking(appender);
            (BoxMakeWriter::new(non_blocking), Some(guard))
        }
        None => (BoxMakeWriter::new(std::io::stderr), None),
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_target(true);

    let installed = if options.json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    installed.map_err(|e| anyhow::anyhow!("Failed to install tracing subscriber: {}", e))?;

    Ok(guard)
}
