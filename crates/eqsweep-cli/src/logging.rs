use crate::error::{CliError, Result};
use std::fs::File;
use std::path::PathBuf;
use tracing_subscriber::{
    filter::LevelFilter,
    fmt::{self},
    prelude::*,
};

/// Installs the global subscriber: a compact stderr layer filtered by
/// verbosity, plus an optional unfiltered file layer for long batch runs.
///
/// A batch tool is chatty by default: level 0 already shows INFO so the
/// periodic batch statistics reach the console without any flag.
pub fn setup_logging(verbosity: u8, quiet: bool, log_file: Option<PathBuf>) -> Result<()> {
    let level_filter = if quiet {
        LevelFilter::ERROR
    } else {
        match verbosity {
            0 => LevelFilter::INFO,
            1 => LevelFilter::DEBUG,
            _ => LevelFilter::TRACE,
        }
    };

    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(true)
        .with_target(false)
        .compact()
        .with_filter(level_filter);

    let registry = tracing_subscriber::registry().with(stderr_layer);

    if let Some(path) = log_file {
        let file = File::create(&path).map_err(CliError::Io)?;
        // The file layer keeps everything down to DEBUG regardless of the
        // console verbosity, so a finished overnight run can be audited.
        let file_layer = fmt::layer()
            .with_writer(file)
            .with_ansi(false)
            .with_target(true)
            .with_filter(LevelFilter::DEBUG);
        registry.with(file_layer).init();
    } else {
        registry.init();
    }

    Ok(())
}
