// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Global tracing subscriber.

use std::fs::OpenOptions;
use std::sync::Mutex;

use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::writer::BoxMakeWriter;

use labelwerk_core::config::LoggerConfig;
use labelwerk_core::error::{LabelwerkError, Result};

/// Install the global subscriber. `RUST_LOG`, when set, overrides the
/// configured level.
pub fn init_logging(config: &LoggerConfig) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.level.as_str()));
    let to_stdout = config.destination == "stdout";

    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .with_ansi(to_stdout)
        .with_writer(make_writer(&config.destination)?);

    let installed = match config.format.as_str() {
        "json" => builder.json().try_init(),
        _ => builder.try_init(),
    };
    installed.map_err(|e| LabelwerkError::Config(format!("install logger: {e}")))
}

/// `stdout`, or a file opened for append.
fn make_writer(destination: &str) -> Result<BoxMakeWriter> {
    if destination == "stdout" {
        return Ok(BoxMakeWriter::new(std::io::stdout));
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(destination)
        .map_err(|e| LabelwerkError::Config(format!("open log file {destination}: {e}")))?;
    Ok(BoxMakeWriter::new(Mutex::new(file)))
}
