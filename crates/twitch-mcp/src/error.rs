//! Error taxonomy for the launcher. Each stage has its own enum; `run()` wraps them in `anyhow`.

use std::path::PathBuf;
use std::process::ExitStatus;

use thiserror::Error;

use crate::config::Field;

/// Configuration could not be turned into something launchable.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required configuration:{}", describe_fields(.0))]
    MissingFields(Vec<Field>),
}

/// One line per field, naming every place it can be supplied.
fn describe_fields(fields: &[Field]) -> String {
    fields
        .iter()
        .map(|field| match field.env_var() {
            Some(var) => format!(
                "\n  - {field} ({}, {var}, or \"{field}\" in the config file)",
                field.flag()
            ),
            None => format!("\n  - {field} ({})", field.flag()),
        })
        .collect()
}

/// The optional config file could not be used. Never fatal: the file layer becomes empty.
#[derive(Debug, Error)]
pub enum ConfigFileError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("config file {path} must contain a table of settings at the top level")]
    NotATable { path: PathBuf },
}

/// Failures while making sure the server JAR exists and is fresh.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("{tool} not found; install it (Maven 3.6.2+) or put it on PATH")]
    BuildToolMissing { tool: String },

    #[error("{tool} build failed ({status})\n{diagnostics}")]
    BuildFailed {
        tool: String,
        status: ExitStatus,
        diagnostics: String,
    },

    #[error("build finished but no JAR was found in {}", .dir.display())]
    NoArtifactProduced { dir: PathBuf },

    #[error("I/O error at {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Failures before the child process is running.
#[derive(Debug, Error)]
pub enum LaunchError {
    #[error("JAR file not found: {}", .path.display())]
    ArtifactMissing { path: PathBuf },

    #[error("failed to launch {}: {source}", .program.display())]
    LaunchFailed {
        program: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to subscribe to termination signals: {0}")]
    Signals(#[source] std::io::Error),

    #[error("failed to wait for the server process: {0}")]
    Wait(#[source] std::io::Error),
}
