//! twitch-mcp: launcher for the Twitch MCP server.
//! Resolves layered configuration, keeps the server JAR fresh, then supervises the JVM: config → validate → artifact → launch.

pub mod artifact;
pub mod build_tool;
pub(crate) mod check;
pub mod cli;
pub mod config;
pub mod error;
pub(crate) mod guard;
pub mod paths;
pub mod signals;
pub mod supervisor;

use std::collections::HashMap;
use std::ffi::OsString;
use std::path::Path;

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use tracing_subscriber::EnvFilter;

use artifact::ArtifactBuilder;
use build_tool::Maven;
use cli::Cli;
use config::{Config, ConfigLocator};
use error::ConfigError;
use paths::ProjectLayout;
use supervisor::Supervisor;

/// Create a spinner with a consistent style.
pub(crate) fn spinner(msg: &str) -> ProgressBar {
    let sp = ProgressBar::new_spinner();
    sp.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    sp.set_message(msg.to_string());
    sp.enable_steady_tick(std::time::Duration::from_millis(80));
    sp
}

/// Log to stderr; stdout belongs to the server's protocol stream. `RUST_LOG` overrides the level.
fn init_logging(verbose: bool, quiet: bool) {
    let default = if verbose {
        "twitch_mcp=debug"
    } else if quiet {
        "error"
    } else {
        "twitch_mcp=info"
    };
    let _ = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)),
        )
        .try_init();
}

/// Environment snapshot. Variables that are not valid UTF-8 are skipped.
fn env_snapshot() -> HashMap<String, String> {
    std::env::vars_os()
        .filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?)))
        .collect()
}

/// Run the CLI with parsed arguments. Returns the exit code to finish with.
pub fn run(cli: Cli) -> Result<i32> {
    init_logging(cli.verbose, cli.quiet);

    let cwd = std::env::current_dir().context("failed to determine the working directory")?;
    let env = env_snapshot();
    let locator = ConfigLocator {
        explicit: cli.config.clone(),
        cwd: cwd.clone(),
        default_path: config::default_config_path().ok(),
    };
    let resolution = config::resolve(cli.overrides(), &env, &locator);
    let layout = ProjectLayout::resolve(cli.project_dir.as_deref(), &cwd);

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to start the async runtime")?;

    if cli.check {
        return runtime.block_on(check::report(&resolution, &layout));
    }

    let missing = resolution.config.validate();
    if !missing.is_empty() {
        return Err(ConfigError::MissingFields(missing).into());
    }

    let java = paths::java_executable(env.get("JAVA_HOME").map(Path::new));
    runtime.block_on(launch(
        &resolution.config,
        layout,
        &java,
        &cli.passthrough,
        cli.quiet,
    ))
}

/// Artifact, then child. The JAR is built only when no `jarPath` override is configured.
async fn launch(
    config: &Config,
    layout: ProjectLayout,
    java: &Path,
    passthrough: &[OsString],
    quiet: bool,
) -> Result<i32> {
    let artifact = match &config.jar_path {
        Some(path) => {
            tracing::info!(path = %path.display(), "using configured JAR, skipping build");
            path.clone()
        }
        None => {
            ArtifactBuilder::new(layout, Maven::default())
                .quiet(quiet)
                .ensure_artifact()
                .await?
                .path
        }
    };

    let outcome = Supervisor::new(java)
        .quiet(quiet)
        .launch(&artifact, config, passthrough)
        .await?;
    Ok(outcome.code())
}
