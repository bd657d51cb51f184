//! `--check`: report where each setting comes from and whether the JAR needs a rebuild, without
//! building or launching anything.

use anyhow::Result;
use console::style;

use crate::artifact::{ArtifactBuilder, Freshness};
use crate::build_tool::{BuildTool, Maven};
use crate::config::{Config, Field, Resolution};
use crate::paths::ProjectLayout;

/// Print the report. Exit code 0 when the configuration is launchable, 1 otherwise.
pub async fn report(resolution: &Resolution, layout: &ProjectLayout) -> Result<i32> {
    println!("{}", style("Checking configuration...").bold());
    let config_issues = check_config(resolution);

    println!("{}", style("Checking server JAR...").bold());
    let artifact_issues = match &resolution.config.jar_path {
        Some(path) => check_override(path),
        None => check_artifact(ArtifactBuilder::new(layout.clone(), Maven::default())).await,
    };

    println!();
    if config_issues == 0 && artifact_issues == 0 {
        println!("{}", style("Ready to launch.").green().bold());
    } else {
        println!(
            "{}",
            style(format!(
                "Found {} issue(s).",
                config_issues + artifact_issues
            ))
            .yellow()
            .bold()
        );
    }

    Ok(if config_issues == 0 && artifact_issues == 0 {
        0
    } else {
        1
    })
}

fn check_config(resolution: &Resolution) -> usize {
    match &resolution.file {
        Some(path) => println!("  config file: {}", path.display()),
        None => println!("  config file: {}", style("(none)").dim()),
    }

    let config = &resolution.config;
    for field in Field::ALL {
        match resolution.layers.origin(field) {
            Some(source) => println!(
                "  {} {:<22} {:<28} from {}",
                style("ok").green(),
                field.name(),
                display_value(config, field),
                source
            ),
            None if Field::REQUIRED.contains(&field) => {
                println!("  {} {:<22} missing", style("x").red(), field.name());
            }
            None => println!(
                "  {} {:<22} {}",
                style("-").dim(),
                field.name(),
                style("not set").dim()
            ),
        }
    }

    config.validate().len()
}

/// Printable value; the auth token is never shown.
fn display_value(config: &Config, field: Field) -> String {
    match field {
        Field::Channel => config.channel.clone(),
        Field::Auth => "********".to_string(),
        Field::ClientId => config.client_id.clone(),
        Field::BroadcasterId => config.broadcaster_id.clone(),
        Field::ShowConnectionMessage => config
            .show_connection_message
            .map(|b| b.to_string())
            .unwrap_or_default(),
        Field::JarPath => config
            .jar_path
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_default(),
    }
}

fn check_override(path: &std::path::Path) -> usize {
    if path.is_file() {
        println!("  {} using configured JAR {}", style("ok").green(), path.display());
        0
    } else {
        println!(
            "  {} configured JAR does not exist: {}",
            style("x").red(),
            path.display()
        );
        1
    }
}

async fn check_artifact<T: BuildTool>(builder: ArtifactBuilder<T>) -> usize {
    let freshness = match builder.freshness().await {
        Ok(f) => f,
        Err(e) => {
            println!("  {} {e}", style("x").red());
            return 1;
        }
    };

    match freshness {
        Freshness::Fresh(artifact) => {
            println!(
                "  {} JAR is up to date: {}",
                style("ok").green(),
                artifact.path.display()
            );
            return 0;
        }
        Freshness::Stale(artifact) => println!(
            "  {} JAR is older than {}, it will be rebuilt: {}",
            style("!").yellow(),
            builder.layout().descriptor.display(),
            artifact.path.display()
        ),
        Freshness::Missing => println!(
            "  {} no JAR at {}, it will be built on launch",
            style("!").yellow(),
            builder.layout().artifact.display()
        ),
    }

    // A rebuild is pending; it can only happen if the build tool is installed.
    if builder.tool().probe().await {
        println!("  {} {} available", style("ok").green(), builder.tool().name());
        0
    } else {
        println!(
            "  {} {} not found, the JAR cannot be built",
            style("x").red(),
            builder.tool().name()
        );
        1
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::build_tool::BuildOutput;
    use crate::config::{Layers, PartialConfig};
    use std::io;
    use std::path::{Path, PathBuf};
    use tempfile::TempDir;

    struct Tool(bool);

    impl BuildTool for Tool {
        fn name(&self) -> &str {
            "tool"
        }

        async fn probe(&self) -> bool {
            self.0
        }

        async fn package(&self, _root: &Path) -> io::Result<BuildOutput> {
            Err(io::Error::other("not used"))
        }
    }

    fn resolution(arguments: PartialConfig) -> Resolution {
        let layers = Layers {
            arguments,
            ..Default::default()
        };
        Resolution {
            config: layers.merge(),
            layers,
            file: None,
        }
    }

    #[test]
    fn config_issues_count_missing_required_fields() {
        let res = resolution(PartialConfig {
            channel: Some("c".into()),
            auth: Some("a".into()),
            ..Default::default()
        });
        assert_eq!(check_config(&res), 2);
    }

    #[test]
    fn auth_is_masked() {
        let config = Config {
            auth: "secret".into(),
            ..Default::default()
        };
        assert!(!display_value(&config, Field::Auth).contains("secret"));
    }

    #[test]
    fn override_must_exist() {
        let dir = TempDir::new().unwrap();
        let jar = dir.path().join("server.jar");
        assert_eq!(check_override(&jar), 1);
        std::fs::write(&jar, "jar").unwrap();
        assert_eq!(check_override(&jar), 0);
    }

    #[tokio::test]
    async fn missing_artifact_needs_build_tool() {
        let dir = TempDir::new().unwrap();
        let layout = ProjectLayout::new(dir.path());
        std::fs::write(&layout.descriptor, "<project/>").unwrap();

        assert_eq!(
            check_artifact(ArtifactBuilder::new(layout.clone(), Tool(true))).await,
            0
        );
        assert_eq!(
            check_artifact(ArtifactBuilder::new(layout, Tool(false))).await,
            1
        );
    }

    #[tokio::test]
    async fn missing_descriptor_is_an_issue() {
        let layout = ProjectLayout::new(PathBuf::from("/nonexistent/project"));
        assert_eq!(
            check_artifact(ArtifactBuilder::new(layout, Tool(true))).await,
            1
        );
    }
}
