//! CLI argument parsing with clap. Recognized flags feed the argument config layer; everything
//! else is handed to the server untouched.

use clap::Parser;
use std::ffi::OsString;
use std::path::PathBuf;

use crate::config::{PartialConfig, expand_tilde, parse_bool};

#[derive(Parser, Debug)]
#[command(
    name = "twitch-mcp",
    version,
    about = "Launch the Twitch MCP server",
    after_help = "Examples:\n  twitch-mcp --channel mychannel --auth oauth:xxxx --client-id abc --broadcaster-id 123\n  twitch-mcp --config ./twitch.json\n  twitch-mcp --check\n  twitch-mcp -- -Dquarkus.log.level=DEBUG"
)]
pub struct Cli {
    /// Path to config file (default: <config dir>/twitch-mcp/config.json)
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Twitch channel to join
    #[arg(long, value_name = "NAME")]
    pub channel: Option<String>,

    /// OAuth token for the bot account, with or without the `oauth:` prefix
    #[arg(long, value_name = "TOKEN")]
    pub auth: Option<String>,

    /// Twitch application client ID
    #[arg(long, value_name = "ID")]
    pub client_id: Option<String>,

    /// Numeric ID of the broadcaster account
    #[arg(long, value_name = "ID")]
    pub broadcaster_id: Option<String>,

    /// Post a message in chat once connected
    #[arg(
        long,
        value_name = "BOOL",
        num_args = 0..=1,
        default_missing_value = "true",
        value_parser = parse_flag_bool
    )]
    pub show_connection_message: Option<bool>,

    /// Launch this JAR instead of building one
    #[arg(long, value_name = "PATH")]
    pub jar_path: Option<PathBuf>,

    /// Maven project containing pom.xml (default: current directory)
    #[arg(long, value_name = "DIR", env = "TWITCH_MCP_HOME")]
    pub project_dir: Option<PathBuf>,

    /// Resolve and validate configuration, report JAR state, then exit without launching
    #[arg(long)]
    pub check: bool,

    /// Detailed output
    #[arg(short, long, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Suppress non-error output
    #[arg(short, long)]
    pub quiet: bool,

    /// Arguments passed through to the server unchanged
    #[arg(
        value_name = "SERVER_ARGS",
        trailing_var_arg = true,
        allow_hyphen_values = true
    )]
    pub passthrough: Vec<OsString>,
}

impl Cli {
    /// The argument layer of the configuration.
    pub fn overrides(&self) -> PartialConfig {
        let text = |v: &Option<String>| v.clone().filter(|s| !s.is_empty());
        PartialConfig {
            channel: text(&self.channel),
            auth: text(&self.auth),
            client_id: text(&self.client_id),
            broadcaster_id: text(&self.broadcaster_id),
            show_connection_message: self.show_connection_message,
            jar_path: self
                .jar_path
                .as_deref()
                .filter(|p| !p.as_os_str().is_empty())
                .map(expand_tilde),
        }
    }
}

fn parse_flag_bool(raw: &str) -> Result<bool, String> {
    parse_bool(raw).ok_or_else(|| format!("expected true or false, got '{raw}'"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("twitch-mcp").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn flags_become_argument_layer() {
        let cli = parse(&[
            "--channel",
            "foo",
            "--client-id",
            "cid",
            "--show-connection-message",
            "false",
            "--jar-path",
            "/tmp/server.jar",
        ]);
        let layer = cli.overrides();
        assert_eq!(layer.channel.as_deref(), Some("foo"));
        assert_eq!(layer.client_id.as_deref(), Some("cid"));
        assert_eq!(layer.auth, None);
        assert_eq!(layer.show_connection_message, Some(false));
        assert_eq!(layer.jar_path, Some(PathBuf::from("/tmp/server.jar")));
    }

    #[test]
    fn jar_path_flag_expands_tilde() {
        let Some(home) = dirs::home_dir() else {
            return;
        };
        let cli = parse(&["--jar-path", "~/server.jar"]);
        assert_eq!(cli.overrides().jar_path, Some(home.join("server.jar")));
    }

    #[test]
    fn bare_boolean_flag_means_true() {
        let cli = parse(&["--show-connection-message"]);
        assert_eq!(cli.show_connection_message, Some(true));
    }

    #[test]
    fn empty_values_count_as_absent() {
        let cli = parse(&["--channel", ""]);
        assert_eq!(cli.overrides().channel, None);
    }

    #[test]
    fn remaining_arguments_pass_through_in_order() {
        let cli = parse(&["--channel", "foo", "--", "--port", "9000", "-v", "extra"]);
        assert_eq!(
            cli.passthrough,
            ["--port", "9000", "-v", "extra"]
                .iter()
                .map(OsString::from)
                .collect::<Vec<_>>()
        );
        assert!(!cli.verbose);
    }

    #[test]
    fn positional_starts_passthrough() {
        let cli = parse(&["--quiet", "serve", "--flag"]);
        assert!(cli.quiet);
        assert_eq!(
            cli.passthrough,
            vec![OsString::from("serve"), OsString::from("--flag")]
        );
    }

    #[test]
    fn invalid_boolean_is_rejected() {
        let result = Cli::try_parse_from(["twitch-mcp", "--show-connection-message", "sometimes"]);
        assert!(result.is_err());
    }
}
