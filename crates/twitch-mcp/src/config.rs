//! Layered configuration: environment, optional JSON/TOML file, and command-line arguments.
//!
//! Each source yields a [`PartialConfig`]. [`Layers::merge`] picks, per field, the value from the
//! highest-precedence source that explicitly provided it (`Arguments > File > Environment`).

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::error::ConfigFileError;

/// A logical configuration field, independent of how a source spells it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Channel,
    Auth,
    ClientId,
    BroadcasterId,
    ShowConnectionMessage,
    JarPath,
}

impl Field {
    pub const ALL: [Field; 6] = [
        Field::Channel,
        Field::Auth,
        Field::ClientId,
        Field::BroadcasterId,
        Field::ShowConnectionMessage,
        Field::JarPath,
    ];

    /// Fields the server cannot start without, in reporting order.
    pub const REQUIRED: [Field; 4] = [
        Field::Channel,
        Field::Auth,
        Field::ClientId,
        Field::BroadcasterId,
    ];

    /// Canonical (camel-case) name.
    pub fn name(self) -> &'static str {
        match self {
            Field::Channel => "channel",
            Field::Auth => "auth",
            Field::ClientId => "clientId",
            Field::BroadcasterId => "broadcasterId",
            Field::ShowConnectionMessage => "showConnectionMessage",
            Field::JarPath => "jarPath",
        }
    }

    /// Environment variable read by the launcher and exported to the server.
    pub fn env_var(self) -> Option<&'static str> {
        match self {
            Field::Channel => Some("TWITCH_CHANNEL"),
            Field::Auth => Some("TWITCH_AUTH"),
            Field::ClientId => Some("TWITCH_CLIENT_ID"),
            Field::BroadcasterId => Some("TWITCH_BROADCASTER_ID"),
            Field::ShowConnectionMessage => Some("TWITCH_SHOW_CONNECTION_MESSAGE"),
            Field::JarPath => None,
        }
    }

    /// Command-line flag that sets this field.
    pub fn flag(self) -> &'static str {
        match self {
            Field::Channel => "--channel",
            Field::Auth => "--auth",
            Field::ClientId => "--client-id",
            Field::BroadcasterId => "--broadcaster-id",
            Field::ShowConnectionMessage => "--show-connection-message",
            Field::JarPath => "--jar-path",
        }
    }

    /// Keys accepted in the config file, checked in order.
    fn file_keys(self) -> &'static [&'static str] {
        match self {
            Field::Channel => &["channel", "twitchChannel", "twitch_channel", "TWITCH_CHANNEL"],
            Field::Auth => &["auth", "twitchAuth", "twitch_auth", "TWITCH_AUTH"],
            Field::ClientId => &["clientId", "client_id", "TWITCH_CLIENT_ID"],
            Field::BroadcasterId => &["broadcasterId", "broadcaster_id", "TWITCH_BROADCASTER_ID"],
            Field::ShowConnectionMessage => &[
                "showConnectionMessage",
                "show_connection_message",
                "TWITCH_SHOW_CONNECTION_MESSAGE",
            ],
            Field::JarPath => &["jarPath", "jar_path", "JAR_PATH"],
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Where a configuration value came from. Later variants win.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ConfigSource {
    Environment,
    File,
    Arguments,
}

impl fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigSource::Environment => write!(f, "environment"),
            ConfigSource::File => write!(f, "config file"),
            ConfigSource::Arguments => write!(f, "arguments"),
        }
    }
}

/// Values contributed by a single source. `None` means "not provided"; empty strings never
/// make it in here.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PartialConfig {
    pub channel: Option<String>,
    pub auth: Option<String>,
    pub client_id: Option<String>,
    pub broadcaster_id: Option<String>,
    pub show_connection_message: Option<bool>,
    pub jar_path: Option<PathBuf>,
}

impl PartialConfig {
    /// Read the `TWITCH_*` variables from an environment snapshot.
    pub fn from_env(env: &HashMap<String, String>) -> Self {
        let text = |field: Field| {
            field
                .env_var()
                .and_then(|var| env.get(var))
                .and_then(|v| non_empty(v.clone()))
        };

        let show_connection_message = Field::ShowConnectionMessage
            .env_var()
            .and_then(|var| env.get(var).map(|raw| (var, raw)))
            .and_then(|(var, raw)| {
                let parsed = parse_bool(raw);
                if parsed.is_none() && !raw.is_empty() {
                    warn!("ignoring {var}={raw:?}: expected true or false");
                }
                parsed
            });

        Self {
            channel: text(Field::Channel),
            auth: text(Field::Auth),
            client_id: text(Field::ClientId),
            broadcaster_id: text(Field::BroadcasterId),
            show_connection_message,
            jar_path: None,
        }
    }

    /// Normalize a parsed config document, accepting every alias spelling of each field.
    pub fn from_document(doc: &Map<String, Value>) -> Self {
        let text = |field: Field| {
            field
                .file_keys()
                .iter()
                .find_map(|key| doc.get(*key).and_then(value_as_text))
        };
        let show_connection_message = Field::ShowConnectionMessage
            .file_keys()
            .iter()
            .find_map(|key| doc.get(*key).and_then(value_as_bool));

        Self {
            channel: text(Field::Channel),
            auth: text(Field::Auth),
            client_id: text(Field::ClientId),
            broadcaster_id: text(Field::BroadcasterId),
            show_connection_message,
            jar_path: text(Field::JarPath).map(|p| expand_tilde(Path::new(&p))),
        }
    }

    fn provides(&self, field: Field) -> bool {
        match field {
            Field::Channel => self.channel.is_some(),
            Field::Auth => self.auth.is_some(),
            Field::ClientId => self.client_id.is_some(),
            Field::BroadcasterId => self.broadcaster_id.is_some(),
            Field::ShowConnectionMessage => self.show_connection_message.is_some(),
            Field::JarPath => self.jar_path.is_some(),
        }
    }

    /// Fill every field this layer leaves unset from `lower`.
    pub fn or(self, lower: PartialConfig) -> PartialConfig {
        PartialConfig {
            channel: self.channel.or(lower.channel),
            auth: self.auth.or(lower.auth),
            client_id: self.client_id.or(lower.client_id),
            broadcaster_id: self.broadcaster_id.or(lower.broadcaster_id),
            show_connection_message: self
                .show_connection_message
                .or(lower.show_connection_message),
            jar_path: self.jar_path.or(lower.jar_path),
        }
    }
}

/// Fully merged configuration handed to the artifact builder and the supervisor.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Config {
    pub channel: String,
    pub auth: String,
    pub client_id: String,
    pub broadcaster_id: String,
    pub show_connection_message: Option<bool>,
    pub jar_path: Option<PathBuf>,
}

impl From<PartialConfig> for Config {
    fn from(p: PartialConfig) -> Self {
        Self {
            channel: p.channel.unwrap_or_default(),
            auth: p.auth.unwrap_or_default(),
            client_id: p.client_id.unwrap_or_default(),
            broadcaster_id: p.broadcaster_id.unwrap_or_default(),
            show_connection_message: p.show_connection_message,
            jar_path: p.jar_path,
        }
    }
}

impl Config {
    /// Required fields still empty after the merge. Empty result means the config is usable.
    pub fn validate(&self) -> Vec<Field> {
        Field::REQUIRED
            .into_iter()
            .filter(|field| match field {
                Field::Channel => self.channel.is_empty(),
                Field::Auth => self.auth.is_empty(),
                Field::ClientId => self.client_id.is_empty(),
                Field::BroadcasterId => self.broadcaster_id.is_empty(),
                _ => false,
            })
            .collect()
    }

    /// The auth token as the chat connection expects it, always with the `oauth:` prefix.
    pub fn irc_token(&self) -> String {
        if self.auth.starts_with("oauth:") {
            self.auth.clone()
        } else {
            format!("oauth:{}", self.auth)
        }
    }

    /// Variables the server must not inherit from the launcher's environment: those of optional
    /// fields that resolved to nothing.
    pub fn cleared_env(&self) -> Vec<&'static str> {
        match self.show_connection_message {
            Some(_) => Vec::new(),
            None => vec!["TWITCH_SHOW_CONNECTION_MESSAGE"],
        }
    }

    /// Environment variables that carry this config into the server process.
    pub fn runtime_env(&self) -> Vec<(&'static str, String)> {
        let mut vars = vec![
            ("TWITCH_CHANNEL", self.channel.clone()),
            ("TWITCH_AUTH", self.irc_token()),
            ("TWITCH_CLIENT_ID", self.client_id.clone()),
            ("TWITCH_BROADCASTER_ID", self.broadcaster_id.clone()),
        ];
        if let Some(show) = self.show_connection_message {
            vars.push(("TWITCH_SHOW_CONNECTION_MESSAGE", show.to_string()));
        }
        vars
    }
}

/// The three partial configurations, kept apart so provenance can be reported.
#[derive(Debug, Clone, Default)]
pub struct Layers {
    pub arguments: PartialConfig,
    pub file: PartialConfig,
    pub environment: PartialConfig,
}

impl Layers {
    pub fn merge(&self) -> Config {
        self.arguments
            .clone()
            .or(self.file.clone())
            .or(self.environment.clone())
            .into()
    }

    /// Which source the merged value of `field` came from, if any.
    pub fn origin(&self, field: Field) -> Option<ConfigSource> {
        [
            (ConfigSource::Arguments, &self.arguments),
            (ConfigSource::File, &self.file),
            (ConfigSource::Environment, &self.environment),
        ]
        .into_iter()
        .find(|(_, layer)| layer.provides(field))
        .map(|(source, _)| source)
    }
}

/// Decides which config file, if any, feeds the file layer.
#[derive(Debug, Clone)]
pub struct ConfigLocator {
    pub explicit: Option<PathBuf>,
    pub cwd: PathBuf,
    pub default_path: Option<PathBuf>,
}

impl ConfigLocator {
    /// An explicit path is used only if it exists; otherwise the platform default is tried.
    pub fn locate(&self) -> Option<PathBuf> {
        if let Some(explicit) = &self.explicit {
            let explicit = expand_tilde(explicit);
            let absolute = if explicit.is_absolute() {
                explicit
            } else {
                self.cwd.join(explicit)
            };
            if absolute.is_file() {
                return Some(absolute);
            }
            warn!(
                "config file {} does not exist, falling back to the default location",
                absolute.display()
            );
        }

        self.default_path.clone().filter(|p| p.is_file())
    }
}

/// Outcome of [`resolve`]: the merged config plus what went into it.
#[derive(Debug, Clone)]
pub struct Resolution {
    pub config: Config,
    pub layers: Layers,
    pub file: Option<PathBuf>,
}

/// Collect all three layers and merge them.
pub fn resolve(
    arguments: PartialConfig,
    env: &HashMap<String, String>,
    locator: &ConfigLocator,
) -> Resolution {
    let environment = PartialConfig::from_env(env);

    let file = locator.locate();
    let file_layer = match &file {
        Some(path) => load_file(path).unwrap_or_else(|e| {
            warn!("{e}; continuing without it");
            PartialConfig::default()
        }),
        None => {
            debug!("no config file found");
            PartialConfig::default()
        }
    };

    let layers = Layers {
        arguments,
        file: file_layer,
        environment,
    };
    Resolution {
        config: layers.merge(),
        layers,
        file,
    }
}

/// Parse a config file. `.toml` files are read as TOML, everything else as JSON.
pub fn load_file(path: &Path) -> std::result::Result<PartialConfig, ConfigFileError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigFileError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    let parse_error = |message: String| ConfigFileError::Parse {
        path: path.to_path_buf(),
        message,
    };
    let document: Value = if path.extension().is_some_and(|ext| ext == "toml") {
        let table: toml::Table = toml::from_str(&content).map_err(|e| parse_error(e.to_string()))?;
        serde_json::to_value(table).map_err(|e| parse_error(e.to_string()))?
    } else {
        serde_json::from_str(&content).map_err(|e| parse_error(e.to_string()))?
    };

    match document {
        Value::Object(map) => {
            debug!("loaded config file {}", path.display());
            let mut layer = PartialConfig::from_document(&map);
            if let (Some(jar), Some(dir)) = (&layer.jar_path, path.parent()) {
                layer.jar_path = Some(dir.join(jar));
            }
            Ok(layer)
        }
        _ => Err(ConfigFileError::NotATable {
            path: path.to_path_buf(),
        }),
    }
}

/// Default config file path: `<config dir>/twitch-mcp/config.json`.
///
/// `%APPDATA%` on Windows, `~/Library/Application Support` on macOS, `$XDG_CONFIG_HOME` or
/// `~/.config` elsewhere.
pub fn default_config_path() -> Result<PathBuf> {
    Ok(dirs::config_dir()
        .context("could not determine the user configuration directory")?
        .join("twitch-mcp")
        .join("config.json"))
}

/// Expand `~` prefix to the user's home directory. Paths without one, or with no home, are
/// returned unchanged.
pub fn expand_tilde(path: &Path) -> PathBuf {
    match (path.strip_prefix("~"), dirs::home_dir()) {
        (Ok(stripped), Some(home)) => home.join(stripped),
        _ => path.to_path_buf(),
    }
}

/// Lenient boolean parsing shared by the environment, file and argument layers.
pub fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn non_empty(s: String) -> Option<String> {
    (!s.is_empty()).then_some(s)
}

fn value_as_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => non_empty(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn value_as_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::String(s) => parse_bool(s),
        _ => None,
    }
}
