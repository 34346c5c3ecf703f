use log::warn;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use toml::{Table, Value};
use url::Url;

use crate::error::Error;

const DEFAULT_MAX_RESPONSE_TIME: Duration = Duration::from_secs(60);
const DEFAULT_MONITOR_INTERVAL: Duration = Duration::from_secs(180);
const DEFAULT_DISABLE_INTERVAL: Duration = Duration::from_secs(3600);
const DEFAULT_LOG_INTERVAL: Duration = Duration::from_secs(3600);
const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(300);

/// Everything the process needs, built once at startup and handed to the
/// supervisor by value. Nothing here is mutated after loading.
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub monitor: MonitorSettings,
    pub alert: AlertSettings,
    pub mail: MailSettings,
    pub targets: Vec<Target>,
}

/// Pacing knobs for the per-target monitor loops.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonitorSettings {
    /// Probe deadline; a slower response counts as a failure.
    pub max_response_time: Duration,
    /// Pause between probes of a healthy target.
    pub monitor_interval: Duration,
    /// Cooldown after an alert, during which the target is not probed.
    pub disable_interval: Duration,
    /// Cadence for logging and resetting the response-time stats window.
    pub log_interval: Duration,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            max_response_time: DEFAULT_MAX_RESPONSE_TIME,
            monitor_interval: DEFAULT_MONITOR_INTERVAL,
            disable_interval: DEFAULT_DISABLE_INTERVAL,
            log_interval: DEFAULT_LOG_INTERVAL,
        }
    }
}

/// Side-effect configuration for alert handling.
#[derive(Debug, Clone)]
pub struct AlertSettings {
    /// Diagnostic command to run on failure; receives host and pid owner
    /// as its two arguments.
    pub shell_command: Option<String>,
    /// Hard cap on the diagnostic command's runtime.
    pub command_timeout: Duration,
    /// Optional webhook that receives the failure message as JSON.
    pub webhook_url: Option<String>,
}

impl Default for AlertSettings {
    fn default() -> Self {
        Self {
            shell_command: None,
            command_timeout: DEFAULT_COMMAND_TIMEOUT,
            webhook_url: None,
        }
    }
}

/// SMTP settings for alert mail. Mail is disabled while `to` is empty.
#[derive(Debug, Clone)]
pub struct MailSettings {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub from: Option<String>,
    pub to: Vec<String>,
}

impl Default for MailSettings {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 25,
            username: None,
            password: None,
            from: None,
            to: Vec::new(),
        }
    }
}

/// One endpoint to be monitored. Immutable after loading; each target is
/// owned by exactly one monitor for the process lifetime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    /// Display name, also handed to the diagnostic command.
    pub host: String,
    /// Fully-qualified http(s) endpoint.
    pub url: Url,
    /// HTTP basic-auth user.
    pub user: Option<String>,
    /// HTTP basic-auth password.
    pub password: Option<String>,
    /// Process-owner context for the diagnostic command.
    pub pid_owner: Option<String>,
}

impl Target {
    /// Builds a target, validating that `url` parses and is http(s).
    pub fn new(host: impl Into<String>, url: &str) -> Result<Self, Error> {
        let url = Url::parse(url)?;
        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(Error::Config(format!(
                "target URL must be http or https: {url}"
            )));
        }
        Ok(Self {
            host: host.into(),
            url,
            user: None,
            password: None,
            pid_owner: None,
        })
    }

    pub fn with_basic_auth(
        mut self,
        user: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.user = Some(user.into());
        self.password = Some(password.into());
        self
    }

    pub fn with_pid_owner(mut self, pid_owner: impl Into<String>) -> Self {
        self.pid_owner = Some(pid_owner.into());
        self
    }
}

impl Config {
    /// Reads and parses the configuration file.
    ///
    /// Only an unreadable file or one that is not TOML at all is an error.
    /// Individual bad values and malformed targets inside a parseable file
    /// are logged and skipped, keeping their defaults.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Config, Error> {
        let content = fs::read_to_string(path)?;
        let table: Table = content.parse()?;
        Ok(Self::from_table(&table))
    }

    /// Default config location when `--config` is not given.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("webmon").join("webmon.toml"))
    }

    fn from_table(table: &Table) -> Config {
        let monitor = section(table, "monitor")
            .map(MonitorSettings::from_table)
            .unwrap_or_default();
        let alert = section(table, "alert")
            .map(AlertSettings::from_table)
            .unwrap_or_default();
        let mail = section(table, "mail")
            .map(MailSettings::from_table)
            .unwrap_or_default()
            .with_env_credentials();

        let targets = match table.get("targets") {
            None => Vec::new(),
            Some(Value::Array(entries)) => entries.iter().filter_map(parse_target).collect(),
            Some(other) => {
                warn!("Ignoring targets: expected an array of tables, got {other}");
                Vec::new()
            }
        };

        Config {
            monitor,
            alert,
            mail,
            targets,
        }
    }
}

impl MonitorSettings {
    fn from_table(table: &Table) -> Self {
        let defaults = Self::default();
        Self {
            max_response_time: seconds_value(table, "max_response_time_secs")
                .unwrap_or(defaults.max_response_time),
            monitor_interval: seconds_value(table, "monitor_interval_secs")
                .unwrap_or(defaults.monitor_interval),
            disable_interval: seconds_value(table, "disable_interval_secs")
                .unwrap_or(defaults.disable_interval),
            log_interval: seconds_value(table, "log_interval_secs")
                .unwrap_or(defaults.log_interval),
        }
    }
}

impl AlertSettings {
    fn from_table(table: &Table) -> Self {
        let defaults = Self::default();
        Self {
            shell_command: str_value(table, "shell_command"),
            command_timeout: seconds_value(table, "command_timeout_secs")
                .unwrap_or(defaults.command_timeout),
            webhook_url: str_value(table, "webhook_url"),
        }
    }
}

impl MailSettings {
    fn from_table(table: &Table) -> Self {
        let defaults = Self::default();
        Self {
            host: str_value(table, "host").unwrap_or(defaults.host),
            port: port_value(table, "port").unwrap_or(defaults.port),
            username: str_value(table, "username"),
            password: str_value(table, "password"),
            from: str_value(table, "from"),
            to: str_list_value(table, "to"),
        }
    }

    // SMTP credentials may be kept out of the config file and supplied via
    // the environment (or a .env file) instead.
    fn with_env_credentials(mut self) -> Self {
        if self.username.is_none() {
            self.username = dotenvy::var("WEBMON_MAIL_USERNAME").ok();
        }
        if self.password.is_none() {
            self.password = dotenvy::var("WEBMON_MAIL_PASSWORD").ok();
        }
        self
    }
}

fn section<'a>(table: &'a Table, name: &str) -> Option<&'a Table> {
    match table.get(name) {
        None => None,
        Some(Value::Table(section)) => Some(section),
        Some(other) => {
            warn!("Ignoring config section {name}: expected a table, got {other}");
            None
        }
    }
}

fn seconds_value(table: &Table, key: &str) -> Option<Duration> {
    let value = table.get(key)?;
    match value.as_integer() {
        Some(secs) if secs > 0 => Some(Duration::from_secs(secs.unsigned_abs())),
        _ => {
            warn!("Invalid config value for {key}: {value} (want a positive number of seconds)");
            None
        }
    }
}

fn port_value(table: &Table, key: &str) -> Option<u16> {
    let value = table.get(key)?;
    match value.as_integer().and_then(|port| u16::try_from(port).ok()) {
        Some(port) => Some(port),
        None => {
            warn!("Invalid config value for {key}: {value} (want a port number)");
            None
        }
    }
}

fn str_value(table: &Table, key: &str) -> Option<String> {
    let value = table.get(key)?;
    match value.as_str() {
        Some(s) if !s.is_empty() => Some(s.to_string()),
        // An empty string means "explicitly unset", as in the sample file.
        Some(_) => None,
        None => {
            warn!("Invalid config value for {key}: {value} (want a string)");
            None
        }
    }
}

fn str_list_value(table: &Table, key: &str) -> Vec<String> {
    let Some(value) = table.get(key) else {
        return Vec::new();
    };
    let Some(items) = value.as_array() else {
        warn!("Invalid config value for {key}: {value} (want an array of strings)");
        return Vec::new();
    };
    items
        .iter()
        .filter_map(|item| match item.as_str() {
            Some(s) if !s.is_empty() => Some(s.to_string()),
            _ => {
                warn!("Ignoring {key} entry: {item}");
                None
            }
        })
        .collect()
}

fn parse_target(value: &Value) -> Option<Target> {
    let Some(entry) = value.as_table() else {
        warn!("Invalid monitor target: {value} (want a table with host and url)");
        return None;
    };
    let host = entry.get("host").and_then(Value::as_str).unwrap_or_default();
    let url = entry.get("url").and_then(Value::as_str).unwrap_or_default();
    if host.is_empty() || url.is_empty() {
        warn!("Invalid monitor target: {value} (host and url are required)");
        return None;
    }
    let mut target = match Target::new(host, url) {
        Ok(target) => target,
        Err(err) => {
            warn!("Invalid monitor target {host}: {err}");
            return None;
        }
    };
    target.user = entry.get("user").and_then(Value::as_str).map(str::to_string);
    target.password = entry
        .get("password")
        .and_then(Value::as_str)
        .map(str::to_string);
    target.pid_owner = entry
        .get("pid_owner")
        .and_then(Value::as_str)
        .map(str::to_string);
    Some(target)
}

/// Commented sample configuration, printed by `--generate-config`.
pub const SAMPLE_CONFIG: &str = r#"# webmon configuration file.  Uncomment the values you change:

# ======================
# Monitor configuration
# ======================

# [monitor]
# This is the threshold for triggering an alert.  Responses slower than
# this value create an alert.
# max_response_time_secs = 60

# The number of seconds between monitor attempts
# monitor_interval_secs = 180

# The number of seconds monitoring will be disabled after an alert occurs
# disable_interval_secs = 3600

# The number of seconds between stats logging
# log_interval_secs = 3600

# ======================
# Alert configuration
# ======================

# [alert]
# A command to be executed when an alert fires, e.g. ssh to the host and
# dump threads.  The hostname and process owner are passed as arguments.
# shell_command = ""

# The number of seconds the command may run before it is killed
# command_timeout_secs = 300

# A webhook that receives the failure message as a JSON POST
# webhook_url = ""

# ===================
# Mail configuration
# ===================

# [mail]
# host = "localhost"
# port = 25
# username = ""
# password = ""

# An email address to be used as the "from" address in alert emails
# from = ""

# The email addresses that will receive alert emails
# to = []

# ===================
# Monitor targets
# ===================

# [[targets]]
# host = "abc-xyz"
# url = "https://abc-xyz.example.com/api/Ping"
# user = "joe"
# password = "secret"
# pid_owner = "root"

# [[targets]]
# host = "def-xyz"
# url = "https://def-xyz.example.com/api/Ping"
"#;
