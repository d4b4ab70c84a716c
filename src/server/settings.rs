//! Command-line and file configuration of the HTTP front end.
//!
//! Settings are layered: built-in defaults, then an optional TOML file
//! (`--config`), then `RATELIMIT_*` environment variables, then flags
//! given on the command line.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use thiserror::Error;

use crate::DEFAULT_STRATEGY;

pub const DEFAULT_HOST: &str = "localhost";
pub const DEFAULT_PORT: u16 = 8888;
pub const DEFAULT_REQUESTS: u32 = 12;
pub const DEFAULT_WINDOW_SECS: u64 = 60;
pub const DEFAULT_WORK_DELAY_MS: u64 = 100;
pub const DEFAULT_LOG_LEVEL: &str = "info";

const LOG_LEVELS: &[&str] = &["error", "warn", "info", "debug", "trace"];

#[derive(Debug, Clone, Default, Parser)]
#[command(name = "ratelimit-server", version, about = "Serve rate-limited work over HTTP")]
pub struct Args {
    /// Interface on which to listen
    #[arg(long)]
    pub host: Option<String>,

    /// Port number on which to listen
    #[arg(long)]
    pub port: Option<u16>,

    /// Maximum number of requests per window to handle
    #[arg(long)]
    pub requests: Option<u32>,

    /// Length of the window over which `requests` permits are replenished, in seconds
    #[arg(long)]
    pub window_secs: Option<u64>,

    /// Rate limiter strategy guarding /sync and /async
    #[arg(long)]
    pub strategy: Option<String>,

    /// Rate limiter strategy guarding /alternate/sync and /alternate/async
    #[arg(long)]
    pub alternate: Option<String>,

    /// Duration of the simulated work behind each admitted request, in milliseconds
    #[arg(long)]
    pub work_delay_ms: Option<u64>,

    /// One of error, warn, info, debug, trace
    #[arg(long)]
    pub log_level: Option<String>,

    /// TOML file to read settings from
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Settings {
    pub host: String,
    pub port: u16,
    pub requests: u32,
    pub window_secs: u64,
    pub strategy: String,
    #[serde(default)]
    pub alternate: Option<String>,
    pub work_delay_ms: u64,
    pub log_level: String,
}

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to load settings: {0}")]
    Load(#[from] ConfigError),
    #[error("Invalid log level: {0}. Must be one of: error, warn, info, debug, trace")]
    InvalidLogLevel(String),
    #[error("host must not be empty")]
    EmptyHost,
}

impl Settings {
    /// Loads the settings for `args`, reading `RATELIMIT_*` variables
    /// from the process environment.
    pub fn load(args: &Args) -> Result<Settings, SettingsError> {
        Self::load_with(args, Environment::with_prefix("RATELIMIT").try_parsing(true))
    }

    fn load_with(args: &Args, environment: Environment) -> Result<Settings, SettingsError> {
        let mut builder = Config::builder()
            .set_default("host", DEFAULT_HOST)?
            .set_default("port", i64::from(DEFAULT_PORT))?
            .set_default("requests", i64::from(DEFAULT_REQUESTS))?
            .set_default("window_secs", DEFAULT_WINDOW_SECS as i64)?
            .set_default("strategy", DEFAULT_STRATEGY)?
            .set_default("work_delay_ms", DEFAULT_WORK_DELAY_MS as i64)?
            .set_default("log_level", DEFAULT_LOG_LEVEL)?;
        if let Some(path) = &args.config {
            builder = builder.add_source(File::from(path.as_path()).required(true));
        }
        let settings: Settings = builder
            .add_source(environment)
            .set_override_option("host", args.host.clone())?
            .set_override_option("port", args.port.map(i64::from))?
            .set_override_option("requests", args.requests.map(i64::from))?
            .set_override_option("window_secs", args.window_secs.map(|secs| secs as i64))?
            .set_override_option("strategy", args.strategy.clone())?
            .set_override_option("alternate", args.alternate.clone())?
            .set_override_option("work_delay_ms", args.work_delay_ms.map(|ms| ms as i64))?
            .set_override_option("log_level", args.log_level.clone())?
            .build()?
            .try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        if !LOG_LEVELS.contains(&self.log_level.to_lowercase().as_str()) {
            return Err(SettingsError::InvalidLogLevel(self.log_level.clone()));
        }
        if self.host.trim().is_empty() {
            return Err(SettingsError::EmptyHost);
        }
        Ok(())
    }

    /// The window over which `requests` permits are replenished.
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }

    pub fn work_delay(&self) -> Duration {
        Duration::from_millis(self.work_delay_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn no_environment() -> Environment {
        Environment::with_prefix("RATELIMIT").source(Some(HashMap::new()))
    }

    #[test]
    fn defaults_without_flags() {
        let settings = Settings::load_with(&Args::default(), no_environment()).unwrap();
        assert_eq!(
            Settings {
                host: "localhost".into(),
                port: 8888,
                requests: 12,
                window_secs: 60,
                strategy: "decay".into(),
                alternate: None,
                work_delay_ms: 100,
                log_level: "info".into(),
            },
            settings
        );
        assert_eq!(Duration::from_secs(60), settings.window());
    }

    #[test]
    fn flags_override_file_and_environment() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "port = 9000\nrequests = 30\nalternate = \"unlimited\"").unwrap();
        let args = Args::parse_from([
            "ratelimit-server",
            "--port",
            "9100",
            "--config",
            file.path().to_str().unwrap(),
        ]);
        let env = HashMap::from([
            ("RATELIMIT_REQUESTS".to_string(), "40".to_string()),
            ("RATELIMIT_LOG_LEVEL".to_string(), "debug".to_string()),
        ]);
        let settings = Settings::load_with(
            &args,
            Environment::with_prefix("RATELIMIT")
                .try_parsing(true)
                .source(Some(env)),
        )
        .unwrap();
        assert_eq!(9100, settings.port);
        assert_eq!(40, settings.requests);
        assert_eq!(Some("unlimited".to_string()), settings.alternate);
        assert_eq!("debug", settings.log_level);
    }

    #[test]
    fn rejects_unknown_log_level() {
        let args = Args::parse_from(["ratelimit-server", "--log-level", "chatty"]);
        let err = Settings::load_with(&args, no_environment()).unwrap_err();
        assert!(matches!(err, SettingsError::InvalidLogLevel(level) if level == "chatty"));
    }

    #[test]
    fn missing_config_file_is_an_error() {
        let args = Args::parse_from(["ratelimit-server", "--config", "/nonexistent/ratelimit.toml"]);
        assert!(matches!(
            Settings::load_with(&args, no_environment()),
            Err(SettingsError::Load(_))
        ));
    }
}
