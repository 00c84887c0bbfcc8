// Copyright (c) 2026 Graphcore Ltd. All rights reserved.

//! Simulator settings.
//!
//! Settings are layered, each source overriding the previous one:
//!  1. compiled defaults,
//!  2. a TOML file (`--config`, default `votf-sim.toml` if present),
//!  3. `VOTF_`-prefixed environment variables,
//!  4. command-line arguments.

use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::Parser;
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};
use votf_models::types::PollConfig;

/// Default settings file, read if it exists.
pub const DEFAULT_CONF_FILE: &str = "votf-sim.toml";

/// Command-line arguments.
///
/// Anything not given falls back to the configuration file, environment and
/// defaults.
#[derive(Debug, Default, Parser)]
#[command(about = "Run a VOTF scenario against a simulated platform")]
pub struct Cli {
    /// Settings file (TOML).
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Platform file.
    #[arg(long)]
    pub platform: Option<PathBuf>,

    /// Scenario file.
    #[arg(long)]
    pub scenario: Option<PathBuf>,

    /// Enable logging to the console.
    #[arg(long)]
    pub stdout: Option<bool>,

    /// Level of log message to display.
    #[arg(long)]
    pub stdout_level: Option<log::Level>,

    /// Set a regular expression for which entites should have logging level set
    /// to `--stdout-level`. Others will have level set to `Error`.
    #[arg(long)]
    pub stdout_filter_regex: Option<String>,

    /// Also write the log to this file.
    #[arg(long)]
    pub log_file: Option<String>,

    /// Level of log message written to `--log-file`.
    #[arg(long)]
    pub log_file_level: Option<log::Level>,

    /// Override the platform's poll iteration cap.
    #[arg(long)]
    pub max_iterations: Option<u32>,

    /// Override the platform's delay between polls.
    #[arg(long)]
    pub delay_us: Option<u64>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub platform: PathBuf,
    pub scenario: PathBuf,
    pub stdout: bool,
    pub stdout_level: log::Level,
    pub stdout_filter_regex: String,
    pub log_file: Option<String>,
    pub log_file_level: log::Level,
    pub max_iterations: Option<u32>,
    pub delay_us: Option<u64>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            platform: PathBuf::from("platform.yaml"),
            scenario: PathBuf::from("scenario.yaml"),
            stdout: true,
            stdout_level: log::Level::Info,
            stdout_filter_regex: String::new(),
            log_file: None,
            log_file_level: log::Level::Trace,
            max_iterations: None,
            delay_us: None,
        }
    }
}

impl Settings {
    /// Defaults, then `conf_file` if it exists, then the environment.
    #[must_use]
    pub fn figment(conf_file: &Path) -> Figment {
        Figment::from(Serialized::defaults(Settings::default()))
            .merge(Toml::file(conf_file))
            .merge(Env::prefixed("VOTF_"))
    }

    /// Resolve the settings from every source.
    pub fn load(cli: &Cli) -> Result<Self, figment::Error> {
        let conf_file = match &cli.config {
            Some(path) => {
                if !path.is_file() {
                    return Err(figment::Error::from(format!(
                        "{} not found",
                        path.display()
                    )));
                }
                path.clone()
            }
            None => PathBuf::from(DEFAULT_CONF_FILE),
        };
        let mut settings: Settings = Settings::figment(&conf_file).extract()?;
        settings.merge_cli(cli);
        Ok(settings)
    }

    /// Apply every argument given on the command line.
    pub fn merge_cli(&mut self, cli: &Cli) {
        if let Some(platform) = &cli.platform {
            self.platform.clone_from(platform);
        }
        if let Some(scenario) = &cli.scenario {
            self.scenario.clone_from(scenario);
        }
        if let Some(stdout) = cli.stdout {
            self.stdout = stdout;
        }
        if let Some(level) = cli.stdout_level {
            self.stdout_level = level;
        }
        if let Some(regex) = &cli.stdout_filter_regex {
            self.stdout_filter_regex.clone_from(regex);
        }
        if cli.log_file.is_some() {
            self.log_file.clone_from(&cli.log_file);
        }
        if let Some(level) = cli.log_file_level {
            self.log_file_level = level;
        }
        if cli.max_iterations.is_some() {
            self.max_iterations = cli.max_iterations;
        }
        if cli.delay_us.is_some() {
            self.delay_us = cli.delay_us;
        }
    }

    /// The platform's poll limits with any overrides applied.
    #[must_use]
    pub fn poll(&self, platform: PollConfig) -> PollConfig {
        PollConfig {
            max_iterations: self.max_iterations.unwrap_or(platform.max_iterations),
            delay: self
                .delay_us
                .map_or(platform.delay, Duration::from_micros),
        }
    }
}

#[cfg(test)]
mod tests {
    use figment::Jail;

    use super::*;

    #[test]
    fn defaults() {
        Jail::expect_with(|_jail| {
            let settings: Settings = Settings::figment(Path::new("missing.toml")).extract()?;
            assert_eq!(settings, Settings::default());
            Ok(())
        });
    }

    #[test]
    fn layering() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "sim.toml",
                r#"
                platform = "soc.yaml"
                stdout_level = "debug"
                max_iterations = 20
                "#,
            )?;
            jail.set_env("VOTF_STDOUT_LEVEL", "warn");
            jail.set_env("VOTF_SCENARIO", "boot.yaml");

            let cli = Cli {
                config: Some(PathBuf::from("sim.toml")),
                scenario: Some(PathBuf::from("flush.yaml")),
                delay_us: Some(3),
                ..Default::default()
            };
            let settings = Settings::load(&cli)?;
            assert_eq!(settings.platform, PathBuf::from("soc.yaml"));
            assert_eq!(settings.stdout_level, log::Level::Warn);
            assert_eq!(settings.scenario, PathBuf::from("flush.yaml"));

            let poll = settings.poll(PollConfig::default());
            assert_eq!(poll.max_iterations, 20);
            assert_eq!(poll.delay, Duration::from_micros(3));
            Ok(())
        });
    }

    #[test]
    fn missing_config_file() {
        Jail::expect_with(|_jail| {
            let cli = Cli {
                config: Some(PathBuf::from("nope.toml")),
                ..Default::default()
            };
            let err = Settings::load(&cli).unwrap_err();
            assert!(err.to_string().contains("nope.toml not found"));
            Ok(())
        });
    }

    #[test]
    fn platform_poll_kept_without_overrides() {
        let platform = PollConfig {
            max_iterations: 7,
            delay: Duration::from_micros(1),
        };
        assert_eq!(Settings::default().poll(platform), platform);
    }
}
