use std::{path::Path, time::Duration};

use anyhow::{Context, Result};
use clap::{Arg, Command};
use config::Config;
use once_cell::sync::OnceCell;
use serde::Deserialize;
use serde_with::{serde_as, DurationSeconds};

use crate::{
	log::LogSettings, notifier::NotificationSettings, telemetry_endpoint::TelemetryEndpointSettings,
};

static SETTINGS: OnceCell<Settings> = OnceCell::new();

/// prefix of environment variables overriding config file values, e.g.
/// `PROMETHEUS_NOTIFIER__ALERTMANAGER__URL`
const ENV_PREFIX: &str = "PROMETHEUS_NOTIFIER";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
/// what the binary should do
pub enum Mode {
	/// poll until interrupted
	#[default]
	Run,
	/// poll once and print the number of active alerts
	Check,
	/// open the alertmanager web ui
	Open,
}

#[serde_as]
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
/// which alertmanager to poll and how
pub struct AlertmanagerSettings {
	/// base url, empty disables polling
	pub url: String,
	pub label_filter: String,
	pub receiver_filter: String,
	#[serde_as(as = "Option<DurationSeconds<u64>>")]
	pub update_interval: Option<Duration>,
	#[serde_as(as = "Option<DurationSeconds<u64>>")]
	pub request_timeout: Option<Duration>,
}

impl AlertmanagerSettings {
	pub fn request_timeout(&self) -> Duration {
		self.request_timeout.unwrap_or(Duration::from_secs(30))
	}
}

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
	#[serde(default)]
	pub alertmanager: AlertmanagerSettings,
	#[serde(default = "default_state_path")]
	pub state_path: String,
	#[serde(default)]
	pub notifications: NotificationSettings,
	#[serde(default)]
	pub log: LogSettings,
	pub telemetry_endpoint: Option<TelemetryEndpointSettings>,

	#[serde(skip)]
	pub config_path: String,
	#[serde(skip)]
	pub mode: Mode,
}

fn default_state_path() -> String {
	String::from("./state.json")
}

impl Settings {
	pub fn global() -> &'static Self {
		SETTINGS.get_or_init(|| {
			match Self::load().context("failed to load config and command line arguments") {
				Ok(settings) => settings,
				Err(err) => {
					// tracing wasn't setup yet
					panic!("{:#?}", err);
				}
			}
		})
	}

	fn load() -> Result<Self> {
		let opts = Command::new(clap::crate_name!())
			.version(clap::crate_version!())
			.about(clap::crate_description!())
			.author(clap::crate_authors!())
			.args(&[
				Arg::new("config")
					.help("path of config file")
					.takes_value(true)
					.short('c')
					.long("config")
					.default_value("./config.yaml"),
				Arg::new("level")
					.help("log level")
					.possible_values(["Error", "Warn", "Info", "Debug", "Trace"])
					.ignore_case(true)
					.takes_value(true)
					.long("log"),
			])
			.subcommand(Command::new("run").about("poll alertmanager until interrupted (default)"))
			.subcommand(Command::new("check").about("poll once and print the number of active alerts"))
			.subcommand(Command::new("open").about("open the alertmanager web ui in the default browser"))
			.get_matches();

		let config_path = opts.value_of("config").context("missing config path")?;

		let mut settings: Settings = config_builder(Path::new(config_path))
			.build()
			.and_then(|config| config.try_deserialize())
			.context("can't load config")?;

		settings.config_path = config_path.to_owned();
		settings.mode = match opts.subcommand_name() {
			Some("check") => Mode::Check,
			Some("open") => Mode::Open,
			_ => Mode::Run,
		};

		if let Some(level) = opts.value_of("level") {
			settings.log.level = level.to_string();
		}

		Ok(settings)
	}
}

fn config_builder(config_path: &Path) -> config::ConfigBuilder<config::builder::DefaultState> {
	Config::builder()
		.add_source(config::File::from(config_path))
		.add_source(config::Environment::with_prefix(ENV_PREFIX).separator("__"))
}

/// Re-reads only the `alertmanager` section, used to pick up edits while
/// running.
pub fn load_alertmanager_settings(config_path: &Path) -> Result<AlertmanagerSettings, config::ConfigError> {
	#[derive(Deserialize)]
	struct Section {
		#[serde(default)]
		alertmanager: AlertmanagerSettings,
	}

	let section: Section = config_builder(config_path).build()?.try_deserialize()?;
	Ok(section.alertmanager)
}

#[cfg(test)]
mod tests {
	use std::fs;

	use super::*;

	#[test]
	fn full_config_file() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("config.yaml");
		fs::write(
			&path,
			"alertmanager:\n  url: https://am.example\n  receiver_filter: ops.*\n  update_interval: 120\n  request_timeout: 5\n\
			 state_path: /var/lib/prometheus-notifier/state.json\n\
			 notifications:\n  backend: log\n\
			 log:\n  level: debug\n\
			 telemetry_endpoint:\n  bind_address: 127.0.0.1\n  port: 9099\n",
		)
		.unwrap();

		let settings: Settings = config_builder(&path).build().unwrap().try_deserialize().unwrap();

		assert_eq!(settings.alertmanager.url, "https://am.example");
		assert_eq!(settings.alertmanager.receiver_filter, "ops.*");
		assert_eq!(settings.alertmanager.update_interval, Some(Duration::from_secs(120)));
		assert_eq!(settings.alertmanager.request_timeout(), Duration::from_secs(5));
		assert_eq!(settings.state_path, "/var/lib/prometheus-notifier/state.json");
		assert_eq!(settings.log.level, "debug");
		assert_eq!(settings.telemetry_endpoint.map(|t| t.port), Some(9099));
	}

	#[test]
	fn minimal_config_file() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("config.yaml");
		fs::write(&path, "alertmanager:\n  url: http://am.example\n").unwrap();

		let settings: Settings = config_builder(&path).build().unwrap().try_deserialize().unwrap();

		assert_eq!(settings.alertmanager.update_interval, None);
		assert_eq!(settings.alertmanager.request_timeout(), Duration::from_secs(30));
		assert_eq!(settings.state_path, "./state.json");
		assert_eq!(settings.log.level, "info");
		assert!(settings.telemetry_endpoint.is_none());
	}
}
