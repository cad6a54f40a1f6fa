//! key/value view on the poller configuration and the poll cursor
//!
//! The poller reads its [PollState] through a [ConfigSource] at the start of
//! every cycle, so edits to the config file take effect on the next tick.

#[cfg(test)]
use std::collections::HashMap;
use std::{path::PathBuf, time::Duration};

use thiserror::Error;

use crate::{
	settings::{self, AlertmanagerSettings},
	state_file::StateFile,
};

/// interval used when `update-interval` is unset or not positive
pub const DEFAULT_UPDATE_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Key {
	Url,
	LabelFilter,
	ReceiverFilter,
	UpdateInterval,
	LastUpdate,
}

impl Key {
	pub fn as_str(self) -> &'static str {
		match self {
			Key::Url => "url",
			Key::LabelFilter => "label-filter",
			Key::ReceiverFilter => "receiver-filter",
			Key::UpdateInterval => "update-interval",
			Key::LastUpdate => "last-update",
		}
	}
}

#[derive(Debug, Error)]
pub enum ConfigSourceError {
	#[error("key `{}` is read only", .0.as_str())]
	ReadOnly(Key),
	#[error("failed to access state file")]
	Io(#[from] std::io::Error),
	#[error("state file is not valid json")]
	Json(#[from] serde_json::Error),
	#[error("failed to reload config file")]
	Config(#[from] config::ConfigError),
}

/// where the poller gets its settings from. Unset keys read as `""` or `0`.
pub trait ConfigSource: Send {
	fn get_string(&self, key: Key) -> String;

	fn get_int(&self, key: Key) -> i64;

	fn set_int(&mut self, key: Key, value: i64) -> Result<(), ConfigSourceError>;

	/// refresh values from the backing store, called before each poll
	fn reload(&mut self) -> Result<(), ConfigSourceError> {
		Ok(())
	}
}

/// snapshot of everything one poll cycle needs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollState {
	/// alertmanager base url, empty disables polling
	pub base_url: String,
	/// raw matcher expression
	pub label_filter: String,
	/// receiver regex
	pub receiver_filter: String,
	pub update_interval: Duration,
	/// epoch seconds of the last successful poll
	pub last_update: i64,
}

impl Default for PollState {
	fn default() -> Self {
		Self {
			base_url: String::new(),
			label_filter: String::new(),
			receiver_filter: String::new(),
			update_interval: DEFAULT_UPDATE_INTERVAL,
			last_update: 0,
		}
	}
}

impl PollState {
	pub fn load(source: &dyn ConfigSource) -> Self {
		Self {
			base_url: source.get_string(Key::Url),
			label_filter: source.get_string(Key::LabelFilter),
			receiver_filter: source.get_string(Key::ReceiverFilter),
			update_interval: update_interval(source),
			last_update: source.get_int(Key::LastUpdate),
		}
	}
}

/// the configured poll interval, falling back to [DEFAULT_UPDATE_INTERVAL]
pub fn update_interval(source: &dyn ConfigSource) -> Duration {
	match u64::try_from(source.get_int(Key::UpdateInterval)) {
		Ok(secs) if secs > 0 => Duration::from_secs(secs),
		_ => DEFAULT_UPDATE_INTERVAL,
	}
}

/// Reads the `alertmanager` section of the config file and keeps the cursor
/// in a [StateFile].
#[derive(Debug)]
pub struct FileConfigSource {
	config_path: PathBuf,
	alertmanager: AlertmanagerSettings,
	state: StateFile,
}

impl FileConfigSource {
	pub fn new(config_path: impl Into<PathBuf>, alertmanager: AlertmanagerSettings, state: StateFile) -> Self {
		Self { config_path: config_path.into(), alertmanager, state }
	}
}

impl ConfigSource for FileConfigSource {
	fn get_string(&self, key: Key) -> String {
		match key {
			Key::Url => self.alertmanager.url.clone(),
			Key::LabelFilter => self.alertmanager.label_filter.clone(),
			Key::ReceiverFilter => self.alertmanager.receiver_filter.clone(),
			Key::UpdateInterval | Key::LastUpdate => String::new(),
		}
	}

	fn get_int(&self, key: Key) -> i64 {
		match key {
			Key::UpdateInterval => self
				.alertmanager
				.update_interval
				.map_or(0, |interval| i64::try_from(interval.as_secs()).unwrap_or(i64::MAX)),
			Key::LastUpdate => self.state.last_update(),
			Key::Url | Key::LabelFilter | Key::ReceiverFilter => 0,
		}
	}

	fn set_int(&mut self, key: Key, value: i64) -> Result<(), ConfigSourceError> {
		match key {
			Key::LastUpdate => self.state.set_last_update(value),
			key => Err(ConfigSourceError::ReadOnly(key)),
		}
	}

	fn reload(&mut self) -> Result<(), ConfigSourceError> {
		self.alertmanager = settings::load_alertmanager_settings(&self.config_path)?;
		Ok(())
	}
}

/// in memory source for tests
#[cfg(test)]
#[derive(Debug, Default, Clone)]
pub struct MemoryConfigSource {
	strings: HashMap<Key, String>,
	ints: HashMap<Key, i64>,
}

#[cfg(test)]
impl MemoryConfigSource {
	pub fn new() -> Self {
		Self::default()
	}

	#[must_use]
	pub fn with_string(mut self, key: Key, value: impl Into<String>) -> Self {
		self.strings.insert(key, value.into());
		self
	}

	#[must_use]
	pub fn with_int(mut self, key: Key, value: i64) -> Self {
		self.ints.insert(key, value);
		self
	}
}

#[cfg(test)]
impl ConfigSource for MemoryConfigSource {
	fn get_string(&self, key: Key) -> String {
		self.strings.get(&key).cloned().unwrap_or_default()
	}

	fn get_int(&self, key: Key) -> i64 {
		self.ints.get(&key).copied().unwrap_or_default()
	}

	fn set_int(&mut self, key: Key, value: i64) -> Result<(), ConfigSourceError> {
		self.ints.insert(key, value);
		Ok(())
	}
}
