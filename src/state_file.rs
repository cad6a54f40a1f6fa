//! persists the `last-update` cursor between restarts

use std::{fs, io, path::PathBuf};

use serde::{Deserialize, Serialize};

use crate::config_source::ConfigSourceError;

#[derive(Debug, Default, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
struct Contents {
	/// epoch seconds of the last successful poll
	last_update: i64,
}

/// json file holding the poll cursor
#[derive(Debug)]
pub struct StateFile {
	path: PathBuf,
	contents: Contents,
}

impl StateFile {
	/// Opens the state file at `path`. A missing file starts at the epoch.
	pub fn open(path: impl Into<PathBuf>) -> Result<Self, ConfigSourceError> {
		let path = path.into();

		let contents = match fs::read(&path) {
			Ok(bytes) => serde_json::from_slice(&bytes)?,
			Err(err) if err.kind() == io::ErrorKind::NotFound => Contents::default(),
			Err(err) => return Err(err.into()),
		};

		Ok(Self { path, contents })
	}

	pub fn last_update(&self) -> i64 {
		self.contents.last_update
	}

	/// Updates the cursor and writes it to disk.
	///
	/// The file is written next to the target and renamed over it, so a crash
	/// never leaves a truncated cursor behind.
	pub fn set_last_update(&mut self, last_update: i64) -> Result<(), ConfigSourceError> {
		self.contents.last_update = last_update;

		if let Some(parent) = self.path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
			fs::create_dir_all(parent)?;
		}

		let tmp = self.path.with_extension("tmp");
		fs::write(&tmp, serde_json::to_vec(&self.contents)?)?;
		fs::rename(&tmp, &self.path)?;

		Ok(())
	}
}
