use std::str::FromStr;

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing_subscriber::{
	filter::LevelFilter, fmt, prelude::__tracing_subscriber_SubscriberExt, util::SubscriberInitExt,
	EnvFilter,
};

use crate::settings::Settings;

#[derive(Debug, Clone, Deserialize)]
pub struct LogSettings {
	pub level: String,
}

impl Default for LogSettings {
	fn default() -> Self {
		Self { level: String::from("info") }
	}
}

impl LogSettings {
	pub fn global() -> &'static Self {
		&Settings::global().log
	}
}

pub fn setup_logging() -> Result<()> {
	let level = tracing::Level::from_str(LogSettings::global().level.as_str())
		.context("invalid log level")?;

	let fmt_layer = fmt::layer();

	let filter_layer = EnvFilter::default()
		.add_directive(LevelFilter::from_level(level).into())
		.add_directive("hyper=warn".parse()?)
		.add_directive("reqwest=warn".parse()?)
		.add_directive("zbus=warn".parse()?);

	tracing_subscriber::registry().with(filter_layer).with(fmt_layer).init();

	Ok(())
}
