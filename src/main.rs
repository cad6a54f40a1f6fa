//! polls a prometheus alertmanager and raises desktop notifications for new
//! alerts
//!
//! Features:
//! - counts active alerts matching a label filter and a receiver regex
//! - notifies once about every alert that started since the last poll
//! - opens the alertmanager web ui with the same filters

use anyhow::{Context, Result};
use settings::{Mode, Settings};

use crate::{
	alert_source::HttpAlertSource,
	alertmanager_url::{build_alertmanager_url, UrlMode},
	config_source::{ConfigSource, FileConfigSource, PollState},
	indicator::LogIndicator,
	metrics::PollerMetrics,
	poller::{PollError, Poller},
	state_file::StateFile,
};

mod alert;
mod alert_source;
mod alertmanager_url;
mod browser;
mod config_source;
mod indicator;
mod log;
mod metrics;
mod notifier;
mod poller;
mod settings;
mod state_file;
mod telemetry_endpoint;

/// exit the complete program if one thread panics
fn setup_panic_handler() {
	let default_panic = std::panic::take_hook();
	std::panic::set_hook(Box::new(move |info| {
		default_panic(info);
		std::process::exit(1);
	}));
}

/// the entry point of the program
#[tokio::main]
pub async fn main() -> Result<()> {
	setup_panic_handler();

	log::setup_logging().context("could not setup logging")?;

	let settings = Settings::global();

	match settings.mode {
		Mode::Run => run(settings).await,
		Mode::Check => check(settings).await,
		Mode::Open => open(settings),
	}
}

fn config_source(settings: &Settings) -> Result<FileConfigSource> {
	let state = StateFile::open(&settings.state_path)
		.with_context(|| format!("failed to open state file {}", settings.state_path))?;

	Ok(FileConfigSource::new(&settings.config_path, settings.alertmanager.clone(), state))
}

/// `interactive` pollers keep desktop notifications clickable, which needs a
/// long lived process
fn build_poller(settings: &Settings, interactive: bool) -> Result<Poller<FileConfigSource>> {
	let source = HttpAlertSource::new(settings.alertmanager.request_timeout())
		.context("failed to build http client")?;
	let indicator = LogIndicator::new(
		PollerMetrics::global().context("failed to register metrics")?.active_alerts.clone(),
	);

	Poller::new(
		config_source(settings)?,
		Box::new(source),
		settings.notifications.sink(interactive),
		Box::new(indicator),
	)
	.context("failed to construct poller")
}

/// poll until ctrl-c
async fn run(settings: &Settings) -> Result<()> {
	if let Some(telemetry) = settings.telemetry_endpoint.clone() {
		tokio::spawn(async move {
			if let Err(err) = telemetry_endpoint::run_telemetry_endpoint(telemetry).await {
				tracing::error!("{:#}", err);
			}
		});
	}

	let poller = build_poller(settings, true)?;
	let handle = poller.handle();

	tokio::spawn(async move {
		match tokio::signal::ctrl_c().await {
			Ok(()) => tracing::info!("received ctrl-c, shutting down"),
			Err(err) => tracing::error!("failed to listen for ctrl-c: {}", err),
		}
		handle.shutdown();
	});

	poller.run().await;

	Ok(())
}

/// poll once and print the number of active alerts
async fn check(settings: &Settings) -> Result<()> {
	let mut poller = build_poller(settings, false)?;

	if let Some(count) = check_once(&mut poller).await? {
		println!("{}", count);
	}

	Ok(())
}

/// Number of active alerts, `None` if polling is disabled because no
/// alertmanager url is configured.
async fn check_once<C: ConfigSource>(poller: &mut Poller<C>) -> Result<Option<usize>> {
	match poller.poll_once().await {
		Ok(outcome) => Ok(Some(outcome.count)),
		Err(err @ PollError::ConfigurationIncomplete) => {
			tracing::info!("skipping check: {}", err);
			Ok(None)
		}
		Err(err) => Err(err).context("poll failed"),
	}
}

/// open the alertmanager web ui with the configured filters
fn open(settings: &Settings) -> Result<()> {
	let state = PollState::load(&config_source(settings)?);

	match build_alertmanager_url(UrlMode::Web, &state) {
		Some(url) => browser::open(&url),
		None => {
			tracing::info!("no alertmanager url configured");
			Ok(())
		}
	}
}

#[cfg(test)]
mod tests {
	use std::time::Duration;

	use prometheus::IntGauge;

	use super::*;
	use crate::{
		config_source::{Key, MemoryConfigSource},
		notifier::LogNotifier,
	};

	fn poller(config: MemoryConfigSource) -> Poller<MemoryConfigSource> {
		let gauge = IntGauge::new("check_active_alerts", "active alerts seen by check").unwrap();
		Poller::new(
			config,
			Box::new(HttpAlertSource::new(Duration::from_secs(5)).unwrap()),
			Box::new(LogNotifier),
			Box::new(LogIndicator::new(gauge)),
		)
		.unwrap()
	}

	#[tokio::test]
	async fn check_without_url_is_a_no_op() {
		let mut poller = poller(MemoryConfigSource::new().with_int(Key::LastUpdate, 1_000));

		assert_eq!(check_once(&mut poller).await.unwrap(), None);
		assert_eq!(poller.config().get_int(Key::LastUpdate), 1_000);
	}

	#[tokio::test]
	async fn check_reports_count() {
		let mut server = mockito::Server::new_async().await;
		server
			.mock("GET", "/api/v2/alerts/groups")
			.match_query(mockito::Matcher::Any)
			.with_status(200)
			.with_body(r#"[{"alerts":[{"startsAt":"2022-06-01T12:00:00Z","labels":{},"annotations":{}}]}]"#)
			.create_async()
			.await;

		let mut poller = poller(MemoryConfigSource::new().with_string(Key::Url, server.url()));

		assert_eq!(check_once(&mut poller).await.unwrap(), Some(1));
	}

	#[tokio::test]
	async fn check_fails_on_unreachable_alertmanager() {
		let mut server = mockito::Server::new_async().await;
		server
			.mock("GET", "/api/v2/alerts/groups")
			.match_query(mockito::Matcher::Any)
			.with_status(503)
			.create_async()
			.await;

		let mut poller = poller(MemoryConfigSource::new().with_string(Key::Url, server.url()));

		assert!(check_once(&mut poller).await.is_err());
	}
}
