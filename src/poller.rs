//! The alert poller.
//!
//! Every cycle fetches the active alert groups from alertmanager, counts all
//! alerts, notifies about the ones that started after the stored cursor and
//! then moves the cursor to now. Failed cycles change nothing, the next tick
//! is the only retry.
//!
//! The timer is a one-shot sleep armed after each cycle, so at most one cycle
//! is in flight and interval changes apply from the next tick on.

use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::{
	alert::{Alert, AlertGroup},
	alert_source::AlertSource,
	alertmanager_url::{build_alertmanager_url, UrlMode},
	config_source::{update_interval, ConfigSource, Key, PollState},
	indicator::IndicatorSink,
	metrics::PollerMetrics,
	notifier::{Notification, NotificationSink},
};

#[derive(Debug, Error)]
pub enum PollError {
	#[error("no alertmanager url configured")]
	ConfigurationIncomplete,
	#[error("request to alertmanager failed: {0}")]
	Transport(#[from] reqwest::Error),
	#[error("alertmanager responded with {0}")]
	Status(reqwest::StatusCode),
	#[error("malformed alertmanager response: {0}")]
	MalformedResponse(#[from] serde_json::Error),
	#[error("poller was shut down")]
	Shutdown,
}

impl PollError {
	/// label for the `polls_total` meter
	fn outcome(&self) -> &'static str {
		match self {
			PollError::ConfigurationIncomplete => "disabled",
			PollError::Transport(_) => "transport_error",
			PollError::Status(_) => "status_error",
			PollError::MalformedResponse(_) => "malformed",
			PollError::Shutdown => "shutdown",
		}
	}
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
/// result of a successful poll
pub struct PollOutcome {
	/// all active alerts matching the filters
	pub count: usize,
	/// alerts that started after the cursor, in server order
	pub new_alerts: Vec<Alert>,
}

/// true if the alert started strictly after `last_update` (epoch seconds)
fn started_after(starts_at: &DateTime<Utc>, last_update: i64) -> bool {
	(starts_at.timestamp(), starts_at.timestamp_subsec_nanos()) > (last_update, 0)
}

/// Flattens the groups and picks the alerts newer than `last_update`.
pub fn classify(groups: Vec<AlertGroup>, last_update: i64) -> PollOutcome {
	let mut outcome = PollOutcome::default();

	for alert in groups.into_iter().flat_map(|group| group.alerts) {
		outcome.count += 1;

		if started_after(&alert.starts_at, last_update) {
			outcome.new_alerts.push(alert);
		}
	}

	outcome
}

/// stops a running [Poller]
#[derive(Debug, Clone)]
pub struct PollerHandle {
	shutdown: CancellationToken,
}

impl PollerHandle {
	/// Cancels the pending timer or in-flight fetch. Sinks aren't touched
	/// after this returns.
	pub fn shutdown(&self) {
		self.shutdown.cancel();
	}
}

pub struct Poller<C> {
	config: C,
	source: Box<dyn AlertSource>,
	notifier: Box<dyn NotificationSink>,
	indicator: Box<dyn IndicatorSink>,
	metrics: &'static PollerMetrics,
	shutdown: CancellationToken,
}

impl<C: ConfigSource> Poller<C> {
	pub fn new(
		config: C,
		source: Box<dyn AlertSource>,
		notifier: Box<dyn NotificationSink>,
		indicator: Box<dyn IndicatorSink>,
	) -> Result<Self, prometheus::Error> {
		Ok(Self {
			config,
			source,
			notifier,
			indicator,
			metrics: PollerMetrics::global()?,
			shutdown: CancellationToken::new(),
		})
	}

	pub fn handle(&self) -> PollerHandle {
		PollerHandle { shutdown: self.shutdown.clone() }
	}

	#[cfg(test)]
	pub fn config(&self) -> &C {
		&self.config
	}

	/// Runs a single poll cycle.
	pub async fn poll_once(&mut self) -> Result<PollOutcome, PollError> {
		let result = self.poll().await;

		self.metrics.record_poll(match &result {
			Ok(_) => "success",
			Err(err) => err.outcome(),
		});

		result
	}

	async fn poll(&mut self) -> Result<PollOutcome, PollError> {
		if self.shutdown.is_cancelled() {
			return Err(PollError::Shutdown);
		}

		if let Err(err) = self.config.reload() {
			tracing::warn!("keeping previous configuration: {}", err);
		}

		let state = PollState::load(&self.config);
		let url =
			build_alertmanager_url(UrlMode::Api, &state).ok_or(PollError::ConfigurationIncomplete)?;

		tracing::debug!(%url, "fetching alerts");

		let groups = {
			let _timer = self.metrics.fetch_duration.start_timer();

			tokio::select! {
				biased;
				_ = self.shutdown.cancelled() => return Err(PollError::Shutdown),
				groups = self.source.fetch(&url) => groups?,
			}
		};

		// the fetch may have finished after teardown
		if self.shutdown.is_cancelled() {
			return Err(PollError::Shutdown);
		}

		let outcome = classify(groups, state.last_update);

		for alert in &outcome.new_alerts {
			tracing::debug!(alertname = alert.label("alertname"), starts_at = %alert.starts_at, "new alert");
			self.notifier.notify(Notification::for_alert(alert));
			self.metrics.notifications.inc();
		}

		let last_update = state.last_update.max(Utc::now().timestamp());
		if let Err(err) = self.config.set_int(Key::LastUpdate, last_update) {
			tracing::warn!("failed to store last update: {}", err);
		}

		self.indicator.set_count(outcome.count);

		Ok(outcome)
	}

	/// Polls immediately and then after every interval until
	/// [PollerHandle::shutdown] is called.
	pub async fn run(mut self) {
		tracing::info!("alert poller started");

		loop {
			match self.poll_once().await {
				Ok(outcome) => {
					tracing::debug!(count = outcome.count, new = outcome.new_alerts.len(), "poll finished");
				}
				Err(PollError::Shutdown) => break,
				Err(err @ PollError::ConfigurationIncomplete) => {
					tracing::debug!("skipping poll: {}", err);
				}
				Err(err) => tracing::warn!("skipping poll: {}", err),
			}

			let interval = update_interval(&self.config);

			tokio::select! {
				_ = self.shutdown.cancelled() => break,
				_ = tokio::time::sleep(interval) => {}
			}
		}

		self.teardown();
		tracing::info!("alert poller stopped");
	}

	fn teardown(&mut self) {
		self.shutdown.cancel();
		self.notifier.teardown();
	}
}
