//! prometheus meters for the alert poller

use once_cell::sync::OnceCell;
use prometheus::{
	exponential_buckets, histogram_opts, opts, register_histogram, register_int_counter,
	register_int_counter_vec, register_int_gauge, Histogram, IntCounter, IntCounterVec, IntGauge,
};

static METRICS: OnceCell<PollerMetrics> = OnceCell::new();

#[derive(Debug)]
/// meters shared by every poller in this process
pub struct PollerMetrics {
	/// finished poll cycles by outcome
	pub polls: IntCounterVec,
	/// notifications handed to the notification sink
	pub notifications: IntCounter,
	/// number of active alerts seen by the last successful poll
	pub active_alerts: IntGauge,
	/// time spent fetching the alert groups
	pub fetch_duration: Histogram,
}

impl PollerMetrics {
	/// registers the meters in the default registry on first use
	pub fn global() -> Result<&'static Self, prometheus::Error> {
		METRICS.get_or_try_init(Self::new)
	}

	fn new() -> Result<Self, prometheus::Error> {
		let polls = register_int_counter_vec!(
			opts!("polls_total", "number of finished poll cycles")
				.namespace("prometheus_notifier")
				.subsystem("poller"),
			&["outcome"]
		)?;

		let notifications = register_int_counter!(opts!(
			"notifications_total",
			"number of notifications raised for new alerts"
		)
		.namespace("prometheus_notifier")
		.subsystem("poller"))?;

		let active_alerts = register_int_gauge!(opts!(
			"active_alerts",
			"active alerts matching the filters at the last successful poll"
		)
		.namespace("prometheus_notifier")
		.subsystem("poller"))?;

		let fetch_duration = register_histogram!(histogram_opts!(
			"fetch_duration_seconds",
			"time spent fetching alert groups from alertmanager",
			exponential_buckets(0.01, 2., 12)?
		)
		.namespace("prometheus_notifier")
		.subsystem("poller"))?;

		Ok(Self { polls, notifications, active_alerts, fetch_duration })
	}

	pub fn record_poll(&self, outcome: &str) {
		self.polls.with_label_values(&[outcome]).inc();
	}
}
