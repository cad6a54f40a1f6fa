//! Raises a notification for every new alert.
//!
//! Notifications are built from alerts by [Notification::for_alert] and
//! handed to a [NotificationSink]. The desktop sink talks to the session's
//! notification daemon, the log sink is meant for headless machines.

use std::{
	sync::{
		atomic::{AtomicBool, AtomicUsize, Ordering},
		Arc,
	},
	thread,
};

use notify_rust::Notification as DesktopNotification;
use serde::Deserialize;

use crate::{alert::Alert, browser, indicator::IconKind};

/// upper bound of notifications waiting for a click at the same time
const MAX_CLICK_WAITERS: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Urgency {
	High,
}

#[cfg(all(unix, not(target_os = "macos")))]
impl From<Urgency> for notify_rust::Urgency {
	fn from(urgency: Urgency) -> Self {
		match urgency {
			// freedesktop has no level between normal and critical
			Urgency::High => notify_rust::Urgency::Critical,
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
	pub title: String,
	pub body: String,
	pub icon: IconKind,
	pub urgency: Urgency,
	/// opened when the notification is activated
	pub click_url: Option<String>,
}

impl Notification {
	/// `[alertname] summary` with the description as body
	pub fn for_alert(alert: &Alert) -> Self {
		let click_url = Some(alert.generator_url.clone()).filter(|url| !url.is_empty());

		Self {
			title: format!("[{}] {}", alert.label("alertname"), alert.annotation("summary")),
			body: alert.annotation("description").to_owned(),
			icon: IconKind::Warning,
			urgency: Urgency::High,
			click_url,
		}
	}
}

/// where notifications for new alerts go
pub trait NotificationSink: Send {
	fn notify(&mut self, notification: Notification);

	/// release resources, no notification is sent afterwards
	fn teardown(&mut self) {}
}

#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum NotificationBackend {
	#[default]
	Desktop,
	Log,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NotificationSettings {
	pub backend: NotificationBackend,
	/// application name shown by the notification daemon
	pub app_name: String,
}

impl Default for NotificationSettings {
	fn default() -> Self {
		Self { backend: NotificationBackend::Desktop, app_name: String::from("Prometheus Notifier") }
	}
}

impl NotificationSettings {
	pub fn sink(&self, interactive: bool) -> Box<dyn NotificationSink> {
		match self.backend {
			NotificationBackend::Desktop => {
				Box::new(DesktopNotifier::new(self.app_name.clone(), interactive))
			}
			NotificationBackend::Log => Box::new(LogNotifier),
		}
	}
}

fn notification_icon(icon: IconKind) -> &'static str {
	match icon {
		IconKind::Neutral => "dialog-information",
		IconKind::Warning => "dialog-warning",
	}
}

/// counts threads parked in [wait_for_action](notify_rust::NotificationHandle::wait_for_action)
#[derive(Debug, Default, Clone)]
struct ClickWaiters(Arc<AtomicUsize>);

impl ClickWaiters {
	/// a slot for one more waiter, `None` once [MAX_CLICK_WAITERS] are taken
	fn try_acquire(&self) -> Option<ClickWaiter> {
		self.0
			.fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| (n < MAX_CLICK_WAITERS).then(|| n + 1))
			.ok()
			.map(|_| ClickWaiter(Arc::clone(&self.0)))
	}

	fn active(&self) -> usize {
		self.0.load(Ordering::Acquire)
	}
}

/// frees its slot when dropped
#[derive(Debug)]
struct ClickWaiter(Arc<AtomicUsize>);

impl Drop for ClickWaiter {
	fn drop(&mut self) {
		self.0.fetch_sub(1, Ordering::AcqRel);
	}
}

/// Sends freedesktop notifications.
///
/// Talking to the notification daemon and waiting for clicks happens on
/// detached threads, so the runtime never waits for open notifications on
/// shutdown.
#[derive(Debug)]
pub struct DesktopNotifier {
	app_name: String,
	/// whether click targets are attached and waited for
	interactive: bool,
	/// prefilled notification, created on first use
	template: Option<DesktopNotification>,
	/// cleared on teardown so pending click handlers don't open anything
	live: Arc<AtomicBool>,
	waiters: ClickWaiters,
}

impl DesktopNotifier {
	pub fn new(app_name: String, interactive: bool) -> Self {
		Self {
			app_name,
			interactive,
			template: None,
			live: Arc::new(AtomicBool::new(true)),
			waiters: ClickWaiters::default(),
		}
	}

	fn template(&mut self) -> &DesktopNotification {
		let app_name = &self.app_name;
		self.template.get_or_insert_with(|| {
			let mut template = DesktopNotification::new();
			template.appname(app_name);
			template
		})
	}

	fn is_live(&self) -> bool {
		self.live.load(Ordering::Acquire)
	}
}

impl NotificationSink for DesktopNotifier {
	fn notify(&mut self, notification: Notification) {
		if !self.is_live() {
			return;
		}

		let click = match notification.click_url.filter(|_| self.interactive) {
			Some(url) => match self.waiters.try_acquire() {
				Some(waiter) => Some((url, waiter)),
				None => {
					tracing::debug!(
						waiting = self.waiters.active(),
						"too many notifications waiting for a click, sending without action"
					);
					None
				}
			},
			None => None,
		};
		let mut desktop = self.template().clone();
		desktop
			.summary(&notification.title)
			.body(&notification.body)
			.icon(notification_icon(notification.icon));

		#[cfg(all(unix, not(target_os = "macos")))]
		{
			desktop.urgency(notification.urgency.into());
			if click.is_some() {
				desktop.action("default", "Open");
			}
		}

		let live = Arc::clone(&self.live);
		let spawned = thread::Builder::new()
			.name(String::from("notification"))
			.spawn(move || show(desktop, click, &live));

		if let Err(err) = spawned {
			tracing::warn!("failed to spawn notification thread: {}", err);
		}
	}

	fn teardown(&mut self) {
		self.live.store(false, Ordering::Release);
		self.template = None;
	}
}

#[cfg(all(unix, not(target_os = "macos")))]
fn show(notification: DesktopNotification, click: Option<(String, ClickWaiter)>, live: &AtomicBool) {
	let handle = match notification.show() {
		Ok(handle) => handle,
		Err(err) => {
			tracing::warn!("failed to show notification: {}", err);
			return;
		}
	};

	if let Some((url, _waiter)) = click {
		handle.wait_for_action(|action| {
			if action == "default" && live.load(Ordering::Acquire) {
				if let Err(err) = browser::open(&url) {
					tracing::warn!("failed to open {}: {:#}", url, err);
				}
			}
		});
	}
}

#[cfg(not(all(unix, not(target_os = "macos"))))]
fn show(notification: DesktopNotification, _click: Option<(String, ClickWaiter)>, _live: &AtomicBool) {
	if let Err(err) = notification.show() {
		tracing::warn!("failed to show notification: {}", err);
	}
}

/// Writes notifications to the log instead of the desktop.
#[derive(Debug, Default)]
pub struct LogNotifier;

impl NotificationSink for LogNotifier {
	fn notify(&mut self, notification: Notification) {
		tracing::info!(
			title = %notification.title,
			body = %notification.body,
			url = notification.click_url.as_deref().unwrap_or_default(),
			"new alert"
		);
	}
}

#[cfg(test)]
mod tests {
	use chrono::{TimeZone, Utc};

	use super::*;

	fn alert(generator_url: &str) -> Alert {
		Alert {
			starts_at: Utc.timestamp_opt(2_000, 0).unwrap(),
			generator_url: generator_url.to_owned(),
			labels: [("alertname", "DiskFull")]
				.into_iter()
				.map(|(k, v)| (k.to_owned(), v.to_owned()))
				.collect(),
			annotations: [("summary", "disk almost full"), ("description", "/var is at 97%")]
				.into_iter()
				.map(|(k, v)| (k.to_owned(), v.to_owned()))
				.collect(),
		}
	}

	#[test]
	fn formats_alert_notification() {
		let notification = Notification::for_alert(&alert("http://prometheus.example/graph"));

		assert_eq!(notification.title, "[DiskFull] disk almost full");
		assert_eq!(notification.body, "/var is at 97%");
		assert_eq!(notification.icon, IconKind::Warning);
		assert_eq!(notification.urgency, Urgency::High);
		assert_eq!(notification.click_url.as_deref(), Some("http://prometheus.example/graph"));
	}

	#[test]
	fn empty_generator_url_has_no_click_target() {
		assert_eq!(Notification::for_alert(&alert("")).click_url, None);
	}

	#[test]
	fn click_waiters_are_capped() {
		let waiters = ClickWaiters::default();

		let mut held: Vec<_> = (0..MAX_CLICK_WAITERS).map(|_| waiters.try_acquire().unwrap()).collect();
		assert_eq!(waiters.active(), MAX_CLICK_WAITERS);
		assert!(waiters.try_acquire().is_none());

		held.pop();
		assert_eq!(waiters.active(), MAX_CLICK_WAITERS - 1);
		assert!(waiters.try_acquire().is_some());

		drop(held);
		assert_eq!(waiters.active(), 0);
	}

	#[test]
	fn teardown_drops_template() {
		let mut notifier = DesktopNotifier::new(String::from("test"), true);
		notifier.template();
		assert!(notifier.template.is_some());

		notifier.teardown();
		assert!(notifier.template.is_none());
		assert!(!notifier.is_live());
	}
}
