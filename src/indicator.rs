//! the alert counter shown to the user

use std::fmt;

use prometheus::IntGauge;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IconKind {
	/// nothing to report
	Neutral,
	/// at least one alert is active
	Warning,
}

impl IconKind {
	/// freedesktop icon name
	pub fn icon_name(self) -> &'static str {
		match self {
			IconKind::Neutral => "emblem-ok-symbolic",
			IconKind::Warning => "dialog-warning-symbolic",
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// what the indicator currently renders
pub enum IndicatorState {
	/// no poll succeeded yet
	Unknown,
	Clear,
	Firing(usize),
}

impl IndicatorState {
	pub fn from_count(count: usize) -> Self {
		match count {
			0 => IndicatorState::Clear,
			n => IndicatorState::Firing(n),
		}
	}

	pub fn icon(self) -> IconKind {
		match self {
			IndicatorState::Unknown | IndicatorState::Clear => IconKind::Neutral,
			IndicatorState::Firing(_) => IconKind::Warning,
		}
	}

	/// counter text, `None` when the counter is hidden
	pub fn label(self) -> Option<String> {
		match self {
			IndicatorState::Unknown => Some(String::from("~")),
			IndicatorState::Clear => None,
			IndicatorState::Firing(n) => Some(n.to_string()),
		}
	}
}

impl fmt::Display for IndicatorState {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self.label() {
			Some(label) => write!(f, "{} {}", self.icon().icon_name(), label),
			None => f.write_str(self.icon().icon_name()),
		}
	}
}

/// receives the number of active alerts after every successful poll
pub trait IndicatorSink: Send {
	fn set_count(&mut self, count: usize);
}

/// Logs indicator changes and exports the count as a gauge.
#[derive(Debug)]
pub struct LogIndicator {
	state: IndicatorState,
	gauge: IntGauge,
}

impl LogIndicator {
	pub fn new(gauge: IntGauge) -> Self {
		Self { state: IndicatorState::Unknown, gauge }
	}

	#[cfg(test)]
	pub fn state(&self) -> IndicatorState {
		self.state
	}
}

impl IndicatorSink for LogIndicator {
	fn set_count(&mut self, count: usize) {
		self.gauge.set(i64::try_from(count).unwrap_or(i64::MAX));

		let state = IndicatorState::from_count(count);
		if state != self.state {
			tracing::info!(count, indicator = %state, "active alerts changed");
			self.state = state;
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn zero_hides_counter() {
		let state = IndicatorState::from_count(0);
		assert_eq!(state.icon(), IconKind::Neutral);
		assert_eq!(state.label(), None);
	}

	#[test]
	fn firing_shows_counter() {
		let state = IndicatorState::from_count(3);
		assert_eq!(state.icon(), IconKind::Warning);
		assert_eq!(state.label().as_deref(), Some("3"));
	}

	#[test]
	fn log_indicator_tracks_count() {
		let gauge = IntGauge::new("test_active_alerts", "test gauge").unwrap();
		let mut indicator = LogIndicator::new(gauge.clone());
		assert_eq!(indicator.state(), IndicatorState::Unknown);
		assert_eq!(indicator.state().label().as_deref(), Some("~"));

		indicator.set_count(2);
		assert_eq!(indicator.state(), IndicatorState::Firing(2));
		assert_eq!(gauge.get(), 2);

		indicator.set_count(0);
		assert_eq!(indicator.state(), IndicatorState::Clear);
		assert_eq!(gauge.get(), 0);
	}
}
