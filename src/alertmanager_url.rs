//! builds the alertmanager urls for polling the api and for opening the web ui

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

use crate::config_source::PollState;

/// characters left unescaped, same set as javascript's `encodeURIComponent`
const COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
	.remove(b'-')
	.remove(b'_')
	.remove(b'.')
	.remove(b'!')
	.remove(b'~')
	.remove(b'*')
	.remove(b'\'')
	.remove(b'(')
	.remove(b')');

/// fixed query selecting only active alerts
const ACTIVE_ONLY: &str = "silenced=false&inhibited=false&muted=false&active=true";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UrlMode {
	/// v2 alert groups endpoint
	Api,
	/// alert list of the web ui
	Web,
}

/// Returns the alertmanager url for `mode`, or `None` if no base url is
/// configured.
pub fn build_alertmanager_url(mode: UrlMode, state: &PollState) -> Option<String> {
	if state.base_url.is_empty() {
		return None;
	}

	let base = state.base_url.trim_end_matches('/');

	let mut url = match mode {
		UrlMode::Api => format!("{base}/api/v2/alerts/groups?{ACTIVE_ONLY}"),
		UrlMode::Web => format!("{base}/#/alerts?{ACTIVE_ONLY}"),
	};

	if !state.label_filter.is_empty() {
		let filter = match mode {
			UrlMode::Api => encode(&state.label_filter),
			// the web ui expects a matcher set literal
			UrlMode::Web => encode(&format!("{{{}}}", state.label_filter)),
		};
		url.push_str("&filter=");
		url.push_str(&filter);
	}

	if !state.receiver_filter.is_empty() {
		url.push_str("&receiver=");
		url.push_str(&encode(&state.receiver_filter));
	}

	Some(url)
}

fn encode(value: &str) -> String {
	utf8_percent_encode(value, COMPONENT).to_string()
}
