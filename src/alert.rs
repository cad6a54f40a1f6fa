//! data structures for deserializing the alertmanager v2 `alerts/groups`
//! response
use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
/// one element of the array returned by `/api/v2/alerts/groups`
pub struct AlertGroup {
	/// alerts of this group in server order
	pub alerts: Vec<Alert>,
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
/// a single active alert
pub struct Alert {
	/// time the alert started firing
	pub starts_at: DateTime<Utc>,
	/// link to the expression that generated the alert, empty if the sender
	/// didn't set one
	#[serde(rename = "generatorURL", default)]
	pub generator_url: String,
	pub labels: HashMap<String, String>,
	pub annotations: HashMap<String, String>,
}

impl Alert {
	/// label value, empty if the label isn't set
	pub fn label(&self, name: &str) -> &str {
		self.labels.get(name).map_or("", String::as_str)
	}

	/// annotation value, empty if the annotation isn't set
	pub fn annotation(&self, name: &str) -> &str {
		self.annotations.get(name).map_or("", String::as_str)
	}
}

/// parse a response body into alert groups
pub fn parse_groups(body: &[u8]) -> Result<Vec<AlertGroup>, serde_json::Error> {
	serde_json::from_slice(body)
}

#[cfg(test)]
mod tests {
	use chrono::TimeZone;

	use super::*;

	const RESPONSE: &str = r#"[
		{
			"labels": { "alertname": "HighLatency" },
			"receiver": { "name": "team-ops" },
			"alerts": [
				{
					"annotations": { "summary": "p99 above 2s", "description": "api latency is high" },
					"endsAt": "2022-06-01T12:30:00.000Z",
					"fingerprint": "0f3a9c1e2b4d5f60",
					"receivers": [ { "name": "team-ops" } ],
					"startsAt": "2022-06-01T12:00:00.123Z",
					"status": { "inhibitedBy": [], "silencedBy": [], "state": "active" },
					"updatedAt": "2022-06-01T12:01:00.000Z",
					"generatorURL": "http://prometheus.example/graph?g0.expr=latency",
					"labels": { "alertname": "HighLatency", "severity": "critical" }
				}
			]
		},
		{
			"labels": {},
			"receiver": { "name": "default" },
			"alerts": []
		}
	]"#;

	#[test]
	fn parses_v2_groups() {
		let groups = parse_groups(RESPONSE.as_bytes()).unwrap();

		assert_eq!(groups.len(), 2);
		assert!(groups[1].alerts.is_empty());

		let alert = &groups[0].alerts[0];
		assert_eq!(alert.label("alertname"), "HighLatency");
		assert_eq!(alert.annotation("summary"), "p99 above 2s");
		assert_eq!(alert.generator_url, "http://prometheus.example/graph?g0.expr=latency");
		assert_eq!(
			alert.starts_at,
			Utc.timestamp_opt(1_654_084_800, 123_000_000).unwrap()
		);
	}

	#[test]
	fn missing_keys_render_empty() {
		let groups = parse_groups(
			br#"[{"alerts":[{"startsAt":"2022-06-01T12:00:00Z","generatorURL":"","labels":{},"annotations":{}}]}]"#,
		)
		.unwrap();

		let alert = &groups[0].alerts[0];
		assert_eq!(alert.label("alertname"), "");
		assert_eq!(alert.annotation("description"), "");
	}

	#[test]
	fn missing_generator_url_is_empty() {
		let groups = parse_groups(
			br#"[{"alerts":[
				{"startsAt":"2022-06-01T12:00:00Z","labels":{"alertname":"FromAmtool"},"annotations":{}},
				{"startsAt":"2022-06-01T12:00:00Z","generatorURL":"http://prometheus.example/graph","labels":{},"annotations":{}}
			]}]"#,
		)
		.unwrap();

		assert_eq!(groups[0].alerts.len(), 2);
		assert_eq!(groups[0].alerts[0].generator_url, "");
		assert_eq!(groups[0].alerts[1].generator_url, "http://prometheus.example/graph");
	}

	#[test]
	fn rejects_missing_starts_at() {
		let result = parse_groups(
			br#"[{"alerts":[{"generatorURL":"","labels":{},"annotations":{}}]}]"#,
		);
		assert!(result.is_err());
	}

	#[test]
	fn rejects_non_array_body() {
		assert!(parse_groups(br#"{"status":"success","data":[]}"#).is_err());
		assert!(parse_groups(b"<html>bad gateway</html>").is_err());
	}
}
