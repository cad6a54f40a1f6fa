//! Here we expose prometheus metrics about the notifier
use std::net::{IpAddr, SocketAddr};

use anyhow::{Context, Result};
use axum::{
	http::{header::CONTENT_TYPE, StatusCode},
	response::{IntoResponse, Response},
	routing::get,
	Router,
};
use prometheus::{Encoder, TextEncoder};
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct TelemetryEndpointSettings {
	pub bind_address: IpAddr,
	pub port: u16,
}

impl TelemetryEndpointSettings {
	pub fn to_socket_addr(&self) -> SocketAddr {
		SocketAddr::new(self.bind_address, self.port)
	}
}

async fn metrics_handler() -> Response {
	let mut buffer = vec![];
	let encoder = TextEncoder::new();
	let metric_families = prometheus::gather();

	if let Err(err) = encoder.encode(&metric_families, &mut buffer) {
		tracing::warn!("failed to encode metrics: {:?}", err);
		return StatusCode::INTERNAL_SERVER_ERROR.into_response();
	}

	([(CONTENT_TYPE, encoder.format_type().to_owned())], buffer).into_response()
}

fn router() -> Router {
	Router::new().route("/metrics", get(metrics_handler))
}

pub async fn run_telemetry_endpoint(settings: TelemetryEndpointSettings) -> Result<()> {
	let addr = settings.to_socket_addr();
	tracing::info!(%addr, "serving metrics");

	axum::Server::try_bind(&addr)
		.context("failed to bind telemetry endpoint")?
		.serve(router().into_make_service())
		.await
		.context("telemetry endpoint crashed")?;

	Ok(())
}

#[cfg(test)]
mod tests {
	use std::net::TcpListener;

	use super::*;
	use crate::metrics::PollerMetrics;

	#[tokio::test]
	async fn serves_poller_metrics() {
		PollerMetrics::global().unwrap().notifications.inc();

		let listener = TcpListener::bind("127.0.0.1:0").unwrap();
		let addr = listener.local_addr().unwrap();
		let server = axum::Server::from_tcp(listener).unwrap().serve(router().into_make_service());
		tokio::spawn(server);

		let body = reqwest::get(format!("http://{addr}/metrics")).await.unwrap().text().await.unwrap();

		assert!(body.contains("prometheus_notifier_poller_notifications_total"));
	}
}
