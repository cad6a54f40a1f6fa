//! fetching alert groups from alertmanager

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use crate::{
	alert::{self, AlertGroup},
	poller::PollError,
};

#[async_trait]
pub trait AlertSource: Send + Sync {
	/// GET `url` and parse the body as alert groups
	async fn fetch(&self, url: &str) -> Result<Vec<AlertGroup>, PollError>;
}

/// reqwest backed [AlertSource]
#[derive(Debug, Clone)]
pub struct HttpAlertSource {
	client: Client,
}

impl HttpAlertSource {
	pub fn new(request_timeout: Duration) -> Result<Self, reqwest::Error> {
		let client = Client::builder()
			.timeout(request_timeout)
			.user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
			.build()?;

		Ok(Self { client })
	}
}

#[async_trait]
impl AlertSource for HttpAlertSource {
	async fn fetch(&self, url: &str) -> Result<Vec<AlertGroup>, PollError> {
		let response = self.client.get(url).send().await?;

		let status = response.status();
		if !status.is_success() {
			return Err(PollError::Status(status));
		}

		let body = response.bytes().await?;

		Ok(alert::parse_groups(&body)?)
	}
}
