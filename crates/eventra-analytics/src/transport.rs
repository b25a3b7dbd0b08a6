// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Delivery of event batches to the ingestion endpoint.

use async_trait::async_trait;
use eventra_analytics_core::EventBatch;
use reqwest::Client;
use tracing::{debug, instrument};

use crate::error::{AnalyticsError, Result};

/// Sends one batch. Any error causes the batch to be requeued and retried.
#[async_trait]
pub trait Transport: Send + Sync {
	async fn send_batch(&self, batch: &EventBatch) -> Result<()>;
}

/// POSTs `{"events": [...]}` as JSON.
pub struct HttpTransport {
	http_client: Client,
	endpoint: String,
}

impl HttpTransport {
	pub fn new(http_client: Client, endpoint: impl Into<String>) -> Self {
		Self {
			http_client,
			endpoint: endpoint.into(),
		}
	}

	pub fn endpoint(&self) -> &str {
		&self.endpoint
	}
}

#[async_trait]
impl Transport for HttpTransport {
	#[instrument(skip(self, batch), fields(count = batch.len(), endpoint = %self.endpoint))]
	async fn send_batch(&self, batch: &EventBatch) -> Result<()> {
		let response = self
			.http_client
			.post(&self.endpoint)
			.json(batch)
			.send()
			.await?;

		let status = response.status();
		if status.is_success() {
			debug!(status = status.as_u16(), "Batch delivered");
			return Ok(());
		}

		let message = response.text().await.unwrap_or_default();
		Err(AnalyticsError::ServerError {
			status: status.as_u16(),
			message,
		})
	}
}
