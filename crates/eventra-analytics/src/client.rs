// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Analytics client: typed emitters over the batch processor.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use eventra_analytics_core::{
	now_millis, CardImpression, CityScrollerImpression, CityScrollerSelect, CityScrollerSnap,
	Click, Cta, DeepLinkOpen, ErrorReport, EventBatch, EventData, PageView, Search,
};
use tokio::runtime::Handle;
use tracing::{debug, info, trace, warn};

use crate::batch::{BatchConfig, BatchProcessor, FlushOutcome};
use crate::config::AnalyticsConfig;
use crate::error::{AnalyticsError, Result};
use crate::native::NativePlatform;
use crate::platform::{MemoryPlatform, SharedPlatform};
use crate::session::SessionIdProvider;
use crate::transport::{HttpTransport, Transport};

/// Builder for constructing an [`AnalyticsClient`].
pub struct AnalyticsClientBuilder {
	config: AnalyticsConfig,
	transport: Option<Arc<dyn Transport>>,
	platform: Option<SharedPlatform>,
	runtime: Option<Handle>,
}

impl AnalyticsClientBuilder {
	pub fn new() -> Self {
		Self {
			config: AnalyticsConfig::default(),
			transport: None,
			platform: None,
			runtime: None,
		}
	}

	/// Replaces the whole configuration, e.g. one from [`AnalyticsConfig::load`].
	pub fn config(mut self, config: AnalyticsConfig) -> Self {
		self.config = config;
		self
	}

	/// Example: `https://eventra.example.com`
	pub fn base_url(mut self, url: impl Into<String>) -> Self {
		self.config.base_url = Some(url.into());
		self
	}

	/// Absolute URL, or a path joined onto the base URL.
	pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
		self.config.endpoint = endpoint.into();
		self
	}

	pub fn batch_size(mut self, size: usize) -> Self {
		self.config.batch_size = size;
		self
	}

	pub fn flush_interval(mut self, interval: Duration) -> Self {
		self.config.flush_interval = interval;
		self
	}

	pub fn max_retry(mut self, max_retry: u32) -> Self {
		self.config.max_retry = max_retry;
		self
	}

	pub fn max_queue_size(mut self, size: usize) -> Self {
		self.config.max_queue_size = size;
		self
	}

	pub fn request_timeout(mut self, timeout: Duration) -> Self {
		self.config.request_timeout = timeout;
		self
	}

	pub fn enabled(mut self, enabled: bool) -> Self {
		self.config.enabled = enabled;
		self
	}

	/// Uses a custom transport instead of HTTP.
	pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
		self.transport = Some(transport);
		self
	}

	pub fn platform(mut self, platform: SharedPlatform) -> Self {
		self.platform = Some(platform);
		self
	}

	/// Runtime for flush and timer tasks. Defaults to the current runtime.
	pub fn runtime(mut self, runtime: Handle) -> Self {
		self.runtime = Some(runtime);
		self
	}

	pub fn build(self) -> Result<AnalyticsClient> {
		let config = self.config;
		config.validate()?;

		let runtime = match self.runtime {
			Some(runtime) => runtime,
			None => Handle::try_current().map_err(|_| AnalyticsError::NoRuntime)?,
		};

		let endpoint = match (config.resolved_endpoint(), &self.transport) {
			(Ok(endpoint), _) => endpoint,
			(Err(_), Some(_)) => config.endpoint.clone(),
			(Err(e), None) => return Err(e),
		};

		let transport = match self.transport {
			Some(transport) => transport,
			None => {
				let http_client = eventra_common_http::new_client_with_timeout(config.request_timeout)?;
				Arc::new(HttpTransport::new(http_client, endpoint.clone()))
			}
		};

		let platform = match self.platform {
			Some(platform) => platform,
			None => default_platform(),
		};

		let session = SessionIdProvider::new(platform.clone());
		let processor = BatchProcessor::new(
			BatchConfig::from(&config),
			transport,
			platform.clone(),
			runtime.clone(),
		);

		info!(
			endpoint = %endpoint,
			batch_size = config.batch_size,
			flush_interval_ms = config.flush_interval.as_millis() as u64,
			enabled = config.enabled,
			"Analytics client initialized"
		);

		Ok(AnalyticsClient {
			inner: Arc::new(ClientInner {
				config,
				endpoint,
				processor,
				session,
				platform,
				runtime,
				closed: AtomicBool::new(false),
			}),
		})
	}
}

impl Default for AnalyticsClientBuilder {
	fn default() -> Self {
		Self::new()
	}
}

fn default_platform() -> SharedPlatform {
	match NativePlatform::new() {
		Some(platform) => Arc::new(platform),
		None => {
			warn!("No data directory available, session id will not persist");
			Arc::new(MemoryPlatform::new())
		}
	}
}

struct ClientInner {
	config: AnalyticsConfig,
	endpoint: String,
	processor: BatchProcessor,
	session: SessionIdProvider,
	platform: SharedPlatform,
	runtime: Handle,
	closed: AtomicBool,
}

/// Client for tracking product analytics events.
///
/// Tracking is synchronous and never fails: events are stamped with the
/// current time and session id, queued, and delivered in the background.
///
/// # Example
///
/// ```ignore
/// use eventra_analytics::{AnalyticsClient, Click};
///
/// let client = AnalyticsClient::builder()
///     .base_url("https://eventra.example.com")
///     .build()?;
///
/// client.track_click(Click {
///     element_name: "book_now".into(),
///     element_type: "button".into(),
///     page_name: "hotel_detail".into(),
///     destination: None,
/// });
///
/// client.shutdown().await;
/// ```
#[derive(Clone)]
pub struct AnalyticsClient {
	inner: Arc<ClientInner>,
}

impl AnalyticsClient {
	pub fn builder() -> AnalyticsClientBuilder {
		AnalyticsClientBuilder::new()
	}

	/// Stamps and queues an event.
	pub fn track(&self, data: impl Into<EventData>) {
		let data = data.into();
		if self.inner.closed.load(Ordering::SeqCst) {
			debug!(event_name = %data.kind(), "Client shut down, dropping event");
			return;
		}
		if !self.inner.config.enabled {
			trace!(event_name = %data.kind(), "Analytics disabled, dropping event");
			return;
		}

		let event = data.stamp(now_millis(), self.session_id());
		let kind = event.kind();
		match self.inner.processor.enqueue(event) {
			Ok(()) => trace!(event_name = %kind, "Event queued"),
			Err(e) => debug!(event_name = %kind, error = %e, "Event not queued"),
		}
	}

	pub fn track_page_view(&self, event: PageView) {
		self.track(event);
	}

	pub fn track_click(&self, event: Click) {
		self.track(event);
	}

	pub fn track_city_scroller_impression(&self, event: CityScrollerImpression) {
		self.track(event);
	}

	pub fn track_city_scroller_snap(&self, event: CityScrollerSnap) {
		self.track(event);
	}

	pub fn track_city_scroller_select(&self, event: CityScrollerSelect) {
		self.track(event);
	}

	pub fn track_card_impression(&self, event: CardImpression) {
		self.track(event);
	}

	pub fn track_deep_link_open(&self, event: DeepLinkOpen) {
		self.track(event);
	}

	pub fn track_search(&self, event: Search) {
		self.track(event);
	}

	pub fn track_cta(&self, event: Cta) {
		self.track(event);
	}

	pub fn track_error(&self, event: ErrorReport) {
		self.track(event);
	}

	/// The persistent anonymous session identifier.
	pub fn session_id(&self) -> String {
		self.inner.session.session_id()
	}

	/// Attempts to deliver one batch now.
	pub async fn flush(&self) -> FlushOutcome {
		self.inner.processor.flush().await
	}

	/// Hands every queued event to the platform beacon in one payload.
	///
	/// Best effort: no retry, and events are not requeued if the platform
	/// refuses the beacon. Returns whether a beacon was handed off.
	pub fn flush_on_unload(&self) -> bool {
		let events = self.inner.processor.drain();
		if events.is_empty() {
			return false;
		}

		let count = events.len();
		let body = match EventBatch::new(events).to_json_vec() {
			Ok(body) => body,
			Err(e) => {
				warn!(error = %e, count, "Failed to encode unload batch");
				return false;
			}
		};

		let accepted = self.inner.platform.send_beacon(&self.inner.endpoint, body);
		if accepted {
			debug!(count, "Unload batch handed to beacon");
		} else {
			warn!(count, "Beacon refused unload batch");
		}
		accepted
	}

	pub fn queue_len(&self) -> usize {
		self.inner.processor.queue_len()
	}

	pub fn retry_count(&self) -> u32 {
		self.inner.processor.retry_count()
	}

	/// Delay of the pending flush or retry timer, if any.
	pub fn pending_flush_delay(&self) -> Option<Duration> {
		self.inner.processor.pending_delay()
	}

	pub fn dropped_count(&self) -> u64 {
		self.inner.processor.dropped_count()
	}

	pub fn endpoint(&self) -> &str {
		&self.inner.endpoint
	}

	pub fn config(&self) -> &AnalyticsConfig {
		&self.inner.config
	}

	pub fn platform(&self) -> &SharedPlatform {
		&self.inner.platform
	}

	/// Runtime the client's background tasks are spawned on.
	pub(crate) fn runtime(&self) -> &Handle {
		&self.inner.runtime
	}

	/// Clears queued events, retry state and the pending timer.
	pub fn reset(&self) {
		self.inner.processor.reset();
	}

	/// Stops accepting events and makes a final delivery attempt.
	pub async fn shutdown(&self) {
		if self.inner.closed.swap(true, Ordering::SeqCst) {
			return;
		}
		let remaining = self.inner.processor.shutdown().await;
		info!(remaining, "Analytics client shut down");
	}

	pub fn is_closed(&self) -> bool {
		self.inner.closed.load(Ordering::SeqCst)
	}
}
