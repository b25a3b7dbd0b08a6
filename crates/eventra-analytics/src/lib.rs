// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Eventra product analytics SDK.
//!
//! Events are stamped with a timestamp and an anonymous session id, queued
//! in memory and delivered to the ingestion endpoint in batches.
//!
//! # Features
//!
//! - **Batching**: immediate flush at `batch_size` events, otherwise after a
//!   debounce interval
//! - **Retry with backoff**: failed batches go back to the front of the
//!   queue and are retried after `2^n` seconds plus jitter
//! - **Ordering**: one flush in flight at a time; events arrive in the order
//!   they were tracked
//! - **Offline aware**: no network calls while the platform reports offline
//! - **Unload flush**: the remaining queue is handed to a beacon on page hide
//! - **Integration helpers**: route-change page views, scroll-depth
//!   milestones and error capture
//!
//! # Example
//!
//! ```ignore
//! use eventra_analytics::{AnalyticsClient, AnalyticsConfig, Search, UnloadHook};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = AnalyticsConfig::load(None)?;
//!     let client = AnalyticsClient::builder().config(config).build()?;
//!     let _unload = UnloadHook::spawn(&client);
//!
//!     client.track_search(Search {
//!         query: "rooftop".into(),
//!         filters: None,
//!         result_count: Some(12),
//!     });
//!
//!     client.shutdown().await;
//!     Ok(())
//! }
//! ```

mod batch;
mod client;
mod config;
mod error;
mod native;
mod platform;
mod provider;
mod queue;
mod scheduler;
mod session;
mod transport;
mod unload;

#[cfg(test)]
mod test_support;

pub use batch::{BatchConfig, BatchProcessor, FlushOutcome};
pub use client::{AnalyticsClient, AnalyticsClientBuilder};
pub use config::{
	AnalyticsConfig, AnalyticsConfigLayer, ConfigError, DEFAULT_BATCH_SIZE, DEFAULT_ENDPOINT,
	DEFAULT_FLUSH_INTERVAL, DEFAULT_MAX_QUEUE_SIZE, DEFAULT_MAX_RETRY, DEFAULT_REQUEST_TIMEOUT,
};
pub use error::{AnalyticsError, Result};
pub use native::NativePlatform;
pub use platform::{
	Beacon, Lifecycle, MemoryPlatform, Platform, SharedPlatform, StorageError, StorageFailure,
};
pub use provider::{
	page_name_for, AnalyticsContext, ErrorCapture, PageViewTracker, ScrollDepthTracker,
	ScrollSample, SCROLL_DEPTH_ELEMENT_TYPE, SCROLL_MILESTONES,
};
pub use queue::EventQueue;
pub use scheduler::FlushTimer;
pub use session::SessionIdProvider;
pub use transport::{HttpTransport, Transport};
pub use unload::UnloadHook;

// Re-export core types for convenience
pub use eventra_analytics_core::{
	AnalyticsEvent, CardImpression, CityScrollerImpression, CityScrollerSelect, CityScrollerSnap,
	Click, Cta, CtaResult, DeepLinkOpen, ErrorReport, EventBatch, EventData, EventKind, PageView,
	Properties, Search, Stamped,
};
