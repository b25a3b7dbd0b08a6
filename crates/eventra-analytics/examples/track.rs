// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Tracks a short browsing session and flushes it.
//!
//! ```sh
//! EVENTRA_ANALYTICS_BASE_URL=http://localhost:8080 \
//! RUST_LOG=eventra_analytics=debug \
//! cargo run -p eventra-analytics --example track
//! ```

use std::path::PathBuf;

use eventra_analytics::{
	AnalyticsClient, AnalyticsConfig, AnalyticsContext, CardImpression, ErrorCapture,
	PageViewTracker, ScrollDepthTracker, ScrollSample, Search, UnloadHook,
};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
	tracing_subscriber::fmt()
		.with_env_filter(
			EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
		)
		.init();

	let config_path = std::env::args().nth(1).map(PathBuf::from);
	let config = AnalyticsConfig::load(config_path.as_deref())?;
	let client = AnalyticsClient::builder().config(config).build()?;
	let _unload = UnloadHook::spawn(&client);

	let context = AnalyticsContext::new(client.clone());
	ErrorCapture::new(context.clone()).install_panic_hook();

	let mut pages = PageViewTracker::new(context.clone());
	pages.on_route_change("/");
	pages.on_route_change("/hotels");

	client.track_search(Search {
		query: "rooftop".into(),
		filters: None,
		result_count: Some(4),
	});
	for position in 0..4 {
		client.track_card_impression(CardImpression {
			entity_type: "hotel".into(),
			entity_id: format!("hotel_{position}"),
			position,
		});
	}

	let mut scroll = ScrollDepthTracker::new(context.clone(), "hotels");
	for top in [200.0, 600.0, 1200.0] {
		if scroll.on_scroll(ScrollSample::new(top, 800.0, 2000.0)) {
			scroll.on_frame();
		}
	}

	tracing::info!(
		session_id = %client.session_id(),
		queued = client.queue_len(),
		"Session tracked"
	);

	client.shutdown().await;
	Ok(())
}
