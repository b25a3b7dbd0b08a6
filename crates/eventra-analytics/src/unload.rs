// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Flush on page teardown.

use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::client::AnalyticsClient;
use crate::platform::Lifecycle;

/// Listens for platform lifecycle signals and beacons the queue when the
/// page is hidden or torn down. Stops listening when dropped.
pub struct UnloadHook {
	handle: JoinHandle<()>,
}

impl UnloadHook {
	/// Subscribes immediately, so signals emitted after this returns are seen.
	pub fn spawn(client: &AnalyticsClient) -> Self {
		let mut signals = client.platform().subscribe_lifecycle();
		let runtime = client.runtime().clone();
		let client = client.clone();

		let handle = runtime.spawn(async move {
			loop {
				match signals.recv().await {
					Ok(Lifecycle::PageHide) | Ok(Lifecycle::Hidden) => {
						if client.flush_on_unload() {
							debug!("Flushed analytics queue on page hide");
						}
					}
					Ok(Lifecycle::Visible) => {}
					Err(RecvError::Lagged(skipped)) => {
						warn!(skipped, "Lifecycle listener lagged");
					}
					Err(RecvError::Closed) => break,
				}
			}
		});

		Self { handle }
	}

	pub fn is_finished(&self) -> bool {
		self.handle.is_finished()
	}
}

impl Drop for UnloadHook {
	fn drop(&mut self) {
		self.handle.abort();
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::platform::MemoryPlatform;
	use crate::test_support::{click, MockTransport};
	use std::sync::Arc;

	async fn settle() {
		for _ in 0..10 {
			tokio::task::yield_now().await;
		}
	}

	fn client(platform: Arc<MemoryPlatform>) -> AnalyticsClient {
		AnalyticsClient::builder()
			.transport(MockTransport::new())
			.platform(platform)
			.build()
			.unwrap()
	}

	#[tokio::test(start_paused = true)]
	async fn page_hide_beacons_queue() {
		let platform = Arc::new(MemoryPlatform::new());
		let client = client(platform.clone());
		let _hook = UnloadHook::spawn(&client);

		client.track(click("a"));
		client.track(click("b"));
		platform.emit(Lifecycle::PageHide);
		settle().await;

		assert_eq!(platform.beacons().len(), 1);
		assert_eq!(client.queue_len(), 0);
	}

	#[tokio::test(start_paused = true)]
	async fn hidden_also_flushes() {
		let platform = Arc::new(MemoryPlatform::new());
		let client = client(platform.clone());
		let _hook = UnloadHook::spawn(&client);

		client.track(click("a"));
		platform.emit(Lifecycle::Hidden);
		settle().await;

		assert_eq!(platform.beacons().len(), 1);
	}

	#[tokio::test(start_paused = true)]
	async fn visible_does_nothing() {
		let platform = Arc::new(MemoryPlatform::new());
		let client = client(platform.clone());
		let _hook = UnloadHook::spawn(&client);

		client.track(click("a"));
		platform.emit(Lifecycle::Visible);
		settle().await;

		assert!(platform.beacons().is_empty());
		assert_eq!(client.queue_len(), 1);
	}

	#[tokio::test(start_paused = true)]
	async fn empty_queue_sends_nothing() {
		let platform = Arc::new(MemoryPlatform::new());
		let client = client(platform.clone());
		let _hook = UnloadHook::spawn(&client);

		platform.emit(Lifecycle::PageHide);
		settle().await;

		assert!(platform.beacons().is_empty());
	}

	#[tokio::test(start_paused = true)]
	async fn dropped_hook_stops_listening() {
		let platform = Arc::new(MemoryPlatform::new());
		let client = client(platform.clone());
		let hook = UnloadHook::spawn(&client);
		drop(hook);
		settle().await;

		client.track(click("a"));
		assert_eq!(platform.emit(Lifecycle::PageHide), 0);
		settle().await;

		assert!(platform.beacons().is_empty());
	}

	#[test]
	fn hook_uses_configured_runtime_outside_async_context() {
		let runtime = tokio::runtime::Builder::new_multi_thread()
			.worker_threads(1)
			.enable_all()
			.build()
			.unwrap();
		let platform = Arc::new(MemoryPlatform::new());
		let client = AnalyticsClient::builder()
			.transport(MockTransport::new())
			.platform(platform.clone())
			.runtime(runtime.handle().clone())
			.build()
			.unwrap();
		let hook = UnloadHook::spawn(&client);

		client.track(click("a"));
		platform.emit(Lifecycle::PageHide);
		for _ in 0..100 {
			if !platform.beacons().is_empty() {
				break;
			}
			std::thread::sleep(std::time::Duration::from_millis(10));
		}

		assert_eq!(platform.beacons().len(), 1);
		assert!(!hook.is_finished());
	}
}
