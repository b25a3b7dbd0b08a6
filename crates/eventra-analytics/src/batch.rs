// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Event batching, flush triggers and retry with backoff.
//!
//! The processor owns the queue, the retry counter and the flush timer. A
//! flush is started by the size trigger (queue reaches `batch_size`), by the
//! debounce timer (`flush_interval` after the first unflushed event), or by a
//! retry timer after a failed send. At most one send is in flight.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use eventra_analytics_core::{AnalyticsEvent, EventBatch};
use eventra_common_http::BackoffConfig;
use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::sync::Notify;
use tracing::{debug, info, warn};

use crate::config::AnalyticsConfig;
use crate::error::{AnalyticsError, Result};
use crate::platform::SharedPlatform;
use crate::queue::EventQueue;
use crate::scheduler::FlushTimer;
use crate::transport::Transport;

/// Configuration for the event batch queue.
#[derive(Debug, Clone)]
pub struct BatchConfig {
	/// Events per request; reaching it triggers an immediate flush.
	pub batch_size: usize,
	pub flush_interval: Duration,
	/// Maximum number of events to queue before dropping oldest.
	pub max_queue_size: usize,
	pub request_timeout: Duration,
	pub backoff: BackoffConfig,
}

impl Default for BatchConfig {
	fn default() -> Self {
		Self::from(&AnalyticsConfig::default())
	}
}

impl From<&AnalyticsConfig> for BatchConfig {
	fn from(config: &AnalyticsConfig) -> Self {
		Self {
			batch_size: config.batch_size,
			flush_interval: config.flush_interval,
			max_queue_size: config.max_queue_size,
			request_timeout: config.request_timeout,
			backoff: config.backoff(),
		}
	}
}

/// What a call to [`BatchProcessor::flush`] did.
#[derive(Debug, Clone, PartialEq)]
pub enum FlushOutcome {
	/// Nothing was queued.
	Idle,
	/// Another flush was already in flight.
	InFlight,
	/// The platform reported no connectivity; a later attempt is scheduled.
	Offline,
	Delivered(usize),
	/// The batch was requeued and a retry scheduled after `backoff`.
	Failed { retry_count: u32, backoff: Duration },
}

struct ProcessorInner {
	config: BatchConfig,
	transport: Arc<dyn Transport>,
	platform: SharedPlatform,
	runtime: Handle,
	queue: Mutex<EventQueue>,
	retry_count: AtomicU32,
	flushing: AtomicBool,
	flush_done: Notify,
	timer: FlushTimer,
	shutdown: AtomicBool,
}

/// Clears the in-flight flag when the flush future completes or is dropped,
/// and wakes anyone waiting for it.
struct FlushingGuard<'a>(&'a ProcessorInner);

impl Drop for FlushingGuard<'_> {
	fn drop(&mut self) {
		self.0.flushing.store(false, Ordering::SeqCst);
		self.0.flush_done.notify_waiters();
	}
}

/// Queue plus delivery state machine. Cloning shares the same state.
#[derive(Clone)]
pub struct BatchProcessor {
	inner: Arc<ProcessorInner>,
}

impl BatchProcessor {
	pub fn new(
		config: BatchConfig,
		transport: Arc<dyn Transport>,
		platform: SharedPlatform,
		runtime: Handle,
	) -> Self {
		let queue = EventQueue::new(config.max_queue_size);
		let timer = FlushTimer::new(runtime.clone());
		Self {
			inner: Arc::new(ProcessorInner {
				config,
				transport,
				platform,
				runtime,
				queue: Mutex::new(queue),
				retry_count: AtomicU32::new(0),
				flushing: AtomicBool::new(false),
				flush_done: Notify::new(),
				timer,
				shutdown: AtomicBool::new(false),
			}),
		}
	}

	pub fn config(&self) -> &BatchConfig {
		&self.inner.config
	}

	/// Appends an event and applies the flush triggers.
	pub fn enqueue(&self, event: AnalyticsEvent) -> Result<()> {
		if self.is_shutdown() {
			return Err(AnalyticsError::ClientShutdown);
		}

		let len = self.inner.queue.lock().enqueue(event);

		if len >= self.inner.config.batch_size {
			debug!(queue_len = len, "Batch size reached, flushing");
			let this = self.clone();
			self.inner.runtime.spawn(async move {
				this.flush().await;
			});
		} else {
			self.schedule_flush();
		}

		Ok(())
	}

	/// Attempts to deliver one batch from the front of the queue.
	///
	/// Delivery errors are logged and handled by requeue and retry; they are
	/// reported only through the returned [`FlushOutcome`].
	pub async fn flush(&self) -> FlushOutcome {
		let inner = &self.inner;
		if inner
			.flushing
			.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
			.is_err()
		{
			return FlushOutcome::InFlight;
		}
		let guard = FlushingGuard(inner);

		if inner.queue.lock().is_empty() {
			return FlushOutcome::Idle;
		}

		if !inner.platform.is_online() {
			drop(guard);
			debug!("Offline, deferring flush");
			self.schedule_flush();
			return FlushOutcome::Offline;
		}

		let batch = EventBatch::new(inner.queue.lock().take_batch(inner.config.batch_size));
		if batch.is_empty() {
			return FlushOutcome::Idle;
		}
		let count = batch.len();
		debug!(count, "Flushing event batch");

		let timeout = inner.config.request_timeout;
		let result = match tokio::time::timeout(timeout, inner.transport.send_batch(&batch)).await {
			Ok(result) => result,
			Err(_) => Err(AnalyticsError::Timeout(timeout)),
		};

		let outcome = match result {
			Ok(()) => {
				inner.retry_count.store(0, Ordering::SeqCst);
				FlushOutcome::Delivered(count)
			}
			Err(e) => {
				inner.queue.lock().requeue_front(batch.into_events());
				let retry_count = self.bump_retry_count();
				let backoff = inner.config.backoff.delay_for(retry_count);
				warn!(
					error = %e,
					count,
					retry_count,
					backoff_ms = backoff.as_millis() as u64,
					"Failed to deliver analytics batch, will retry"
				);
				self.schedule_retry(backoff);
				FlushOutcome::Failed {
					retry_count,
					backoff,
				}
			}
		};

		drop(guard);
		if !inner.queue.lock().is_empty() {
			self.schedule_flush();
		}
		outcome
	}

	fn bump_retry_count(&self) -> u32 {
		let max = self.inner.config.backoff.max_attempts;
		let previous = self
			.inner
			.retry_count
			.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| {
				Some(n.saturating_add(1).min(max))
			})
			.unwrap_or(max);
		previous.saturating_add(1).min(max)
	}

	async fn wait_for_flush(&self) {
		let mut done = std::pin::pin!(self.inner.flush_done.notified());
		done.as_mut().enable();
		if self.is_flushing() {
			done.await;
		}
	}

	/// Ensures a flush runs after `flush_interval` unless one is already pending.
	pub fn schedule_flush(&self) {
		if self.is_shutdown() {
			return;
		}
		let weak = Arc::downgrade(&self.inner);
		self
			.inner
			.timer
			.schedule(self.inner.config.flush_interval, move || {
				flush_if_alive(weak)
			});
	}

	/// Replaces any pending timer with a retry after `delay`.
	pub fn schedule_retry(&self, delay: Duration) {
		if self.is_shutdown() {
			return;
		}
		let weak = Arc::downgrade(&self.inner);
		self.inner.timer.reschedule(delay, move || flush_if_alive(weak));
	}

	pub fn queue_len(&self) -> usize {
		self.inner.queue.lock().len()
	}

	pub fn retry_count(&self) -> u32 {
		self.inner.retry_count.load(Ordering::SeqCst)
	}

	pub fn is_flushing(&self) -> bool {
		self.inner.flushing.load(Ordering::SeqCst)
	}

	/// Delay of the pending flush or retry timer, if any.
	pub fn pending_delay(&self) -> Option<Duration> {
		self.inner.timer.pending_delay()
	}

	pub fn dropped_count(&self) -> u64 {
		self.inner.queue.lock().dropped_count()
	}

	/// Removes every queued event and cancels the pending timer.
	pub fn drain(&self) -> Vec<AnalyticsEvent> {
		self.inner.timer.cancel();
		self.inner.queue.lock().drain()
	}

	/// Returns the processor to its initial state: empty queue, no timer,
	/// zero retries.
	pub fn reset(&self) {
		self.inner.timer.cancel();
		self.inner.queue.lock().clear();
		self.inner.retry_count.store(0, Ordering::SeqCst);
	}

	pub fn is_shutdown(&self) -> bool {
		self.inner.shutdown.load(Ordering::SeqCst)
	}

	/// Stops accepting events and makes a final delivery pass.
	///
	/// A flush already in flight is awaited first. Batches are then sent until
	/// the queue is empty or a send does not succeed. Returns the number of
	/// events still queued.
	pub async fn shutdown(&self) -> usize {
		if self.inner.shutdown.swap(true, Ordering::SeqCst) {
			return self.queue_len();
		}
		self.inner.timer.cancel();

		loop {
			match self.flush().await {
				FlushOutcome::Delivered(_) => {}
				FlushOutcome::InFlight => self.wait_for_flush().await,
				_ => break,
			}
		}
		self.inner.timer.cancel();

		let remaining = self.queue_len();
		info!(remaining, "Analytics batch processor stopped");
		remaining
	}
}

async fn flush_if_alive(inner: Weak<ProcessorInner>) {
	if let Some(inner) = inner.upgrade() {
		BatchProcessor { inner }.flush().await;
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::platform::MemoryPlatform;
	use crate::test_support::{element_names, stamped_click, MockTransport};
	use proptest::prelude::*;
	use tokio::sync::Semaphore;

	fn config(batch_size: usize) -> BatchConfig {
		BatchConfig {
			batch_size,
			flush_interval: Duration::from_millis(3000),
			max_queue_size: 1000,
			request_timeout: Duration::from_secs(10),
			backoff: BackoffConfig::default(),
		}
	}

	fn processor_with(
		config: BatchConfig,
		transport: Arc<MockTransport>,
	) -> (BatchProcessor, Arc<MemoryPlatform>) {
		let platform = Arc::new(MemoryPlatform::new());
		let processor = BatchProcessor::new(config, transport, platform.clone(), Handle::current());
		(processor, platform)
	}

	/// Lets spawned tasks run without moving the paused clock.
	async fn settle() {
		for _ in 0..10 {
			tokio::task::yield_now().await;
		}
	}

	#[tokio::test(start_paused = true)]
	async fn test_enqueue_below_batch_size_arms_timer() {
		let transport = MockTransport::new();
		let (processor, _) = processor_with(config(10), transport.clone());

		processor.enqueue(stamped_click(0)).unwrap();

		assert_eq!(processor.queue_len(), 1);
		assert_eq!(processor.pending_delay(), Some(Duration::from_millis(3000)));
		assert_eq!(transport.attempts(), 0);
	}

	#[tokio::test(start_paused = true)]
	async fn test_size_trigger_flushes_immediately() {
		let transport = MockTransport::new();
		let (processor, _) = processor_with(config(10), transport.clone());

		for i in 0..10 {
			processor.enqueue(stamped_click(i)).unwrap();
		}
		settle().await;

		let batches = transport.delivered();
		assert_eq!(batches.len(), 1);
		assert_eq!(batches[0].len(), 10);
		assert_eq!(processor.queue_len(), 0);
	}

	#[tokio::test(start_paused = true)]
	async fn test_time_trigger_flushes_once() {
		let transport = MockTransport::new();
		let (processor, _) = processor_with(config(10), transport.clone());

		for i in 0..3 {
			processor.enqueue(stamped_click(i)).unwrap();
		}

		tokio::time::sleep(Duration::from_millis(2999)).await;
		assert_eq!(transport.attempts(), 0);

		tokio::time::sleep(Duration::from_millis(2)).await;
		settle().await;
		assert_eq!(transport.attempts(), 1);
		assert_eq!(transport.delivered()[0].len(), 3);
		assert_eq!(processor.pending_delay(), None);
	}

	#[tokio::test(start_paused = true)]
	async fn test_flush_empty_queue_is_idle() {
		let transport = MockTransport::new();
		let (processor, _) = processor_with(config(10), transport.clone());

		assert_eq!(processor.flush().await, FlushOutcome::Idle);
		assert_eq!(transport.attempts(), 0);
		assert!(!processor.is_flushing());
	}

	#[tokio::test(start_paused = true)]
	async fn test_only_one_flush_in_flight() {
		let gate = Arc::new(Semaphore::new(0));
		let transport = MockTransport::gated(gate.clone());
		let (processor, _) = processor_with(config(100), transport.clone());

		processor.enqueue(stamped_click(0)).unwrap();

		let first = tokio::spawn({
			let processor = processor.clone();
			async move { processor.flush().await }
		});
		settle().await;
		assert!(processor.is_flushing());

		assert_eq!(processor.flush().await, FlushOutcome::InFlight);
		assert_eq!(processor.flush().await, FlushOutcome::InFlight);

		gate.add_permits(1);
		assert_eq!(first.await.unwrap(), FlushOutcome::Delivered(1));
		assert_eq!(transport.attempts(), 1);
		assert!(!processor.is_flushing());
	}

	#[tokio::test(start_paused = true)]
	async fn test_failure_requeues_and_backs_off() {
		let transport = MockTransport::new();
		transport.fail_next(1);
		let (processor, _) = processor_with(config(10), transport.clone());

		for i in 0..3 {
			processor.enqueue(stamped_click(i)).unwrap();
		}

		match processor.flush().await {
			FlushOutcome::Failed {
				retry_count,
				backoff,
			} => {
				assert_eq!(retry_count, 1);
				assert!(backoff >= Duration::from_millis(2000));
				assert!(backoff < Duration::from_millis(2500));
				assert_eq!(processor.pending_delay(), Some(backoff));
			}
			other => panic!("expected failure, got {other:?}"),
		}
		assert_eq!(processor.queue_len(), 3);
		assert_eq!(processor.retry_count(), 1);
	}

	#[tokio::test(start_paused = true)]
	async fn test_backoff_grows_and_caps() {
		let transport = MockTransport::new();
		transport.fail_next(8);
		let (processor, _) = processor_with(config(10), transport.clone());
		processor.enqueue(stamped_click(0)).unwrap();

		for k in 1..=8u32 {
			let expected = k.min(5);
			match processor.flush().await {
				FlushOutcome::Failed {
					retry_count,
					backoff,
				} => {
					assert_eq!(retry_count, expected);
					let floor = Duration::from_millis(1000 * 2u64.pow(expected));
					assert!(backoff >= floor);
					assert!(backoff < floor + Duration::from_millis(500));
				}
				other => panic!("expected failure, got {other:?}"),
			}
		}
		assert_eq!(processor.retry_count(), 5);
	}

	#[tokio::test(start_paused = true)]
	async fn test_success_resets_retry_count() {
		let transport = MockTransport::new();
		transport.script(&[false, false, true, false]);
		let (processor, _) = processor_with(config(10), transport.clone());
		processor.enqueue(stamped_click(0)).unwrap();

		processor.flush().await;
		processor.flush().await;
		assert_eq!(processor.retry_count(), 2);

		assert_eq!(processor.flush().await, FlushOutcome::Delivered(1));
		assert_eq!(processor.retry_count(), 0);

		processor.enqueue(stamped_click(1)).unwrap();
		match processor.flush().await {
			FlushOutcome::Failed { retry_count, .. } => assert_eq!(retry_count, 1),
			other => panic!("expected failure, got {other:?}"),
		}
	}

	#[tokio::test(start_paused = true)]
	async fn test_requeued_batch_precedes_events_enqueued_in_flight() {
		let gate = Arc::new(Semaphore::new(0));
		let transport = MockTransport::gated(gate.clone());
		transport.script(&[false]);
		let (processor, _) = processor_with(config(100), transport.clone());

		for i in 0..3 {
			processor.enqueue(stamped_click(i)).unwrap();
		}
		let in_flight = tokio::spawn({
			let processor = processor.clone();
			async move { processor.flush().await }
		});
		settle().await;

		for i in 3..8 {
			processor.enqueue(stamped_click(i)).unwrap();
		}
		gate.add_permits(1);
		assert!(matches!(
			in_flight.await.unwrap(),
			FlushOutcome::Failed { .. }
		));

		gate.add_permits(1);
		assert_eq!(processor.flush().await, FlushOutcome::Delivered(8));
		assert_eq!(
			element_names(&transport.delivered_events()),
			(0..8).map(|i| format!("el{i}")).collect::<Vec<_>>()
		);
	}

	#[tokio::test(start_paused = true)]
	async fn test_two_failures_then_success_delivers_in_order() {
		let transport = MockTransport::new();
		transport.fail_next(2);
		let (processor, _) = processor_with(config(10), transport.clone());

		for i in 0..3 {
			processor.enqueue(stamped_click(i)).unwrap();
		}

		// Debounce (3s), then retries after ~2s and ~4s.
		tokio::time::sleep(Duration::from_secs(30)).await;
		settle().await;

		assert_eq!(transport.attempts(), 3);
		let batches = transport.delivered();
		assert_eq!(batches.len(), 1);
		assert_eq!(
			element_names(&batches[0].events),
			vec!["el0", "el1", "el2"]
		);
		assert_eq!(processor.retry_count(), 0);
		assert_eq!(processor.queue_len(), 0);
		assert_eq!(processor.pending_delay(), None);
	}

	#[tokio::test(start_paused = true)]
	async fn test_offline_skips_network_and_keeps_events() {
		let transport = MockTransport::new();
		let (processor, platform) = processor_with(config(10), transport.clone());
		platform.set_online(false);

		processor.enqueue(stamped_click(0)).unwrap();
		processor.enqueue(stamped_click(1)).unwrap();

		assert_eq!(processor.flush().await, FlushOutcome::Offline);
		assert_eq!(transport.attempts(), 0);
		assert_eq!(processor.queue_len(), 2);
		assert_eq!(processor.retry_count(), 0);
		assert!(processor.pending_delay().is_some());

		platform.set_online(true);
		tokio::time::sleep(Duration::from_secs(4)).await;
		settle().await;
		assert_eq!(transport.delivered_events().len(), 2);
	}

	#[tokio::test(start_paused = true)]
	async fn test_timeout_releases_flushing_flag() {
		let transport = MockTransport::new();
		transport.set_hang(true);
		let mut cfg = config(10);
		cfg.request_timeout = Duration::from_millis(500);
		let (processor, _) = processor_with(cfg, transport.clone());

		processor.enqueue(stamped_click(0)).unwrap();
		let outcome = processor.flush().await;

		assert!(matches!(outcome, FlushOutcome::Failed { retry_count: 1, .. }));
		assert!(!processor.is_flushing());
		assert_eq!(processor.queue_len(), 1);

		transport.set_hang(false);
		assert_eq!(processor.flush().await, FlushOutcome::Delivered(1));
	}

	#[tokio::test(start_paused = true)]
	async fn test_batches_are_bounded_by_batch_size() {
		let transport = MockTransport::new();
		let mut cfg = config(4);
		cfg.max_queue_size = 100;
		let (processor, _) = processor_with(cfg, transport.clone());

		for i in 0..10 {
			processor.enqueue(stamped_click(i)).unwrap();
		}
		tokio::time::sleep(Duration::from_secs(10)).await;
		settle().await;

		let sizes: Vec<usize> = transport.delivered().iter().map(|b| b.len()).collect();
		assert!(sizes.iter().all(|&n| n <= 4));
		assert_eq!(sizes.iter().sum::<usize>(), 10);
	}

	#[tokio::test(start_paused = true)]
	async fn test_shutdown_flushes_and_rejects() {
		let transport = MockTransport::new();
		let (processor, _) = processor_with(config(10), transport.clone());

		for i in 0..3 {
			processor.enqueue(stamped_click(i)).unwrap();
		}
		assert_eq!(processor.shutdown().await, 0);
		assert_eq!(transport.delivered_events().len(), 3);

		let result = processor.enqueue(stamped_click(9));
		assert!(matches!(result, Err(AnalyticsError::ClientShutdown)));
	}

	#[tokio::test(start_paused = true)]
	async fn test_shutdown_waits_for_in_flight_flush() {
		let gate = Arc::new(Semaphore::new(0));
		let transport = MockTransport::gated(gate.clone());
		let (processor, _) = processor_with(config(10), transport.clone());

		for i in 0..11 {
			processor.enqueue(stamped_click(i)).unwrap();
		}
		settle().await;
		assert!(processor.is_flushing());

		let shutdown = tokio::spawn({
			let processor = processor.clone();
			async move { processor.shutdown().await }
		});
		settle().await;
		assert!(!shutdown.is_finished());

		gate.add_permits(2);
		assert_eq!(shutdown.await.unwrap(), 0);
		assert_eq!(
			element_names(&transport.delivered_events()),
			(0..11).map(|i| format!("el{i}")).collect::<Vec<_>>()
		);
	}

	#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
	async fn test_concurrent_drain_never_sends_empty_batch() {
		let transport = MockTransport::new();
		let (processor, _) = processor_with(config(100), transport.clone());

		for round in 0..200 {
			processor.enqueue(stamped_click(round)).unwrap();
			let drainer = tokio::spawn({
				let processor = processor.clone();
				async move { processor.drain() }
			});
			let outcome = processor.flush().await;
			drainer.await.unwrap();
			assert!(matches!(
				outcome,
				FlushOutcome::Idle | FlushOutcome::InFlight | FlushOutcome::Delivered(1)
			));
		}
		assert!(transport.delivered().iter().all(|batch| !batch.is_empty()));
	}

	#[tokio::test(start_paused = true)]
	async fn test_reset_clears_state() {
		let transport = MockTransport::new();
		transport.fail_next(1);
		let (processor, _) = processor_with(config(10), transport.clone());

		processor.enqueue(stamped_click(0)).unwrap();
		processor.flush().await;
		assert_eq!(processor.retry_count(), 1);

		processor.reset();
		assert_eq!(processor.queue_len(), 0);
		assert_eq!(processor.retry_count(), 0);
		assert_eq!(processor.pending_delay(), None);
	}

	#[tokio::test(start_paused = true)]
	async fn test_drain_returns_everything() {
		let transport = MockTransport::new();
		let (processor, _) = processor_with(config(10), transport.clone());

		for i in 0..4 {
			processor.enqueue(stamped_click(i)).unwrap();
		}
		let drained = processor.drain();
		assert_eq!(drained.len(), 4);
		assert_eq!(processor.queue_len(), 0);
		assert_eq!(processor.pending_delay(), None);
	}

	proptest! {
		#[test]
		fn test_delivery_preserves_enqueue_order(
			count in 1..40usize,
			batch_size in 1..8usize,
			failures in 0..4usize,
		) {
			let delivered = tokio_test::block_on(async move {
				let transport = MockTransport::new();
				transport.fail_next(failures);
				let (processor, _) = processor_with(config(batch_size), transport.clone());

				for i in 0..count {
					processor.inner.queue.lock().enqueue(stamped_click(i));
				}
				let mut attempts = 0;
				while processor.queue_len() > 0 && attempts < 200 {
					processor.flush().await;
					attempts += 1;
				}
				processor.reset();
				transport.delivered_events()
			});

			let expected: Vec<String> = (0..count).map(|i| format!("el{i}")).collect();
			prop_assert_eq!(element_names(&delivered), expected);
		}
	}
}
