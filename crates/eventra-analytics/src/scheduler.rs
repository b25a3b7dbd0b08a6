// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Single-slot delayed flush timer.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::trace;

struct PendingTimer {
	id: u64,
	delay: Duration,
	handle: JoinHandle<()>,
}

/// At most one pending delayed task.
///
/// [`schedule`](Self::schedule) debounces: while a timer is pending, further
/// calls do nothing. [`reschedule`](Self::reschedule) replaces whatever is
/// pending. The slot is cleared before the task runs, so the task itself may
/// schedule the next timer.
pub struct FlushTimer {
	runtime: Handle,
	slot: Arc<Mutex<Option<PendingTimer>>>,
	next_id: AtomicU64,
}

impl FlushTimer {
	pub fn new(runtime: Handle) -> Self {
		Self {
			runtime,
			slot: Arc::new(Mutex::new(None)),
			next_id: AtomicU64::new(0),
		}
	}

	/// Arms the timer unless one is already pending. Returns whether it armed.
	pub fn schedule<F, Fut>(&self, delay: Duration, task: F) -> bool
	where
		F: FnOnce() -> Fut + Send + 'static,
		Fut: Future<Output = ()> + Send + 'static,
	{
		let mut slot = self.slot.lock();
		if slot.is_some() {
			return false;
		}
		*slot = Some(self.arm(delay, task));
		true
	}

	/// Cancels any pending timer and arms a new one.
	pub fn reschedule<F, Fut>(&self, delay: Duration, task: F)
	where
		F: FnOnce() -> Fut + Send + 'static,
		Fut: Future<Output = ()> + Send + 'static,
	{
		let mut slot = self.slot.lock();
		if let Some(previous) = slot.take() {
			previous.handle.abort();
		}
		*slot = Some(self.arm(delay, task));
	}

	pub fn cancel(&self) {
		if let Some(previous) = self.slot.lock().take() {
			previous.handle.abort();
			trace!(delay_ms = previous.delay.as_millis() as u64, "Flush timer cancelled");
		}
	}

	pub fn is_pending(&self) -> bool {
		self.slot.lock().is_some()
	}

	/// Delay the pending timer was armed with.
	pub fn pending_delay(&self) -> Option<Duration> {
		self.slot.lock().as_ref().map(|t| t.delay)
	}

	fn arm<F, Fut>(&self, delay: Duration, task: F) -> PendingTimer
	where
		F: FnOnce() -> Fut + Send + 'static,
		Fut: Future<Output = ()> + Send + 'static,
	{
		let id = self.next_id.fetch_add(1, Ordering::Relaxed);
		let slot = Arc::clone(&self.slot);
		trace!(id, delay_ms = delay.as_millis() as u64, "Flush timer armed");

		let handle = self.runtime.spawn(async move {
			tokio::time::sleep(delay).await;
			{
				let mut slot = slot.lock();
				if slot.as_ref().map(|pending| pending.id) != Some(id) {
					return;
				}
				*slot = None;
			}
			task().await;
		});

		PendingTimer { id, delay, handle }
	}
}

impl Drop for FlushTimer {
	fn drop(&mut self) {
		if let Some(pending) = self.slot.lock().take() {
			pending.handle.abort();
		}
	}
}
