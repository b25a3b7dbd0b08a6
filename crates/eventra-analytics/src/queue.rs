// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Bounded FIFO of stamped events awaiting delivery.

use std::collections::VecDeque;

use eventra_analytics_core::AnalyticsEvent;
use tracing::warn;

/// Ordered event buffer.
///
/// Events leave from the front in batches. A failed batch is put back at the
/// front so it is retried before anything enqueued while it was in flight.
/// When full, the oldest event is dropped.
#[derive(Debug)]
pub struct EventQueue {
	events: VecDeque<AnalyticsEvent>,
	max_size: usize,
	dropped: u64,
}

impl EventQueue {
	pub fn new(max_size: usize) -> Self {
		Self {
			events: VecDeque::new(),
			max_size: max_size.max(1),
			dropped: 0,
		}
	}

	/// Appends an event and returns the new length.
	pub fn enqueue(&mut self, event: AnalyticsEvent) -> usize {
		while self.events.len() >= self.max_size {
			self.drop_oldest();
		}
		self.events.push_back(event);
		self.events.len()
	}

	/// Removes up to `n` events from the front.
	pub fn take_batch(&mut self, n: usize) -> Vec<AnalyticsEvent> {
		let n = n.min(self.events.len());
		self.events.drain(..n).collect()
	}

	/// Puts a batch back at the front, preserving its internal order.
	pub fn requeue_front(&mut self, batch: Vec<AnalyticsEvent>) {
		for event in batch.into_iter().rev() {
			self.events.push_front(event);
		}
		while self.events.len() > self.max_size {
			self.drop_oldest();
		}
	}

	/// Removes everything.
	pub fn drain(&mut self) -> Vec<AnalyticsEvent> {
		self.events.drain(..).collect()
	}

	pub fn len(&self) -> usize {
		self.events.len()
	}

	pub fn is_empty(&self) -> bool {
		self.events.is_empty()
	}

	/// Number of events dropped due to overflow since creation.
	pub fn dropped_count(&self) -> u64 {
		self.dropped
	}

	pub fn clear(&mut self) {
		self.events.clear();
	}

	fn drop_oldest(&mut self) {
		if let Some(dropped) = self.events.pop_front() {
			self.dropped += 1;
			warn!(
				event_name = %dropped.kind(),
				session_id = %dropped.session_id(),
				"Dropped event due to queue overflow"
			);
		}
	}
}
