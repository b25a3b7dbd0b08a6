// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Scriptable transport for unit tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use eventra_analytics_core::{AnalyticsEvent, Click, EventBatch, EventData};
use parking_lot::Mutex;
use tokio::sync::Semaphore;

use crate::error::{AnalyticsError, Result};
use crate::transport::Transport;

pub(crate) struct MockTransport {
	script: Mutex<VecDeque<bool>>,
	delivered: Mutex<Vec<EventBatch>>,
	attempts: AtomicUsize,
	gate: Option<Arc<Semaphore>>,
	hang: AtomicBool,
}

impl MockTransport {
	pub(crate) fn new() -> Arc<Self> {
		Arc::new(Self::build(None))
	}

	/// Every send waits for a permit on `gate` before answering.
	pub(crate) fn gated(gate: Arc<Semaphore>) -> Arc<Self> {
		Arc::new(Self::build(Some(gate)))
	}

	fn build(gate: Option<Arc<Semaphore>>) -> Self {
		Self {
			script: Mutex::new(VecDeque::new()),
			delivered: Mutex::new(Vec::new()),
			attempts: AtomicUsize::new(0),
			gate,
			hang: AtomicBool::new(false),
		}
	}

	/// Queues outcomes for the next sends; `false` is a server error.
	/// Sends past the script succeed.
	pub(crate) fn script(&self, outcomes: &[bool]) {
		self.script.lock().extend(outcomes.iter().copied());
	}

	pub(crate) fn fail_next(&self, n: usize) {
		self.script(&vec![false; n]);
	}

	pub(crate) fn set_hang(&self, hang: bool) {
		self.hang.store(hang, Ordering::SeqCst);
	}

	pub(crate) fn attempts(&self) -> usize {
		self.attempts.load(Ordering::SeqCst)
	}

	pub(crate) fn delivered(&self) -> Vec<EventBatch> {
		self.delivered.lock().clone()
	}

	pub(crate) fn delivered_events(&self) -> Vec<AnalyticsEvent> {
		self
			.delivered
			.lock()
			.iter()
			.flat_map(|b| b.events.iter().cloned())
			.collect()
	}
}

#[async_trait]
impl Transport for MockTransport {
	async fn send_batch(&self, batch: &EventBatch) -> Result<()> {
		self.attempts.fetch_add(1, Ordering::SeqCst);

		if let Some(gate) = &self.gate {
			if let Ok(permit) = gate.acquire().await {
				permit.forget();
			}
		}
		if self.hang.load(Ordering::SeqCst) {
			std::future::pending::<()>().await;
		}

		let succeed = self.script.lock().pop_front().unwrap_or(true);
		if succeed {
			self.delivered.lock().push(batch.clone());
			Ok(())
		} else {
			Err(AnalyticsError::ServerError {
				status: 500,
				message: "mock failure".to_string(),
			})
		}
	}
}

pub(crate) fn click(name: &str) -> EventData {
	EventData::from(Click {
		element_name: name.to_string(),
		element_type: "button".to_string(),
		page_name: "home".to_string(),
		destination: None,
	})
}

pub(crate) fn stamped_click(n: usize) -> AnalyticsEvent {
	click(&format!("el{n}")).stamp(n as i64, "test_session")
}

pub(crate) fn element_names(events: &[AnalyticsEvent]) -> Vec<String> {
	events
		.iter()
		.filter_map(|e| match e {
			AnalyticsEvent::Click(c) => Some(c.fields().element_name.clone()),
			_ => None,
		})
		.collect()
}
