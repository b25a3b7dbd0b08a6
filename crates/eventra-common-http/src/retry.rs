// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Exponential backoff with jitter for delivery retries.

use std::time::Duration;
use tracing::trace;

/// Backoff schedule: `base_delay * backoff_factor^attempt + random[0, max_jitter)`.
///
/// The exponent is capped at `max_attempts`; attempts past the cap keep
/// retrying at the capped delay.
#[derive(Debug, Clone, PartialEq)]
pub struct BackoffConfig {
	pub base_delay: Duration,
	pub backoff_factor: f64,
	pub max_attempts: u32,
	pub max_jitter: Duration,
}

impl Default for BackoffConfig {
	fn default() -> Self {
		Self {
			base_delay: Duration::from_millis(1000),
			backoff_factor: 2.0,
			max_attempts: 5,
			max_jitter: Duration::from_millis(500),
		}
	}
}

impl BackoffConfig {
	/// Delay without jitter for the given attempt.
	pub fn min_delay_for(&self, attempt: u32) -> Duration {
		let exponent = attempt.min(self.max_attempts);
		let millis = self.base_delay.as_millis() as f64 * self.backoff_factor.powi(exponent as i32);
		Duration::from_millis(millis as u64)
	}

	/// Delay with jitter for the given attempt.
	pub fn delay_for(&self, attempt: u32) -> Duration {
		let jitter_ms = self.max_jitter.as_millis() as u64;
		let jitter = if jitter_ms == 0 {
			0
		} else {
			fastrand::u64(0..jitter_ms)
		};

		let delay = self.min_delay_for(attempt) + Duration::from_millis(jitter);
		trace!(attempt, delay_ms = delay.as_millis() as u64, "computed backoff delay");
		delay
	}
}
