// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Host capabilities the analytics pipeline depends on.
//!
//! The pipeline never touches connectivity, durable storage, teardown-safe
//! sends or lifecycle notifications directly. It goes through [`Platform`],
//! so the same logic runs against a browser bridge, a native host
//! ([`crate::native::NativePlatform`]) or the in-process [`MemoryPlatform`].

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::broadcast;

/// Errors raised by platform storage.
#[derive(Debug, Error)]
pub enum StorageError {
	/// Storage is disabled or inaccessible (e.g. private browsing).
	#[error("storage unavailable")]
	Unavailable,

	#[error("storage I/O error: {0}")]
	Io(#[from] std::io::Error),

	#[error("storage serialization error: {0}")]
	Serialization(#[from] serde_json::Error),
}

/// Page lifecycle signals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
	Visible,
	Hidden,
	/// The page is being torn down.
	PageHide,
}

/// Host capabilities used by the analytics pipeline.
pub trait Platform: Send + Sync {
	/// Whether the host currently reports network connectivity.
	fn is_online(&self) -> bool;

	fn storage_get(&self, key: &str) -> Result<Option<String>, StorageError>;

	fn storage_set(&self, key: &str, value: &str) -> Result<(), StorageError>;

	fn storage_remove(&self, key: &str) -> Result<(), StorageError>;

	/// Fire-and-forget send that must not block teardown.
	///
	/// Returns whether the host accepted the payload for delivery.
	fn send_beacon(&self, url: &str, body: Vec<u8>) -> bool;

	fn subscribe_lifecycle(&self) -> broadcast::Receiver<Lifecycle>;
}

/// Type alias for a shared platform.
pub type SharedPlatform = Arc<dyn Platform>;

/// Which storage operations a [`MemoryPlatform`] should fail.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StorageFailure {
	#[default]
	None,
	/// Reads succeed, writes fail (quota exceeded).
	Writes,
	/// Every access fails.
	All,
}

/// A payload handed to [`Platform::send_beacon`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Beacon {
	pub url: String,
	pub body: Vec<u8>,
}

/// In-process platform with controllable connectivity and storage.
pub struct MemoryPlatform {
	online: AtomicBool,
	accept_beacons: AtomicBool,
	storage_failure: Mutex<StorageFailure>,
	storage: Mutex<HashMap<String, String>>,
	beacons: Mutex<Vec<Beacon>>,
	lifecycle: broadcast::Sender<Lifecycle>,
}

impl MemoryPlatform {
	pub fn new() -> Self {
		let (lifecycle, _) = broadcast::channel(16);
		Self {
			online: AtomicBool::new(true),
			accept_beacons: AtomicBool::new(true),
			storage_failure: Mutex::new(StorageFailure::None),
			storage: Mutex::new(HashMap::new()),
			beacons: Mutex::new(Vec::new()),
			lifecycle,
		}
	}

	pub fn set_online(&self, online: bool) {
		self.online.store(online, Ordering::SeqCst);
	}

	pub fn set_accept_beacons(&self, accept: bool) {
		self.accept_beacons.store(accept, Ordering::SeqCst);
	}

	pub fn fail_storage(&self, failure: StorageFailure) {
		*self.storage_failure.lock() = failure;
	}

	pub fn clear_storage(&self) {
		self.storage.lock().clear();
	}

	/// Beacons accepted so far, oldest first.
	pub fn beacons(&self) -> Vec<Beacon> {
		self.beacons.lock().clone()
	}

	/// Broadcasts a lifecycle signal; returns the number of subscribers reached.
	pub fn emit(&self, signal: Lifecycle) -> usize {
		self.lifecycle.send(signal).unwrap_or(0)
	}
}

impl Default for MemoryPlatform {
	fn default() -> Self {
		Self::new()
	}
}

impl Platform for MemoryPlatform {
	fn is_online(&self) -> bool {
		self.online.load(Ordering::SeqCst)
	}

	fn storage_get(&self, key: &str) -> Result<Option<String>, StorageError> {
		if *self.storage_failure.lock() == StorageFailure::All {
			return Err(StorageError::Unavailable);
		}
		Ok(self.storage.lock().get(key).cloned())
	}

	fn storage_set(&self, key: &str, value: &str) -> Result<(), StorageError> {
		if *self.storage_failure.lock() != StorageFailure::None {
			return Err(StorageError::Unavailable);
		}
		self.storage.lock().insert(key.to_string(), value.to_string());
		Ok(())
	}

	fn storage_remove(&self, key: &str) -> Result<(), StorageError> {
		if *self.storage_failure.lock() != StorageFailure::None {
			return Err(StorageError::Unavailable);
		}
		self.storage.lock().remove(key);
		Ok(())
	}

	fn send_beacon(&self, url: &str, body: Vec<u8>) -> bool {
		if !self.accept_beacons.load(Ordering::SeqCst) {
			return false;
		}
		self.beacons.lock().push(Beacon {
			url: url.to_string(),
			body,
		});
		true
	}

	fn subscribe_lifecycle(&self) -> broadcast::Receiver<Lifecycle> {
		self.lifecycle.subscribe()
	}
}
