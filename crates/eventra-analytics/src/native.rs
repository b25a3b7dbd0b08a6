// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Platform implementation for native hosts.
//!
//! Storage is a single JSON object on disk, loaded lazily and written through
//! on every change. Beacons are posted from a detached thread with a blocking
//! HTTP client so they survive the async runtime shutting down.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::platform::{Lifecycle, Platform, StorageError};

const BEACON_TIMEOUT: Duration = Duration::from_secs(5);
const STORAGE_FILE: &str = "analytics.json";

/// [`Platform`] backed by a JSON file and a blocking HTTP client.
pub struct NativePlatform {
	path: PathBuf,
	cache: Mutex<Option<HashMap<String, String>>>,
	online: AtomicBool,
	lifecycle: broadcast::Sender<Lifecycle>,
}

impl NativePlatform {
	/// Uses `<data_dir>/eventra/analytics.json`.
	///
	/// Returns `None` when the host has no data directory.
	pub fn new() -> Option<Self> {
		let path = dirs::data_dir()?.join("eventra").join(STORAGE_FILE);
		Some(Self::with_storage_path(path))
	}

	pub fn with_storage_path(path: impl Into<PathBuf>) -> Self {
		let (lifecycle, _) = broadcast::channel(16);
		Self {
			path: path.into(),
			cache: Mutex::new(None),
			online: AtomicBool::new(true),
			lifecycle,
		}
	}

	pub fn storage_path(&self) -> &Path {
		&self.path
	}

	/// Native hosts report connectivity changes through this.
	pub fn set_online(&self, online: bool) {
		self.online.store(online, Ordering::SeqCst);
	}

	/// Forwards a host lifecycle signal to subscribers.
	pub fn notify(&self, signal: Lifecycle) {
		if self.lifecycle.send(signal).is_err() {
			debug!(?signal, "No lifecycle subscribers");
		}
	}

	fn with_entries<R>(
		&self,
		f: impl FnOnce(&mut HashMap<String, String>) -> R,
	) -> Result<R, StorageError> {
		let mut cache = self.cache.lock();
		if cache.is_none() {
			*cache = Some(load_entries(&self.path)?);
		}
		match cache.as_mut() {
			Some(entries) => Ok(f(entries)),
			None => Err(StorageError::Unavailable),
		}
	}

	fn persist(&self, entries: &HashMap<String, String>) -> Result<(), StorageError> {
		if let Some(parent) = self.path.parent() {
			std::fs::create_dir_all(parent)?;
		}
		let tmp = self.path.with_extension("json.tmp");
		std::fs::write(&tmp, serde_json::to_vec_pretty(entries)?)?;
		std::fs::rename(&tmp, &self.path)?;
		Ok(())
	}

	fn update(
		&self,
		f: impl FnOnce(&mut HashMap<String, String>) -> bool,
	) -> Result<(), StorageError> {
		let snapshot = self.with_entries(|entries| {
			if f(entries) {
				Some(entries.clone())
			} else {
				None
			}
		})?;
		if let Some(entries) = snapshot {
			self.persist(&entries)?;
		}
		Ok(())
	}
}

fn load_entries(path: &Path) -> Result<HashMap<String, String>, StorageError> {
	match std::fs::read(path) {
		Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
		Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(HashMap::new()),
		Err(e) => Err(e.into()),
	}
}

impl Platform for NativePlatform {
	fn is_online(&self) -> bool {
		self.online.load(Ordering::SeqCst)
	}

	fn storage_get(&self, key: &str) -> Result<Option<String>, StorageError> {
		self.with_entries(|entries| entries.get(key).cloned())
	}

	fn storage_set(&self, key: &str, value: &str) -> Result<(), StorageError> {
		self.update(|entries| {
			entries.insert(key.to_string(), value.to_string());
			true
		})
	}

	fn storage_remove(&self, key: &str) -> Result<(), StorageError> {
		self.update(|entries| entries.remove(key).is_some())
	}

	fn send_beacon(&self, url: &str, body: Vec<u8>) -> bool {
		let url = url.to_string();
		// The blocking client must be built off the async runtime's threads.
		let spawned = std::thread::Builder::new()
			.name("eventra-beacon".to_string())
			.spawn(move || {
				let client = match eventra_common_http::blocking_builder()
					.timeout(BEACON_TIMEOUT)
					.build()
				{
					Ok(client) => client,
					Err(e) => {
						warn!(error = %e, "Failed to build beacon client");
						return;
					}
				};
				let result = client
					.post(&url)
					.header(reqwest::header::CONTENT_TYPE, "application/json")
					.body(body)
					.send();
				match result {
					Ok(response) => debug!(status = %response.status(), "Beacon delivered"),
					Err(e) => debug!(error = %e, "Beacon failed"),
				}
			});

		match spawned {
			Ok(_) => true,
			Err(e) => {
				warn!(error = %e, "Failed to spawn beacon thread");
				false
			}
		}
	}

	fn subscribe_lifecycle(&self) -> broadcast::Receiver<Lifecycle> {
		self.lifecycle.subscribe()
	}
}
