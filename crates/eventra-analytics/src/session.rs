// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Persistent anonymous session identifier.

use eventra_analytics_core::{
	generate_session_id, now_millis, FALLBACK_SESSION_ID, SESSION_STORAGE_KEY,
};
use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::platform::SharedPlatform;

/// Reads or lazily creates the session identifier in platform storage.
///
/// Storage is consulted on every call so that an identifier written by
/// another tab or process is picked up. If storage cannot be read the
/// fallback `"anon"` is returned. If a freshly generated identifier cannot be
/// written, it is kept in memory and reused for the rest of the process.
pub struct SessionIdProvider {
	platform: SharedPlatform,
	key: String,
	unpersisted: Mutex<Option<String>>,
}

impl SessionIdProvider {
	pub fn new(platform: SharedPlatform) -> Self {
		Self::with_key(platform, SESSION_STORAGE_KEY)
	}

	pub fn with_key(platform: SharedPlatform, key: impl Into<String>) -> Self {
		Self {
			platform,
			key: key.into(),
			unpersisted: Mutex::new(None),
		}
	}

	pub fn session_id(&self) -> String {
		match self.platform.storage_get(&self.key) {
			Ok(Some(id)) if !id.is_empty() => id,
			Ok(_) => self.create(),
			Err(e) => {
				warn!(error = %e, "Session storage unreadable, using fallback id");
				FALLBACK_SESSION_ID.to_string()
			}
		}
	}

	fn create(&self) -> String {
		let mut unpersisted = self.unpersisted.lock();
		if let Some(id) = unpersisted.as_ref() {
			return id.clone();
		}

		let id = generate_session_id(now_millis());
		match self.platform.storage_set(&self.key, &id) {
			Ok(()) => debug!(session_id = %id, "Created session id"),
			Err(e) => {
				warn!(error = %e, "Failed to persist session id, keeping it in memory");
				*unpersisted = Some(id.clone());
			}
		}
		id
	}

	/// Forgets the identifier so the next call creates a new one.
	pub fn clear(&self) {
		*self.unpersisted.lock() = None;
		if let Err(e) = self.platform.storage_remove(&self.key) {
			warn!(error = %e, "Failed to remove session id");
		}
	}
}
