// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Client configuration.
//!
//! Values are layered the same way for every source: an
//! [`AnalyticsConfigLayer`] holds optional overrides, layers are merged in
//! precedence order (defaults, TOML file, environment) and the result is
//! finalized into a concrete [`AnalyticsConfig`].
//!
//! Environment convention: `EVENTRA_ANALYTICS_<FIELD>`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use eventra_common_http::BackoffConfig;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::error::{AnalyticsError, Result};

pub const DEFAULT_ENDPOINT: &str = "/api/track";
pub const DEFAULT_BATCH_SIZE: usize = 10;
pub const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_millis(3000);
pub const DEFAULT_MAX_RETRY: u32 = 5;
pub const DEFAULT_MAX_QUEUE_SIZE: usize = 1000;
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum ConfigError {
	#[error("failed to read config file at {path}: {source}")]
	FileRead {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},

	#[error("failed to parse config file at {path}: {source}")]
	TomlParse {
		path: PathBuf,
		#[source]
		source: toml::de::Error,
	},

	#[error("invalid value for {key}: {message}")]
	InvalidValue { key: String, message: String },
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AnalyticsConfigLayer {
	pub base_url: Option<String>,
	pub endpoint: Option<String>,
	pub batch_size: Option<usize>,
	pub flush_interval_ms: Option<u64>,
	pub max_retry: Option<u32>,
	pub max_queue_size: Option<usize>,
	pub request_timeout_ms: Option<u64>,
	pub enabled: Option<bool>,
}

impl AnalyticsConfigLayer {
	pub fn merge(&mut self, other: Self) {
		if other.base_url.is_some() {
			self.base_url = other.base_url;
		}
		if other.endpoint.is_some() {
			self.endpoint = other.endpoint;
		}
		if other.batch_size.is_some() {
			self.batch_size = other.batch_size;
		}
		if other.flush_interval_ms.is_some() {
			self.flush_interval_ms = other.flush_interval_ms;
		}
		if other.max_retry.is_some() {
			self.max_retry = other.max_retry;
		}
		if other.max_queue_size.is_some() {
			self.max_queue_size = other.max_queue_size;
		}
		if other.request_timeout_ms.is_some() {
			self.request_timeout_ms = other.request_timeout_ms;
		}
		if other.enabled.is_some() {
			self.enabled = other.enabled;
		}
	}

	pub fn finalize(self) -> AnalyticsConfig {
		AnalyticsConfig {
			base_url: self.base_url,
			endpoint: self
				.endpoint
				.unwrap_or_else(|| DEFAULT_ENDPOINT.to_string()),
			batch_size: self.batch_size.unwrap_or(DEFAULT_BATCH_SIZE),
			flush_interval: self
				.flush_interval_ms
				.map(Duration::from_millis)
				.unwrap_or(DEFAULT_FLUSH_INTERVAL),
			max_retry: self.max_retry.unwrap_or(DEFAULT_MAX_RETRY),
			max_queue_size: self.max_queue_size.unwrap_or(DEFAULT_MAX_QUEUE_SIZE),
			request_timeout: self
				.request_timeout_ms
				.map(Duration::from_millis)
				.unwrap_or(DEFAULT_REQUEST_TIMEOUT),
			enabled: self.enabled.unwrap_or(true),
		}
	}

	pub fn from_toml_str(content: &str, path: &Path) -> std::result::Result<Self, ConfigError> {
		toml::from_str(content).map_err(|e| ConfigError::TomlParse {
			path: path.to_path_buf(),
			source: e,
		})
	}

	/// Loads a layer from a TOML file. A missing file yields an empty layer.
	pub fn from_toml_file(path: &Path) -> std::result::Result<Self, ConfigError> {
		if !path.exists() {
			debug!(path = %path.display(), "analytics config file not found, skipping");
			return Ok(Self::default());
		}

		debug!(path = %path.display(), "loading analytics config file");
		let content = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
			path: path.to_path_buf(),
			source: e,
		})?;
		Self::from_toml_str(&content, path)
	}

	/// Loads a layer from the process environment.
	pub fn from_env() -> std::result::Result<Self, ConfigError> {
		Self::from_lookup(|name| std::env::var(name).ok())
	}

	/// Loads a layer through an arbitrary variable lookup.
	pub fn from_lookup<F>(lookup: F) -> std::result::Result<Self, ConfigError>
	where
		F: Fn(&str) -> Option<String>,
	{
		let var = |name: &str| lookup(name).filter(|s| !s.is_empty());

		Ok(Self {
			base_url: var("EVENTRA_ANALYTICS_BASE_URL"),
			endpoint: var("EVENTRA_ANALYTICS_ENDPOINT"),
			batch_size: parse_var(&var, "EVENTRA_ANALYTICS_BATCH_SIZE")?,
			flush_interval_ms: parse_var(&var, "EVENTRA_ANALYTICS_FLUSH_INTERVAL_MS")?,
			max_retry: parse_var(&var, "EVENTRA_ANALYTICS_MAX_RETRY")?,
			max_queue_size: parse_var(&var, "EVENTRA_ANALYTICS_MAX_QUEUE_SIZE")?,
			request_timeout_ms: parse_var(&var, "EVENTRA_ANALYTICS_REQUEST_TIMEOUT_MS")?,
			enabled: parse_bool_var(&var, "EVENTRA_ANALYTICS_ENABLED")?,
		})
	}
}

fn parse_bool_var<F>(var: &F, name: &str) -> std::result::Result<Option<bool>, ConfigError>
where
	F: Fn(&str) -> Option<String>,
{
	match var(name) {
		Some(v) => match v.to_ascii_lowercase().as_str() {
			"true" | "1" => Ok(Some(true)),
			"false" | "0" => Ok(Some(false)),
			_ => Err(ConfigError::InvalidValue {
				key: name.to_string(),
				message: format!("invalid boolean '{v}'"),
			}),
		},
		None => Ok(None),
	}
}

fn parse_var<T, F>(var: &F, name: &str) -> std::result::Result<Option<T>, ConfigError>
where
	T: std::str::FromStr,
	F: Fn(&str) -> Option<String>,
{
	match var(name) {
		Some(v) => v.parse().map(Some).map_err(|_| ConfigError::InvalidValue {
			key: name.to_string(),
			message: format!("invalid number '{v}'"),
		}),
		None => Ok(None),
	}
}

/// Finalized client configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalyticsConfig {
	/// Prefix joined onto a relative `endpoint`.
	pub base_url: Option<String>,
	pub endpoint: String,
	/// Queue length that triggers an immediate flush; also the batch bound.
	pub batch_size: usize,
	/// Debounce delay before a flush when the size trigger has not fired.
	pub flush_interval: Duration,
	/// Ceiling for the retry counter and the backoff exponent.
	pub max_retry: u32,
	/// Queue bound; the oldest events are dropped beyond it.
	pub max_queue_size: usize,
	pub request_timeout: Duration,
	/// A disabled client accepts and discards events.
	pub enabled: bool,
}

impl Default for AnalyticsConfig {
	fn default() -> Self {
		AnalyticsConfigLayer::default().finalize()
	}
}

impl AnalyticsConfig {
	/// Loads defaults, then the optional TOML file, then the environment.
	pub fn load(path: Option<&Path>) -> std::result::Result<Self, ConfigError> {
		let mut layer = AnalyticsConfigLayer::default();
		if let Some(path) = path {
			layer.merge(AnalyticsConfigLayer::from_toml_file(path)?);
		}
		layer.merge(AnalyticsConfigLayer::from_env()?);
		Ok(layer.finalize())
	}

	/// Absolute URL of the ingestion endpoint.
	pub fn resolved_endpoint(&self) -> Result<String> {
		if self.endpoint.starts_with("http://") || self.endpoint.starts_with("https://") {
			return Ok(self.endpoint.clone());
		}

		let base_url = self
			.base_url
			.as_deref()
			.ok_or_else(|| AnalyticsError::InvalidEndpoint(self.endpoint.clone()))?;

		Ok(format!(
			"{}/{}",
			base_url.trim_end_matches('/'),
			self.endpoint.trim_start_matches('/')
		))
	}

	pub fn validate(&self) -> Result<()> {
		if self.batch_size == 0 {
			return Err(AnalyticsError::InvalidConfig(
				"batch_size must be at least 1".to_string(),
			));
		}
		if self.max_queue_size < self.batch_size {
			return Err(AnalyticsError::InvalidConfig(format!(
				"max_queue_size ({}) must not be smaller than batch_size ({})",
				self.max_queue_size, self.batch_size
			)));
		}
		Ok(())
	}

	/// Retry schedule: `2^retry * 1s + [0, 500ms)`, exponent capped at `max_retry`.
	pub fn backoff(&self) -> BackoffConfig {
		BackoffConfig {
			max_attempts: self.max_retry,
			..BackoffConfig::default()
		}
	}
}
