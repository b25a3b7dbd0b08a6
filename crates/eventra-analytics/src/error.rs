// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Error types for the analytics SDK.

use std::time::Duration;

use eventra_analytics_core::CoreError;
use thiserror::Error;

use crate::config::ConfigError;

/// Analytics SDK errors.
///
/// Delivery errors never reach the code that tracks events; they are logged
/// and retried by the batch processor. Builder and configuration errors are
/// returned to the caller.
#[derive(Debug, Error)]
pub enum AnalyticsError {
	/// Endpoint is relative and no base URL was configured.
	#[error("invalid endpoint: {0}")]
	InvalidEndpoint(String),

	#[error("invalid configuration: {0}")]
	InvalidConfig(String),

	/// The client was built outside of a tokio runtime.
	#[error("no tokio runtime available")]
	NoRuntime,

	/// HTTP request failed.
	#[error("HTTP request failed: {0}")]
	RequestFailed(#[from] reqwest::Error),

	/// Ingestion endpoint answered with a non-2xx status.
	#[error("server error ({status}): {message}")]
	ServerError { status: u16, message: String },

	#[error("request timed out after {0:?}")]
	Timeout(Duration),

	#[error("serialization error: {0}")]
	SerializationError(String),

	/// Client has been shut down.
	#[error("client has been shut down")]
	ClientShutdown,

	#[error(transparent)]
	Config(#[from] ConfigError),
}

impl From<CoreError> for AnalyticsError {
	fn from(err: CoreError) -> Self {
		AnalyticsError::SerializationError(err.to_string())
	}
}

impl From<serde_json::Error> for AnalyticsError {
	fn from(err: serde_json::Error) -> Self {
		AnalyticsError::SerializationError(err.to_string())
	}
}

/// Result type alias for analytics operations.
pub type Result<T> = std::result::Result<T, AnalyticsError>;
