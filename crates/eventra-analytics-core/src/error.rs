// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Error types for the analytics core types.

use thiserror::Error;

/// Errors raised while parsing or encoding analytics events.
#[derive(Debug, Error)]
pub enum CoreError {
	#[error("unknown event kind: {0}")]
	UnknownEventKind(String),

	#[error("serialization error: {0}")]
	Serialization(String),
}

impl From<serde_json::Error> for CoreError {
	fn from(err: serde_json::Error) -> Self {
		CoreError::Serialization(err.to_string())
	}
}

/// A specialized `Result` type for core analytics operations.
pub type Result<T> = std::result::Result<T, CoreError>;
