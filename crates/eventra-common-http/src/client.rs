// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Shared HTTP client with consistent User-Agent header.

use reqwest::{Client, ClientBuilder};
use std::time::Duration;

const PKG_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Creates a new HTTP client builder with the standard Eventra User-Agent header.
///
/// Use this when you need to customize the client (e.g., set timeout).
///
/// # Example
/// ```ignore
/// let client = eventra_common_http::builder()
///     .timeout(Duration::from_secs(10))
///     .build()?;
/// ```
pub fn builder() -> ClientBuilder {
	Client::builder().user_agent(user_agent())
}

/// Creates a new HTTP client builder with a custom User-Agent header.
pub fn builder_with_user_agent(user_agent: impl Into<String>) -> ClientBuilder {
	Client::builder().user_agent(user_agent.into())
}

/// Creates a blocking HTTP client builder with the standard User-Agent.
///
/// Only meant for fire-and-forget sends off the async runtime, such as
/// page-teardown beacons.
pub fn blocking_builder() -> reqwest::blocking::ClientBuilder {
	reqwest::blocking::Client::builder().user_agent(user_agent())
}

/// Creates a new HTTP client with a custom timeout and the standard User-Agent.
pub fn new_client_with_timeout(timeout: Duration) -> Result<Client, reqwest::Error> {
	builder().timeout(timeout).build()
}

/// Returns the standard Eventra User-Agent string.
///
/// Format: `eventra/{os}-{arch}/{version}`
pub fn user_agent() -> String {
	format!(
		"eventra/{}-{}/{}",
		std::env::consts::OS,
		std::env::consts::ARCH,
		PKG_VERSION
	)
}
