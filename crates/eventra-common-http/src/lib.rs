// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Shared HTTP utilities for Eventra.
//!
//! This crate provides:
//! - A pre-configured HTTP client with consistent User-Agent header
//! - Exponential backoff with jitter for delivery retries

mod client;
mod retry;

pub use client::{
	blocking_builder, builder, builder_with_user_agent, new_client_with_timeout, user_agent,
};
pub use retry::BackoffConfig;
