// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Core types for Eventra product analytics.
//!
//! This crate holds the wire model shared by the client SDK
//! (`eventra-analytics`) and anything that speaks to the ingestion endpoint:
//!
//! - [`EventKind`]: the closed set of event names
//! - [`EventData`]: unstamped, kind-specific fields handed to the tracker
//! - [`AnalyticsEvent`]: a stamped event (timestamp + session id)
//! - [`EventBatch`]: the `{"events": [...]}` request body
//! - session identifier generation
//!
//! # Example
//!
//! ```
//! use eventra_analytics_core::{Click, EventBatch, EventData, EventKind};
//!
//! let event = EventData::from(Click {
//!     element_name: "book_now".to_string(),
//!     element_type: "button".to_string(),
//!     page_name: "hotel_detail".to_string(),
//!     destination: None,
//! })
//! .stamp(1_718_000_000_000, "k3j9x0a1lx8kuby8");
//!
//! assert_eq!(event.kind(), EventKind::Click);
//! let body = EventBatch::new(vec![event]).to_json_vec().unwrap();
//! assert!(!body.is_empty());
//! ```

pub mod error;
pub mod event;
pub mod properties;
pub mod session;

pub use error::{CoreError, Result};
pub use event::{
	now_millis, AnalyticsEvent, CardImpression, CityScrollerImpression, CityScrollerSelect,
	CityScrollerSnap, Click, Cta, CtaResult, DeepLinkOpen, ErrorReport, EventBatch, EventData,
	EventKind, PageView, Search, Stamped,
};
pub use properties::Properties;
pub use session::{generate_session_id, to_base36, FALLBACK_SESSION_ID, SESSION_STORAGE_KEY};
