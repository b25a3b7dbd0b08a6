// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Event types for tracking user actions in the Eventra apps.
//!
//! Events form a closed set. Each kind carries its own payload struct, and
//! every delivered payload is stamped with the enqueue timestamp and the
//! anonymous session identifier.
//!
//! On the wire an event looks like:
//!
//! ```json
//! {
//!   "name": "Click",
//!   "payload": {
//!     "timestamp": 1718000000000,
//!     "session_id": "k3j9x0a1lx2c4v7q",
//!     "element_name": "book_now",
//!     "element_type": "button",
//!     "page_name": "hotel_detail"
//!   }
//! }
//! ```

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::properties::Properties;

/// Current time in milliseconds since the Unix epoch.
pub fn now_millis() -> i64 {
	chrono::Utc::now().timestamp_millis()
}

/// The closed set of event kinds understood by the ingestion endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
	PageView,
	Click,
	CityScrollerImpression,
	CityScrollerSnap,
	CityScrollerSelect,
	CardImpression,
	DeepLinkOpen,
	Search,
	#[serde(rename = "CTA")]
	Cta,
	Error,
}

impl EventKind {
	pub const ALL: [EventKind; 10] = [
		EventKind::PageView,
		EventKind::Click,
		EventKind::CityScrollerImpression,
		EventKind::CityScrollerSnap,
		EventKind::CityScrollerSelect,
		EventKind::CardImpression,
		EventKind::DeepLinkOpen,
		EventKind::Search,
		EventKind::Cta,
		EventKind::Error,
	];

	/// The wire name of this kind.
	pub fn as_str(&self) -> &'static str {
		match self {
			EventKind::PageView => "PageView",
			EventKind::Click => "Click",
			EventKind::CityScrollerImpression => "CityScrollerImpression",
			EventKind::CityScrollerSnap => "CityScrollerSnap",
			EventKind::CityScrollerSelect => "CityScrollerSelect",
			EventKind::CardImpression => "CardImpression",
			EventKind::DeepLinkOpen => "DeepLinkOpen",
			EventKind::Search => "Search",
			EventKind::Cta => "CTA",
			EventKind::Error => "Error",
		}
	}
}

impl fmt::Display for EventKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for EventKind {
	type Err = CoreError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		EventKind::ALL
			.into_iter()
			.find(|kind| kind.as_str() == s)
			.ok_or_else(|| CoreError::UnknownEventKind(s.to_string()))
	}
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PageView {
	pub page_name: String,
	pub url: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub language: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub city_id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Click {
	pub element_name: String,
	pub element_type: String,
	pub page_name: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub destination: Option<String>,
}

/// The set of cities rendered in the home-page city scroller.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CityScrollerImpression {
	pub city_list: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CityScrollerSnap {
	pub city_id: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub previous_city_id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CityScrollerSelect {
	pub city_id: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub user_id: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub entry_source: Option<String>,
}

/// A venue or event card scrolled into view.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CardImpression {
	pub entity_type: String,
	pub entity_id: String,
	pub position: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeepLinkOpen {
	pub entity_type: String,
	pub entity_id: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub referrer: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Search {
	pub query: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub filters: Option<Properties>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub result_count: Option<u32>,
}

/// Outcome of a call-to-action (booking, call, directions...).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CtaResult {
	#[default]
	Success,
	Fail,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Cta {
	pub cta_name: String,
	pub cta_result: CtaResult,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub entity_id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ErrorReport {
	pub error_type: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub stack: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub user_action: Option<String>,
}

/// Kind-specific fields plus the stamps every payload carries.
///
/// Stamps are fixed at construction; only read access is exposed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stamped<T> {
	timestamp: i64,
	session_id: String,
	#[serde(flatten)]
	fields: T,
}

impl<T> Stamped<T> {
	pub fn new(timestamp: i64, session_id: impl Into<String>, fields: T) -> Self {
		Self {
			timestamp,
			session_id: session_id.into(),
			fields,
		}
	}

	/// Milliseconds since epoch, assigned when the event was enqueued.
	pub fn timestamp(&self) -> i64 {
		self.timestamp
	}

	pub fn session_id(&self) -> &str {
		&self.session_id
	}

	pub fn fields(&self) -> &T {
		&self.fields
	}
}

/// A stamped analytics event, serialized as `{"name": ..., "payload": {...}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "name", content = "payload")]
pub enum AnalyticsEvent {
	PageView(Stamped<PageView>),
	Click(Stamped<Click>),
	CityScrollerImpression(Stamped<CityScrollerImpression>),
	CityScrollerSnap(Stamped<CityScrollerSnap>),
	CityScrollerSelect(Stamped<CityScrollerSelect>),
	CardImpression(Stamped<CardImpression>),
	DeepLinkOpen(Stamped<DeepLinkOpen>),
	Search(Stamped<Search>),
	#[serde(rename = "CTA")]
	Cta(Stamped<Cta>),
	Error(Stamped<ErrorReport>),
}

impl AnalyticsEvent {
	pub fn kind(&self) -> EventKind {
		match self {
			AnalyticsEvent::PageView(_) => EventKind::PageView,
			AnalyticsEvent::Click(_) => EventKind::Click,
			AnalyticsEvent::CityScrollerImpression(_) => EventKind::CityScrollerImpression,
			AnalyticsEvent::CityScrollerSnap(_) => EventKind::CityScrollerSnap,
			AnalyticsEvent::CityScrollerSelect(_) => EventKind::CityScrollerSelect,
			AnalyticsEvent::CardImpression(_) => EventKind::CardImpression,
			AnalyticsEvent::DeepLinkOpen(_) => EventKind::DeepLinkOpen,
			AnalyticsEvent::Search(_) => EventKind::Search,
			AnalyticsEvent::Cta(_) => EventKind::Cta,
			AnalyticsEvent::Error(_) => EventKind::Error,
		}
	}

	pub fn timestamp(&self) -> i64 {
		self.stamps().0
	}

	pub fn session_id(&self) -> &str {
		self.stamps().1
	}

	fn stamps(&self) -> (i64, &str) {
		match self {
			AnalyticsEvent::PageView(p) => (p.timestamp, &p.session_id),
			AnalyticsEvent::Click(p) => (p.timestamp, &p.session_id),
			AnalyticsEvent::CityScrollerImpression(p) => (p.timestamp, &p.session_id),
			AnalyticsEvent::CityScrollerSnap(p) => (p.timestamp, &p.session_id),
			AnalyticsEvent::CityScrollerSelect(p) => (p.timestamp, &p.session_id),
			AnalyticsEvent::CardImpression(p) => (p.timestamp, &p.session_id),
			AnalyticsEvent::DeepLinkOpen(p) => (p.timestamp, &p.session_id),
			AnalyticsEvent::Search(p) => (p.timestamp, &p.session_id),
			AnalyticsEvent::Cta(p) => (p.timestamp, &p.session_id),
			AnalyticsEvent::Error(p) => (p.timestamp, &p.session_id),
		}
	}
}

/// Unstamped event fields, as handed to the tracking entry point.
#[derive(Debug, Clone, PartialEq)]
pub enum EventData {
	PageView(PageView),
	Click(Click),
	CityScrollerImpression(CityScrollerImpression),
	CityScrollerSnap(CityScrollerSnap),
	CityScrollerSelect(CityScrollerSelect),
	CardImpression(CardImpression),
	DeepLinkOpen(DeepLinkOpen),
	Search(Search),
	Cta(Cta),
	Error(ErrorReport),
}

impl EventData {
	pub fn kind(&self) -> EventKind {
		match self {
			EventData::PageView(_) => EventKind::PageView,
			EventData::Click(_) => EventKind::Click,
			EventData::CityScrollerImpression(_) => EventKind::CityScrollerImpression,
			EventData::CityScrollerSnap(_) => EventKind::CityScrollerSnap,
			EventData::CityScrollerSelect(_) => EventKind::CityScrollerSelect,
			EventData::CardImpression(_) => EventKind::CardImpression,
			EventData::DeepLinkOpen(_) => EventKind::DeepLinkOpen,
			EventData::Search(_) => EventKind::Search,
			EventData::Cta(_) => EventKind::Cta,
			EventData::Error(_) => EventKind::Error,
		}
	}

	/// Attaches the timestamp and session identifier.
	pub fn stamp(self, timestamp: i64, session_id: impl Into<String>) -> AnalyticsEvent {
		let session_id = session_id.into();
		match self {
			EventData::PageView(f) => AnalyticsEvent::PageView(Stamped::new(timestamp, session_id, f)),
			EventData::Click(f) => AnalyticsEvent::Click(Stamped::new(timestamp, session_id, f)),
			EventData::CityScrollerImpression(f) => {
				AnalyticsEvent::CityScrollerImpression(Stamped::new(timestamp, session_id, f))
			}
			EventData::CityScrollerSnap(f) => {
				AnalyticsEvent::CityScrollerSnap(Stamped::new(timestamp, session_id, f))
			}
			EventData::CityScrollerSelect(f) => {
				AnalyticsEvent::CityScrollerSelect(Stamped::new(timestamp, session_id, f))
			}
			EventData::CardImpression(f) => {
				AnalyticsEvent::CardImpression(Stamped::new(timestamp, session_id, f))
			}
			EventData::DeepLinkOpen(f) => {
				AnalyticsEvent::DeepLinkOpen(Stamped::new(timestamp, session_id, f))
			}
			EventData::Search(f) => AnalyticsEvent::Search(Stamped::new(timestamp, session_id, f)),
			EventData::Cta(f) => AnalyticsEvent::Cta(Stamped::new(timestamp, session_id, f)),
			EventData::Error(f) => AnalyticsEvent::Error(Stamped::new(timestamp, session_id, f)),
		}
	}
}

macro_rules! impl_from_fields {
	($($fields:ident => $variant:ident),+ $(,)?) => {
		$(
			impl From<$fields> for EventData {
				fn from(fields: $fields) -> Self {
					EventData::$variant(fields)
				}
			}
		)+
	};
}

impl_from_fields! {
	PageView => PageView,
	Click => Click,
	CityScrollerImpression => CityScrollerImpression,
	CityScrollerSnap => CityScrollerSnap,
	CityScrollerSelect => CityScrollerSelect,
	CardImpression => CardImpression,
	DeepLinkOpen => DeepLinkOpen,
	Search => Search,
	Cta => Cta,
	ErrorReport => Error,
}

/// Request body for one delivery attempt: `{"events": [...]}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventBatch {
	pub events: Vec<AnalyticsEvent>,
}

impl EventBatch {
	pub fn new(events: Vec<AnalyticsEvent>) -> Self {
		Self { events }
	}

	pub fn len(&self) -> usize {
		self.events.len()
	}

	pub fn is_empty(&self) -> bool {
		self.events.is_empty()
	}

	pub fn into_events(self) -> Vec<AnalyticsEvent> {
		self.events
	}

	/// Encodes the batch as the JSON request body.
	pub fn to_json_vec(&self) -> crate::Result<Vec<u8>> {
		Ok(serde_json::to_vec(self)?)
	}
}
