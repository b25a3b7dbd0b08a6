// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! UI-facing helpers built on [`AnalyticsClient`].
//!
//! - [`AnalyticsContext`]: shared handle with convenience emitters and the
//!   signed-in user id
//! - [`PageViewTracker`]: page views on route change, skipping the initial load
//! - [`ScrollDepthTracker`]: frame-aligned scroll milestones, each fired once
//!   per mount
//! - [`ErrorCapture`]: panics and failed background tasks as `Error` events

use std::collections::BTreeSet;
use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;

use eventra_analytics_core::{Click, ErrorReport, EventData, PageView};
use parking_lot::RwLock;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::client::AnalyticsClient;

/// Scroll percentages that produce an event.
pub const SCROLL_MILESTONES: [u8; 5] = [25, 50, 75, 90, 100];

/// `element_type` of the `Click` events emitted for scroll milestones.
pub const SCROLL_DEPTH_ELEMENT_TYPE: &str = "scroll_depth";

/// Page name for a route path: `/hotels/12` becomes `hotels/12`, `/` becomes `home`.
pub fn page_name_for(path: &str) -> String {
	let path = path.split(['?', '#']).next().unwrap_or_default();
	let trimmed = path.trim_matches('/');
	if trimmed.is_empty() {
		"home".to_string()
	} else {
		trimmed.to_string()
	}
}

/// Cloneable tracking handle for UI code.
#[derive(Clone)]
pub struct AnalyticsContext {
	client: AnalyticsClient,
	user_id: Arc<RwLock<Option<String>>>,
}

impl AnalyticsContext {
	pub fn new(client: AnalyticsClient) -> Self {
		Self {
			client,
			user_id: Arc::new(RwLock::new(None)),
		}
	}

	pub fn client(&self) -> &AnalyticsClient {
		&self.client
	}

	/// Tracks any event. A `CityScrollerSelect` without a user id gets the
	/// one set with [`set_user_id`](Self::set_user_id).
	pub fn track_event(&self, data: impl Into<EventData>) {
		let mut data = data.into();
		if let EventData::CityScrollerSelect(select) = &mut data {
			if select.user_id.is_none() {
				select.user_id = self.user_id();
			}
		}
		self.client.track(data);
	}

	pub fn track_click(&self, element_name: &str, element_type: &str, page_name: &str) {
		self.track_event(Click {
			element_name: element_name.to_string(),
			element_type: element_type.to_string(),
			page_name: page_name.to_string(),
			destination: None,
		});
	}

	/// Tracks a view of `url`, deriving the page name from its path.
	pub fn track_page_view(&self, url: &str) {
		self.track_event(PageView {
			page_name: page_name_for(url),
			url: url.to_string(),
			language: None,
			city_id: None,
		});
	}

	pub fn track_error(
		&self,
		error_type: impl Into<String>,
		stack: Option<String>,
		user_action: Option<String>,
	) {
		self.track_event(ErrorReport {
			error_type: error_type.into(),
			stack,
			user_action,
		});
	}

	pub fn set_user_id(&self, user_id: Option<String>) {
		*self.user_id.write() = user_id;
	}

	pub fn user_id(&self) -> Option<String> {
		self.user_id.read().clone()
	}
}

/// Tracks a page view whenever the route changes.
///
/// The first observed path is the initial load, which the host tracks
/// itself, so it is only remembered.
pub struct PageViewTracker {
	context: AnalyticsContext,
	current: Option<String>,
}

impl PageViewTracker {
	pub fn new(context: AnalyticsContext) -> Self {
		Self {
			context,
			current: None,
		}
	}

	/// Returns whether a page view was tracked.
	pub fn on_route_change(&mut self, path: &str) -> bool {
		match self.current.as_deref() {
			None => {
				self.current = Some(path.to_string());
				false
			}
			Some(current) if current == path => false,
			Some(_) => {
				self.current = Some(path.to_string());
				self.context.track_page_view(path);
				true
			}
		}
	}

	pub fn current_path(&self) -> Option<&str> {
		self.current.as_deref()
	}
}

/// Scroll position of a document, in pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScrollSample {
	pub scroll_top: f64,
	pub viewport_height: f64,
	pub document_height: f64,
}

impl ScrollSample {
	pub fn new(scroll_top: f64, viewport_height: f64, document_height: f64) -> Self {
		Self {
			scroll_top,
			viewport_height,
			document_height,
		}
	}

	/// Percentage scrolled, clamped to `[0, 100]`. A document that does not
	/// scroll reports 0.
	pub fn percent(&self) -> f64 {
		let scrollable = self.document_height - self.viewport_height;
		if scrollable <= 0.0 || !scrollable.is_finite() {
			return 0.0;
		}
		(self.scroll_top / scrollable * 100.0).clamp(0.0, 100.0)
	}
}

/// Fires each scroll milestone at most once per mount.
///
/// Scroll notifications only record the latest sample; evaluation happens
/// once per rendered frame, so a burst of scroll events costs one check.
pub struct ScrollDepthTracker {
	context: AnalyticsContext,
	page_name: String,
	fired: BTreeSet<u8>,
	latest: Option<ScrollSample>,
	frame_requested: bool,
}

impl ScrollDepthTracker {
	pub fn new(context: AnalyticsContext, page_name: impl Into<String>) -> Self {
		Self {
			context,
			page_name: page_name.into(),
			fired: BTreeSet::new(),
			latest: None,
			frame_requested: false,
		}
	}

	/// Records a scroll sample. Returns `true` when the caller must request
	/// a frame callback; at most one is outstanding.
	pub fn on_scroll(&mut self, sample: ScrollSample) -> bool {
		self.latest = Some(sample);
		if self.frame_requested {
			return false;
		}
		self.frame_requested = true;
		true
	}

	/// Evaluates the latest sample and returns the milestones newly fired.
	pub fn on_frame(&mut self) -> Vec<u8> {
		self.frame_requested = false;
		let Some(sample) = self.latest.take() else {
			return Vec::new();
		};

		let percent = sample.percent();
		let mut newly_fired = Vec::new();
		for milestone in SCROLL_MILESTONES {
			if percent >= f64::from(milestone) && self.fired.insert(milestone) {
				self.context.track_event(Click {
					element_name: format!("{milestone}%"),
					element_type: SCROLL_DEPTH_ELEMENT_TYPE.to_string(),
					page_name: self.page_name.clone(),
					destination: None,
				});
				newly_fired.push(milestone);
			}
		}
		newly_fired
	}

	pub fn fired_milestones(&self) -> Vec<u8> {
		self.fired.iter().copied().collect()
	}

	/// Forgets fired milestones, as on remount.
	pub fn reset(&mut self) {
		self.fired.clear();
		self.latest = None;
		self.frame_requested = false;
	}
}

/// Routes panics and failed background tasks into `Error` events.
#[derive(Clone)]
pub struct ErrorCapture {
	context: AnalyticsContext,
}

impl ErrorCapture {
	pub fn new(context: AnalyticsContext) -> Self {
		Self { context }
	}

	/// Chains a panic hook that tracks the panic message and location, then
	/// runs the previously installed hook.
	pub fn install_panic_hook(&self) {
		let context = self.context.clone();
		let previous = std::panic::take_hook();
		std::panic::set_hook(Box::new(move |info| {
			let payload = info.payload();
			let message = payload
				.downcast_ref::<&str>()
				.map(|s| s.to_string())
				.or_else(|| payload.downcast_ref::<String>().cloned())
				.unwrap_or_else(|| "panic".to_string());
			let location = info
				.location()
				.map(|l| format!("{}:{}:{}", l.file(), l.line(), l.column()));

			context.track_error(message, location, Some("panic".to_string()));
			previous(info);
		}));
		debug!("Analytics panic hook installed");
	}

	/// Tracks an error together with its source chain.
	pub fn report_error(&self, error: &(dyn std::error::Error + 'static), user_action: Option<&str>) {
		let mut chain = Vec::new();
		let mut source = error.source();
		while let Some(cause) = source {
			chain.push(cause.to_string());
			source = cause.source();
		}
		let stack = if chain.is_empty() {
			None
		} else {
			Some(chain.join("\ncaused by: "))
		};

		self
			.context
			.track_error(error.to_string(), stack, user_action.map(str::to_string));
	}

	/// Tracks a background failure nobody awaited.
	pub fn report_rejection(&self, reason: impl Display) {
		self.context.track_error(
			reason.to_string(),
			None,
			Some("unhandled_rejection".to_string()),
		);
	}

	/// Spawns `future`, reporting an `Err` result via
	/// [`report_rejection`](Self::report_rejection).
	pub fn spawn_watched<F, E>(&self, future: F) -> JoinHandle<()>
	where
		F: Future<Output = Result<(), E>> + Send + 'static,
		E: Display + Send + 'static,
	{
		let capture = self.clone();
		self.context.client().runtime().spawn(async move {
			if let Err(e) = future.await {
				capture.report_rejection(e);
			}
		})
	}
}
