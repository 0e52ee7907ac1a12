//! Event recording against owner objects.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Mutex;

use crate::meta::Object;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventType {
	Normal,
	Warning,
}

impl fmt::Display for EventType {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			EventType::Normal => f.write_str("Normal"),
			EventType::Warning => f.write_str("Warning"),
		}
	}
}

/// Sink for events about an object.
pub trait EventRecorder: Send + Sync {
	fn event(&self, object: &dyn Object, event_type: EventType, reason: &str, message: &str);
}

/// Origin attached to recorded events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventSource {
	pub component: String,
	pub host: String,
}

impl EventSource {
	/// Source for `component` on the current host.
	pub fn local(component: impl Into<String>) -> Self {
		let host = hostname::get()
			.ok()
			.and_then(|h| h.into_string().ok())
			.unwrap_or_default();
		Self {
			component: component.into(),
			host,
		}
	}
}

/// Recorder writing events as structured log records.
#[derive(Debug, Clone)]
pub struct LogRecorder {
	source: EventSource,
}

impl LogRecorder {
	pub fn new(component: impl Into<String>) -> Self {
		Self {
			source: EventSource::local(component),
		}
	}

	pub fn source(&self) -> &EventSource {
		&self.source
	}
}

impl EventRecorder for LogRecorder {
	fn event(&self, object: &dyn Object, event_type: EventType, reason: &str, message: &str) {
		let kind = object.type_meta().to_string();
		let key = object.key().to_string();
		match event_type {
			EventType::Normal => tracing::info!(
				component = %self.source.component,
				host = %self.source.host,
				kind = %kind,
				object = %key,
				reason,
				"{}",
				message
			),
			EventType::Warning => tracing::warn!(
				component = %self.source.component,
				host = %self.source.host,
				kind = %kind,
				object = %key,
				reason,
				"{}",
				message
			),
		}
	}
}

/// Recorder keeping events in memory as `"<Type> <Reason> <Message>"`.
#[derive(Debug, Default)]
pub struct MemoryRecorder {
	events: Mutex<Vec<String>>,
}

impl MemoryRecorder {
	pub fn new() -> Self {
		Self::default()
	}

	/// Remove and return all recorded events.
	pub fn drain(&self) -> Vec<String> {
		match self.events.lock() {
			Ok(mut events) => std::mem::take(&mut *events),
			Err(poisoned) => std::mem::take(&mut *poisoned.into_inner()),
		}
	}

	pub fn len(&self) -> usize {
		self.events.lock().map(|e| e.len()).unwrap_or(0)
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}
}

impl EventRecorder for MemoryRecorder {
	fn event(&self, _object: &dyn Object, event_type: EventType, reason: &str, message: &str) {
		let line = format!("{event_type} {reason} {message}");
		match self.events.lock() {
			Ok(mut events) => events.push(line),
			Err(poisoned) => poisoned.into_inner().push(line),
		}
	}
}
