//! Syncers reconcile one desired object with the store and describe what
//! happened as a [`SyncResult`].

pub mod context;
pub mod error;
pub mod external;
pub mod object;
pub mod redact;
pub mod remove;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::fmt;

use crate::events::{EventRecorder, EventType};
use crate::meta::Object;
use crate::observability::SyncMetrics;

pub use context::{CancelHandle, SyncContext};
pub use error::SyncError;
pub use external::ExternalSyncer;
pub use object::{ObjectSyncer, create_or_update};
pub use redact::{diff, redact};
pub use remove::RemoveResourceSyncer;

/// What a sync did to the stored object.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
	#[default]
	None,
	Created,
	Updated,
	Deleted,
}

impl Operation {
	pub fn as_str(&self) -> &'static str {
		match self {
			Operation::None => "unchanged",
			Operation::Created => "created",
			Operation::Updated => "updated",
			Operation::Deleted => "deleted",
		}
	}
}

impl fmt::Display for Operation {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncEvent {
	pub event_type: EventType,
	pub reason: String,
	pub message: String,
}

/// Why a sync persisted nothing without failing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
	/// The owner is being deleted and the object does not exist.
	OwnerDeleted,
	/// The mutate function asked for the sync to be ignored.
	Ignored(String),
	/// The object to delete was already gone.
	NotFound,
}

#[derive(Debug)]
pub enum Outcome {
	Persisted,
	Skipped(SkipReason),
	Failed(SyncError),
}

/// Result of one `Syncer::sync` call.
#[derive(Debug)]
pub struct SyncResult {
	pub operation: Operation,
	pub event: Option<SyncEvent>,
	pub outcome: Outcome,
}

impl SyncResult {
	pub fn persisted(operation: Operation) -> Self {
		Self {
			operation,
			event: None,
			outcome: Outcome::Persisted,
		}
	}

	pub fn skipped(reason: SkipReason) -> Self {
		Self {
			operation: Operation::None,
			event: None,
			outcome: Outcome::Skipped(reason),
		}
	}

	pub fn failed(operation: Operation, err: SyncError) -> Self {
		Self {
			operation,
			event: None,
			outcome: Outcome::Failed(err),
		}
	}

	pub fn with_event(mut self, event_type: EventType, reason: String, message: String) -> Self {
		self.event = Some(SyncEvent {
			event_type,
			reason,
			message,
		});
		self
	}

	pub fn error(&self) -> Option<&SyncError> {
		match &self.outcome {
			Outcome::Failed(err) => Some(err),
			_ => None,
		}
	}

	pub fn is_failed(&self) -> bool {
		self.error().is_some()
	}

	pub fn into_result(self) -> Result<Operation, SyncError> {
		match self.outcome {
			Outcome::Failed(err) => Err(err),
			_ => Ok(self.operation),
		}
	}
}

/// A reconciler for one subject object.
#[async_trait]
pub trait Syncer: Send {
	/// Name used in logs and event reasons, e.g. `MysqlStatefulSet`.
	fn name(&self) -> &str;
	fn object(&self) -> &dyn Any;
	/// Type of the subject as shown in logs and events.
	fn object_type(&self) -> String;
	fn owner(&self) -> Option<&dyn Object>;
	async fn sync(&mut self, ctx: &SyncContext) -> SyncResult;
}

/// Upper camel case of `s`: delimiters (`_`, `-`, `.`, space) are dropped
/// and the following letter is capitalized, as is a letter following a
/// digit. Other non-alphanumeric characters are dropped.
pub fn to_camel(s: &str) -> String {
	let mut out = String::with_capacity(s.len());
	let mut cap_next = true;
	for c in s.trim().chars() {
		if c.is_ascii_alphabetic() {
			if cap_next {
				out.push(c.to_ascii_uppercase());
			} else {
				out.push(c);
			}
			cap_next = false;
		} else if c.is_ascii_digit() {
			out.push(c);
			cap_next = true;
		} else {
			cap_next = matches!(c, '_' | ' ' | '-' | '.');
		}
	}
	out
}

pub(crate) fn event_reason(name: &str, failed: bool) -> String {
	if failed {
		format!("{}SyncFailed", to_camel(name))
	} else {
		format!("{}SyncSuccessfull", to_camel(name))
	}
}

fn emit(syncer: &dyn Syncer, result: &SyncResult, recorder: Option<&dyn EventRecorder>) {
	let (Some(recorder), Some(owner), Some(event)) = (recorder, syncer.owner(), result.event.as_ref()) else {
		return;
	};
	if result.is_failed() || result.operation != Operation::None {
		recorder.event(owner, event.event_type, &event.reason, &event.message);
	}
}

/// Run `syncer` and record its event against the owner.
///
/// An event is emitted only when a recorder is given, the syncer has an
/// owner, and the sync either failed or changed something. The syncer's
/// error is returned unchanged.
pub async fn sync(
	ctx: &SyncContext,
	syncer: &mut dyn Syncer,
	recorder: Option<&dyn EventRecorder>,
) -> Result<Operation, SyncError> {
	let result = syncer.sync(ctx).await;
	emit(syncer, &result, recorder);
	result.into_result()
}

/// [`sync`], additionally counting the result in `metrics`.
pub async fn sync_with_metrics(
	ctx: &SyncContext,
	syncer: &mut dyn Syncer,
	recorder: Option<&dyn EventRecorder>,
	metrics: &SyncMetrics,
) -> Result<Operation, SyncError> {
	let result = syncer.sync(ctx).await;
	emit(syncer, &result, recorder);
	metrics.observe(syncer.name(), &result);
	result.into_result()
}
