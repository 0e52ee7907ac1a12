use async_trait::async_trait;
use std::any::Any;
use std::future::Future;
use std::pin::Pin;

use super::{Operation, SkipReason, SyncContext, SyncError, SyncResult, Syncer, event_reason};
use crate::events::EventType;
use crate::meta::Object;

type BoxF<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Caller supplied persistence for an external object.
pub type ExternalSyncFn<T> =
	Box<dyn for<'a> FnMut(&'a SyncContext, &'a mut T) -> BoxF<'a, Result<Operation, SyncError>> + Send + Sync>;

/// Syncer for state kept outside the object store, e.g. in a third-party
/// API. Persistence is entirely up to the sync function.
pub struct ExternalSyncer<T: Send + Sync + 'static> {
	name: String,
	owner: Option<Box<dyn Object>>,
	object: T,
	sync_fn: ExternalSyncFn<T>,
}

impl<T: Send + Sync + 'static> ExternalSyncer<T> {
	/// Build a syncer from a function returning a boxed future, e.g.
	/// `|ctx, repo| Box::pin(async move { ... })`.
	pub fn new<F>(name: impl Into<String>, owner: Option<Box<dyn Object>>, object: T, sync_fn: F) -> Self
	where
		F: for<'a> FnMut(&'a SyncContext, &'a mut T) -> BoxF<'a, Result<Operation, SyncError>>
			+ Send
			+ Sync
			+ 'static,
	{
		Self {
			name: name.into(),
			owner,
			object,
			sync_fn: Box::new(sync_fn),
		}
	}

	pub fn object_ref(&self) -> &T {
		&self.object
	}
}

#[async_trait]
impl<T: Send + Sync + 'static> Syncer for ExternalSyncer<T> {
	fn name(&self) -> &str {
		&self.name
	}

	fn object(&self) -> &dyn Any {
		&self.object
	}

	fn object_type(&self) -> String {
		std::any::type_name::<T>().to_string()
	}

	fn owner(&self) -> Option<&dyn Object> {
		self.owner.as_deref()
	}

	async fn sync(&mut self, ctx: &SyncContext) -> SyncResult {
		let kind = self.object_type();
		let result = (self.sync_fn)(ctx, &mut self.object).await;

		match result {
			Err(SyncError::Ignored(reason)) => {
				tracing::debug!(syncer = %self.name, kind = %kind, error = %reason, "syncer skipped");
				SyncResult::skipped(SkipReason::Ignored(reason))
			}
			Err(err) => {
				tracing::error!(syncer = %self.name, kind = %kind, error = %err, "unchanged");
				let message = format!("{kind} failed syncing: {err}");
				SyncResult::failed(Operation::None, err).with_event(
					EventType::Warning,
					event_reason(&self.name, true),
					message,
				)
			}
			Ok(operation) => {
				tracing::debug!(syncer = %self.name, kind = %kind, "{}", operation);
				SyncResult::persisted(operation).with_event(
					EventType::Normal,
					event_reason(&self.name, false),
					format!("{kind} successfully {operation}"),
				)
			}
		}
	}
}
