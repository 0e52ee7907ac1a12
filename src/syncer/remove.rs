use async_trait::async_trait;
use std::any::Any;
use std::sync::Arc;

use super::{Operation, SkipReason, SyncContext, SyncError, SyncResult, Syncer, event_reason};
use crate::events::EventType;
use crate::meta::{Object, Resource};
use crate::store::{self, ObjectStore};

/// Syncer deleting its subject from the store.
pub struct RemoveResourceSyncer<T: Resource> {
	name: String,
	owner: Option<Box<dyn Object>>,
	object: T,
	store: Arc<dyn ObjectStore>,
}

impl<T: Resource> RemoveResourceSyncer<T> {
	pub fn new(
		name: impl Into<String>,
		owner: Option<Box<dyn Object>>,
		object: T,
		store: Arc<dyn ObjectStore>,
	) -> Self {
		Self {
			name: name.into(),
			owner,
			object,
			store,
		}
	}

	async fn remove(&mut self, ctx: &SyncContext) -> Result<bool, SyncError> {
		let key = self.object.key();
		let found = ctx
			.run(store::get_into(self.store.as_ref(), &mut self.object))
			.await?
			.map_err(|e| SyncError::store("fetching", &key, e))?;
		if !found {
			return Ok(false);
		}

		match ctx.run(store::delete(self.store.as_ref(), &self.object)).await? {
			Ok(()) => Ok(true),
			// deleted concurrently
			Err(e) if e.is_not_found() => Ok(false),
			Err(e) => Err(SyncError::store("deleting", &key, e)),
		}
	}
}

#[async_trait]
impl<T: Resource> Syncer for RemoveResourceSyncer<T> {
	fn name(&self) -> &str {
		&self.name
	}

	fn object(&self) -> &dyn Any {
		&self.object
	}

	fn object_type(&self) -> String {
		self.object.type_meta().to_string()
	}

	fn owner(&self) -> Option<&dyn Object> {
		self.owner.as_deref()
	}

	async fn sync(&mut self, ctx: &SyncContext) -> SyncResult {
		let key = self.object.key();
		let kind = self.object_type();

		match self.remove(ctx).await {
			Ok(true) => {
				tracing::debug!(syncer = %self.name, key = %key, kind = %kind, "deleted");
				SyncResult::persisted(Operation::Deleted).with_event(
					EventType::Normal,
					event_reason(&self.name, false),
					format!("{kind} {key} successfully deleted"),
				)
			}
			Ok(false) => SyncResult::skipped(SkipReason::NotFound),
			Err(err) => {
				tracing::error!(syncer = %self.name, key = %key, kind = %kind, error = %err, "unchanged");
				SyncResult::failed(Operation::None, err)
			}
		}
	}
}
