use async_trait::async_trait;
use serde_json::Value;
use std::any::Any;
use std::sync::Arc;

use super::redact::{diff, redact};
use super::{Operation, SkipReason, SyncContext, SyncError, SyncResult, Syncer, event_reason};
use crate::events::EventType;
use crate::meta::{Object, Resource, set_controller_reference};
use crate::store::{self, ObjectStore};

/// Mutation applied to the fetched (or freshly constructed) object.
pub type MutateFn<T> = Box<dyn FnMut(&mut T) -> Result<(), SyncError> + Send + Sync>;

/// Fetch `object` by key, apply `mutate` and persist the result.
///
/// Creates the object when it does not exist, updates it when `mutate`
/// changed it and leaves it alone otherwise. `mutate` must not change the
/// object key.
pub async fn create_or_update<T, F>(
	ctx: &SyncContext,
	store: &dyn ObjectStore,
	object: &mut T,
	mutate: F,
) -> Result<Operation, SyncError>
where
	T: Resource,
	F: FnOnce(&mut T) -> Result<(), SyncError> + Send,
{
	let key = object.key();
	if key.name.is_empty() {
		return Err(SyncError::MissingKey(format!("{} has no name", object.type_meta())));
	}

	let found = ctx
		.run(store::get_into(store, object))
		.await?
		.map_err(|e| SyncError::store("fetching", &key, e))?;

	if !found {
		mutate(object)?;
		if object.key() != key {
			return Err(SyncError::KeyChanged {
				before: key,
				after: object.key(),
			});
		}
		ctx.run(store::create(store, object))
			.await?
			.map_err(|e| SyncError::store("creating", &key, e))?;
		return Ok(Operation::Created);
	}

	let existing = serde_json::to_value(&*object)?;
	mutate(object)?;
	if object.key() != key {
		return Err(SyncError::KeyChanged {
			before: key,
			after: object.key(),
		});
	}
	if existing == serde_json::to_value(&*object)? {
		return Ok(Operation::None);
	}

	ctx.run(store::update(store, object))
		.await?
		.map_err(|e| SyncError::store("updating", &key, e))?;
	Ok(Operation::Updated)
}

/// Create-or-update syncer for a stored object.
///
/// The mutate function shapes the desired state; the syncer then keeps the
/// owner's controller reference on the object, unless the owner is being
/// deleted.
pub struct ObjectSyncer<T: Resource> {
	name: String,
	owner: Option<Box<dyn Object>>,
	object: T,
	previous: Option<T>,
	last_diff: String,
	store: Arc<dyn ObjectStore>,
	sync_fn: MutateFn<T>,
}

impl<T: Resource> ObjectSyncer<T> {
	/// `name` is used in logs and event reasons and should read as an upper
	/// camel case identifier, e.g. `MysqlStatefulSet`.
	pub fn new<F>(
		name: impl Into<String>,
		owner: Option<Box<dyn Object>>,
		object: T,
		store: Arc<dyn ObjectStore>,
		sync_fn: F,
	) -> Self
	where
		F: FnMut(&mut T) -> Result<(), SyncError> + Send + Sync + 'static,
	{
		Self {
			name: name.into(),
			owner,
			object,
			previous: None,
			last_diff: String::new(),
			store,
			sync_fn: Box::new(sync_fn),
		}
	}

	/// Current state of the subject.
	pub fn object_ref(&self) -> &T {
		&self.object
	}

	pub fn into_object(self) -> T {
		self.object
	}

	/// Snapshot of the stored object taken before the last mutation; `None`
	/// when the last sync created it.
	pub fn previous_object(&self) -> Option<&T> {
		self.previous.as_ref()
	}

	/// Redacted diff between the snapshot and the subject, as logged by the
	/// last sync.
	pub fn last_diff(&self) -> &str {
		&self.last_diff
	}

	async fn reconcile(&mut self, ctx: &SyncContext) -> Result<Operation, SyncError> {
		self.previous = None;
		let owner = self.owner.as_deref();
		let previous = &mut self.previous;
		let sync_fn = &mut self.sync_fn;

		create_or_update(ctx, self.store.as_ref(), &mut self.object, |object| {
			// only fetched objects carry a creation timestamp
			*previous = object.meta().creation_timestamp.is_some().then(|| object.clone());
			sync_fn(object)?;

			let Some(owner) = owner else {
				return Ok(());
			};
			if !owner.meta().is_being_deleted() {
				set_controller_reference(owner, object.meta_mut())?;
			} else if object.meta().creation_timestamp.is_none() {
				// without an owner reference nothing would collect the object
				return Err(SyncError::OwnerDeleted);
			}
			Ok(())
		})
		.await
	}

	fn diff_lines(&self) -> String {
		let type_meta = self.object.type_meta();
		let before = match &self.previous {
			Some(previous) => serde_json::to_value(previous).unwrap_or(Value::Null),
			None => Value::Object(Default::default()),
		};
		let after = serde_json::to_value(&self.object).unwrap_or(Value::Null);
		diff(&redact(&type_meta, &before), &redact(&type_meta, &after)).join("\n")
	}
}

#[async_trait]
impl<T: Resource> Syncer for ObjectSyncer<T> {
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
		let result = self.reconcile(ctx).await;
		let kind = self.object_type();
		self.last_diff = self.diff_lines();
		let diff = self.last_diff.as_str();

		match result {
			Err(SyncError::OwnerDeleted) => {
				tracing::info!(syncer = %self.name, key = %key, kind = %kind, error = %SyncError::OwnerDeleted, "unchanged");
				SyncResult::skipped(SkipReason::OwnerDeleted)
			}
			Err(SyncError::Ignored(reason)) => {
				tracing::debug!(syncer = %self.name, key = %key, kind = %kind, error = %reason, "syncer skipped");
				SyncResult::skipped(SkipReason::Ignored(reason))
			}
			Err(err) => {
				tracing::error!(syncer = %self.name, key = %key, kind = %kind, diff = %diff, error = %err, "unchanged");
				let message = format!("{kind} {key} failed syncing: {err}");
				SyncResult::failed(Operation::None, err).with_event(
					EventType::Warning,
					event_reason(&self.name, true),
					message,
				)
			}
			Ok(operation) => {
				tracing::debug!(syncer = %self.name, key = %key, kind = %kind, diff = %diff, "{}", operation);
				SyncResult::persisted(operation).with_event(
					EventType::Normal,
					event_reason(&self.name, false),
					format!("{kind} {key} {operation} successfully"),
				)
			}
		}
	}
}
