//! Access to the remote, versioned object store.
//!
//! Stores exchange objects in their JSON wire form; the typed helpers in this
//! module convert to and from [`Resource`] implementations.

pub mod memory;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::meta::{ObjectKey, Resource, TypeMeta};

pub use memory::MemoryStore;

#[derive(Debug, Error)]
pub enum StoreError {
	#[error("{kind} {key} not found")]
	NotFound { kind: String, key: ObjectKey },
	#[error("{kind} {key} already exists")]
	AlreadyExists { kind: String, key: ObjectKey },
	#[error("conflict updating {kind} {key}: {reason}")]
	Conflict {
		kind: String,
		key: ObjectKey,
		reason: String,
	},
	#[error("invalid object: {0}")]
	Invalid(String),
	#[error("store backend error: {0}")]
	Backend(#[from] anyhow::Error),
}

impl StoreError {
	pub fn is_not_found(&self) -> bool {
		matches!(self, StoreError::NotFound { .. })
	}
}

impl From<serde_json::Error> for StoreError {
	fn from(err: serde_json::Error) -> Self {
		StoreError::Invalid(err.to_string())
	}
}

/// Minimal interface to a versioned object store.
#[async_trait]
pub trait ObjectStore: Send + Sync + 'static {
	/// Fetch an object; `None` when it does not exist.
	async fn get(&self, type_meta: &TypeMeta, key: &ObjectKey) -> Result<Option<Value>, StoreError>;
	/// Create an object and return the stored representation.
	async fn create(&self, type_meta: &TypeMeta, object: Value) -> Result<Value, StoreError>;
	/// Replace an existing object. The resource version of `object`, when
	/// set, must match the stored one.
	async fn update(&self, type_meta: &TypeMeta, object: Value) -> Result<Value, StoreError>;
	async fn delete(&self, type_meta: &TypeMeta, key: &ObjectKey) -> Result<(), StoreError>;
}

/// Load the stored state of `object` into it. Returns `false` when the object
/// does not exist, leaving `object` untouched.
pub async fn get_into<T: Resource>(store: &dyn ObjectStore, object: &mut T) -> Result<bool, StoreError> {
	match store.get(&object.type_meta(), &object.key()).await? {
		Some(value) => {
			*object = serde_json::from_value(value)?;
			Ok(true)
		}
		None => Ok(false),
	}
}

pub async fn create<T: Resource>(store: &dyn ObjectStore, object: &mut T) -> Result<(), StoreError> {
	let stored = store.create(&object.type_meta(), serde_json::to_value(&*object)?).await?;
	*object = serde_json::from_value(stored)?;
	Ok(())
}

pub async fn update<T: Resource>(store: &dyn ObjectStore, object: &mut T) -> Result<(), StoreError> {
	let stored = store.update(&object.type_meta(), serde_json::to_value(&*object)?).await?;
	*object = serde_json::from_value(stored)?;
	Ok(())
}

pub async fn delete<T: Resource>(store: &dyn ObjectStore, object: &T) -> Result<(), StoreError> {
	store.delete(&object.type_meta(), &object.key()).await
}
