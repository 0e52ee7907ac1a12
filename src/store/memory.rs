use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{ObjectStore, StoreError};
use crate::meta::{ObjectKey, ObjectMeta, TypeMeta};

type Slot = (TypeMeta, ObjectKey);

/// In-process object store with the versioning rules of a real API server:
/// uids, creation timestamps and resource versions are assigned on write,
/// stale updates conflict and objects carrying finalizers are only marked
/// for deletion.
#[derive(Debug, Default)]
pub struct MemoryStore {
	objects: Mutex<HashMap<Slot, Value>>,
	version: AtomicU64,
}

fn read_meta(object: &Value) -> Result<ObjectMeta, StoreError> {
	let meta = object
		.get("metadata")
		.cloned()
		.ok_or_else(|| StoreError::Invalid("object has no metadata".to_string()))?;
	let meta: ObjectMeta = serde_json::from_value(meta)?;
	if meta.name.is_empty() {
		return Err(StoreError::Invalid("object name must not be empty".to_string()));
	}
	Ok(meta)
}

fn write_meta(object: &mut Value, type_meta: &TypeMeta, meta: &ObjectMeta) -> Result<(), StoreError> {
	let Value::Object(map) = object else {
		return Err(StoreError::Invalid("object must be a JSON map".to_string()));
	};
	map.insert("apiVersion".to_string(), Value::String(type_meta.api_version.clone()));
	map.insert("kind".to_string(), Value::String(type_meta.kind.clone()));
	map.insert("metadata".to_string(), serde_json::to_value(meta)?);
	Ok(())
}

impl MemoryStore {
	pub fn new() -> Self {
		Self::default()
	}

	fn next_version(&self) -> String {
		(self.version.fetch_add(1, Ordering::SeqCst) + 1).to_string()
	}

	/// Number of objects currently stored.
	pub async fn len(&self) -> usize {
		self.objects.lock().await.len()
	}

	pub async fn is_empty(&self) -> bool {
		self.objects.lock().await.is_empty()
	}
}

#[async_trait]
impl ObjectStore for MemoryStore {
	async fn get(&self, type_meta: &TypeMeta, key: &ObjectKey) -> Result<Option<Value>, StoreError> {
		let objects = self.objects.lock().await;
		Ok(objects.get(&(type_meta.clone(), key.clone())).cloned())
	}

	async fn create(&self, type_meta: &TypeMeta, mut object: Value) -> Result<Value, StoreError> {
		let mut meta = read_meta(&object)?;
		let key = meta.key();
		let slot = (type_meta.clone(), key.clone());

		let mut objects = self.objects.lock().await;
		if objects.contains_key(&slot) {
			return Err(StoreError::AlreadyExists {
				kind: type_meta.to_string(),
				key,
			});
		}

		meta.uid = Uuid::new_v4().to_string();
		meta.creation_timestamp = Some(Utc::now());
		meta.deletion_timestamp = None;
		meta.resource_version = self.next_version();
		write_meta(&mut object, type_meta, &meta)?;

		log::debug!("created {} {} at version {}", type_meta, key, meta.resource_version);
		objects.insert(slot, object.clone());
		Ok(object)
	}

	async fn update(&self, type_meta: &TypeMeta, mut object: Value) -> Result<Value, StoreError> {
		let mut meta = read_meta(&object)?;
		let key = meta.key();
		let slot = (type_meta.clone(), key.clone());

		let mut objects = self.objects.lock().await;
		let Some(stored) = objects.get(&slot) else {
			return Err(StoreError::NotFound {
				kind: type_meta.to_string(),
				key,
			});
		};
		let stored_meta = read_meta(stored)?;

		if !meta.resource_version.is_empty() && meta.resource_version != stored_meta.resource_version {
			return Err(StoreError::Conflict {
				kind: type_meta.to_string(),
				key,
				reason: format!(
					"resource version {} is stale, stored version is {}",
					meta.resource_version, stored_meta.resource_version
				),
			});
		}

		meta.uid = stored_meta.uid;
		meta.creation_timestamp = stored_meta.creation_timestamp;
		meta.deletion_timestamp = stored_meta.deletion_timestamp;
		meta.resource_version = self.next_version();
		write_meta(&mut object, type_meta, &meta)?;

		if meta.is_being_deleted() && meta.finalizers.is_empty() {
			log::debug!("finalized {} {}, removing", type_meta, key);
			objects.remove(&slot);
		} else {
			objects.insert(slot, object.clone());
		}
		Ok(object)
	}

	async fn delete(&self, type_meta: &TypeMeta, key: &ObjectKey) -> Result<(), StoreError> {
		let slot = (type_meta.clone(), key.clone());
		let mut objects = self.objects.lock().await;
		let Some(stored) = objects.get_mut(&slot) else {
			return Err(StoreError::NotFound {
				kind: type_meta.to_string(),
				key: key.clone(),
			});
		};

		let mut meta = read_meta(stored)?;
		if meta.finalizers.is_empty() {
			objects.remove(&slot);
			log::debug!("deleted {} {}", type_meta, key);
			return Ok(());
		}

		if meta.deletion_timestamp.is_none() {
			meta.deletion_timestamp = Some(Utc::now());
			meta.resource_version = self.next_version();
			write_meta(stored, type_meta, &meta)?;
		}
		log::debug!("{} {} has finalizers, marked for deletion", type_meta, key);
		Ok(())
	}
}

#[cfg(test)]
#[cfg(feature = "unit-tests")]
mod tests {
	use pretty_assertions::assert_eq;
	use serde_json::json;

	use super::*;

	fn config_map() -> TypeMeta {
		TypeMeta::new("v1", "ConfigMap")
	}

	#[tokio::test]
	async fn create_assigns_server_fields() {
		let store = MemoryStore::new();
		let created = store
			.create(&config_map(), json!({"metadata": {"name": "a", "namespace": "ns"}}))
			.await
			.unwrap();

		let meta = read_meta(&created).unwrap();
		assert!(!meta.uid.is_empty());
		assert!(meta.creation_timestamp.is_some());
		assert_eq!(meta.resource_version, "1");
		assert_eq!(created["kind"], "ConfigMap");

		let err = store
			.create(&config_map(), json!({"metadata": {"name": "a", "namespace": "ns"}}))
			.await
			.unwrap_err();
		assert!(matches!(err, StoreError::AlreadyExists { .. }));
	}

	#[tokio::test]
	async fn stale_updates_conflict() {
		let store = MemoryStore::new();
		let created = store
			.create(&config_map(), json!({"metadata": {"name": "a", "namespace": "ns"}}))
			.await
			.unwrap();

		let mut first = created.clone();
		first["data"] = json!({"k": "1"});
		store.update(&config_map(), first).await.unwrap();

		let mut second = created;
		second["data"] = json!({"k": "2"});
		let err = store.update(&config_map(), second).await.unwrap_err();
		assert!(matches!(err, StoreError::Conflict { .. }));
	}

	#[tokio::test]
	async fn update_of_missing_object_is_not_found() {
		let store = MemoryStore::new();
		let err = store
			.update(&config_map(), json!({"metadata": {"name": "a"}}))
			.await
			.unwrap_err();
		assert!(err.is_not_found());
	}

	#[tokio::test]
	async fn finalizers_defer_deletion() {
		let store = MemoryStore::new();
		let key = ObjectKey::new("ns", "a");
		store
			.create(
				&config_map(),
				json!({"metadata": {"name": "a", "namespace": "ns", "finalizers": ["x"]}}),
			)
			.await
			.unwrap();

		store.delete(&config_map(), &key).await.unwrap();
		let mut marked = store.get(&config_map(), &key).await.unwrap().unwrap();
		assert!(read_meta(&marked).unwrap().is_being_deleted());

		marked["metadata"]["finalizers"] = json!([]);
		store.update(&config_map(), marked).await.unwrap();
		assert!(store.get(&config_map(), &key).await.unwrap().is_none());
		assert!(store.is_empty().await);
	}

	#[tokio::test]
	async fn objects_are_scoped_by_type() {
		let store = MemoryStore::new();
		let object = json!({"metadata": {"name": "a", "namespace": "ns"}});
		store.create(&config_map(), object.clone()).await.unwrap();
		store.create(&TypeMeta::new("v1", "Secret"), object).await.unwrap();
		assert_eq!(store.len().await, 2);
	}
}
