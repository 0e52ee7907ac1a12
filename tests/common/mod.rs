/// Shared fixtures for the integration tests.
use async_trait::async_trait;
use chrono::Utc;
use serde_json::{Value, json};
use std::sync::Arc;

use reconcile_kit::resources::Deployment;
use reconcile_kit::{MemoryStore, Object, ObjectKey, ObjectStore, StoreError, TypeMeta};

/// An owner as it would come back from the store: namespaced, with a uid.
#[allow(dead_code)]
pub fn owner(namespace: &str, name: &str) -> Deployment {
	let mut owner = Deployment::new(namespace, name);
	owner.metadata.uid = format!("uid-{name}");
	owner.metadata.creation_timestamp = Some(Utc::now());
	owner
}

/// Same as [`owner`], marked for deletion.
#[allow(dead_code)]
pub fn deleted_owner(namespace: &str, name: &str) -> Deployment {
	let mut owner = owner(namespace, name);
	owner.metadata.deletion_timestamp = Some(Utc::now());
	owner
}

#[allow(dead_code)]
pub fn boxed(object: impl Object + 'static) -> Option<Box<dyn Object>> {
	Some(Box::new(object))
}

#[allow(dead_code)]
pub fn memory_store() -> (Arc<MemoryStore>, Arc<dyn ObjectStore>) {
	let store = Arc::new(MemoryStore::new());
	let dyn_store: Arc<dyn ObjectStore> = store.clone();
	(store, dyn_store)
}

/// Store whose every call fails with a backend error.
#[allow(dead_code)]
pub struct FailingStore;

#[async_trait]
impl ObjectStore for FailingStore {
	async fn get(&self, _type_meta: &TypeMeta, _key: &ObjectKey) -> Result<Option<Value>, StoreError> {
		Err(anyhow::anyhow!("backend unavailable").into())
	}

	async fn create(&self, _type_meta: &TypeMeta, _object: Value) -> Result<Value, StoreError> {
		Err(anyhow::anyhow!("backend unavailable").into())
	}

	async fn update(&self, _type_meta: &TypeMeta, _object: Value) -> Result<Value, StoreError> {
		Err(anyhow::anyhow!("backend unavailable").into())
	}

	async fn delete(&self, _type_meta: &TypeMeta, _key: &ObjectKey) -> Result<(), StoreError> {
		Err(anyhow::anyhow!("backend unavailable").into())
	}
}

#[allow(dead_code)]
pub fn container(name: &str, image: &str, ports: &[i64]) -> Value {
	let ports: Vec<Value> = ports.iter().map(|p| json!({"containerPort": p})).collect();
	let mut container = json!({"name": name, "image": image});
	if !ports.is_empty() {
		container["ports"] = Value::Array(ports);
	}
	container
}

#[allow(dead_code)]
pub fn pod_spec(containers: Vec<Value>) -> Value {
	json!({"containers": containers})
}
