//! Object metadata shared by every stored resource.

pub mod finalizer;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

pub use finalizer::{add_finalizer, has_finalizer, remove_finalizer};

/// Namespaced name identifying an object within its type.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectKey {
	pub namespace: String,
	pub name: String,
}

impl ObjectKey {
	pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
		Self {
			namespace: namespace.into(),
			name: name.into(),
		}
	}
}

impl fmt::Display for ObjectKey {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}/{}", self.namespace, self.name)
	}
}

/// API version and kind of an object.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypeMeta {
	pub api_version: String,
	pub kind: String,
}

impl TypeMeta {
	pub fn new(api_version: impl Into<String>, kind: impl Into<String>) -> Self {
		Self {
			api_version: api_version.into(),
			kind: kind.into(),
		}
	}
}

impl fmt::Display for TypeMeta {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}, Kind={}", self.api_version, self.kind)
	}
}

/// Reference from a dependent object to the object owning it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnerReference {
	pub api_version: String,
	pub kind: String,
	pub name: String,
	pub uid: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub controller: Option<bool>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub block_owner_deletion: Option<bool>,
}

impl OwnerReference {
	pub fn is_controller(&self) -> bool {
		self.controller.unwrap_or(false)
	}

	/// Whether both references point at the same owner, ignoring the API
	/// version.
	pub fn same_owner(&self, other: &OwnerReference) -> bool {
		self.kind == other.kind && self.name == other.name && group(&self.api_version) == group(&other.api_version)
	}
}

fn group(api_version: &str) -> &str {
	api_version.rsplit_once('/').map(|(g, _)| g).unwrap_or("")
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMeta {
	#[serde(default)]
	pub name: String,
	#[serde(default, skip_serializing_if = "String::is_empty")]
	pub namespace: String,
	#[serde(default, skip_serializing_if = "String::is_empty")]
	pub uid: String,
	#[serde(default, skip_serializing_if = "String::is_empty")]
	pub resource_version: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub creation_timestamp: Option<DateTime<Utc>>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub deletion_timestamp: Option<DateTime<Utc>>,
	#[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
	pub labels: BTreeMap<String, String>,
	#[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
	pub annotations: BTreeMap<String, String>,
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub owner_references: Vec<OwnerReference>,
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub finalizers: Vec<String>,
}

impl ObjectMeta {
	pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
		Self {
			name: name.into(),
			namespace: namespace.into(),
			..Default::default()
		}
	}

	pub fn key(&self) -> ObjectKey {
		ObjectKey::new(self.namespace.clone(), self.name.clone())
	}

	pub fn is_being_deleted(&self) -> bool {
		self.deletion_timestamp.is_some()
	}

	pub fn controller_reference(&self) -> Option<&OwnerReference> {
		self.owner_references.iter().find(|r| r.is_controller())
	}
}

/// Object-safe view of a stored object.
pub trait Object: Send + Sync {
	fn type_meta(&self) -> TypeMeta;
	fn meta(&self) -> &ObjectMeta;

	fn key(&self) -> ObjectKey {
		self.meta().key()
	}
}

/// A stored object with a serde representation the store understands.
pub trait Resource: Object + Clone + Serialize + DeserializeOwned + 'static {
	fn meta_mut(&mut self) -> &mut ObjectMeta;
}

/// Errors raised when linking an object to its owner.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OwnerError {
	#[error("{side} is not a managed object: missing {field}")]
	NotManaged { side: &'static str, field: &'static str },
	#[error("cross-namespace owner references are disallowed: owner {owner} in namespace {owner_namespace}, object in namespace {namespace}")]
	CrossNamespace {
		owner: String,
		owner_namespace: String,
		namespace: String,
	},
	#[error("object is already owned by another {kind} controller {name}")]
	AlreadyOwned { kind: String, name: String },
}

fn owner_reference(owner: &dyn Object) -> Result<OwnerReference, OwnerError> {
	let type_meta = owner.type_meta();
	let meta = owner.meta();
	let missing = if type_meta.kind.is_empty() {
		Some("kind")
	} else if type_meta.api_version.is_empty() {
		Some("apiVersion")
	} else if meta.name.is_empty() {
		Some("name")
	} else if meta.uid.is_empty() {
		Some("uid")
	} else {
		None
	};
	if let Some(field) = missing {
		return Err(OwnerError::NotManaged { side: "owner", field });
	}

	Ok(OwnerReference {
		api_version: type_meta.api_version,
		kind: type_meta.kind,
		name: meta.name.clone(),
		uid: meta.uid.clone(),
		controller: Some(true),
		block_owner_deletion: Some(true),
	})
}

/// Mark `owner` as the managing controller of `object`.
///
/// An existing reference to the same owner is replaced; a different
/// controller or an owner in another namespace is refused. Cluster scoped
/// owners (empty namespace) may own objects in any namespace.
pub fn set_controller_reference(owner: &dyn Object, object: &mut ObjectMeta) -> Result<(), OwnerError> {
	if object.name.is_empty() {
		return Err(OwnerError::NotManaged {
			side: "object",
			field: "name",
		});
	}
	let reference = owner_reference(owner)?;

	let owner_ns = &owner.meta().namespace;
	if !owner_ns.is_empty() && owner_ns != &object.namespace {
		return Err(OwnerError::CrossNamespace {
			owner: owner.key().to_string(),
			owner_namespace: owner_ns.clone(),
			namespace: object.namespace.clone(),
		});
	}

	if let Some(existing) = object.controller_reference() {
		if !existing.same_owner(&reference) {
			return Err(OwnerError::AlreadyOwned {
				kind: existing.kind.clone(),
				name: existing.name.clone(),
			});
		}
	}

	match object.owner_references.iter_mut().find(|r| r.same_owner(&reference)) {
		Some(existing) => *existing = reference,
		None => object.owner_references.push(reference),
	}
	Ok(())
}
