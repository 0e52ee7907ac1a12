//! Typed resources handled by the syncers, plus a schemaless fallback.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use crate::meta::{Object, ObjectMeta, Resource, TypeMeta};

macro_rules! impl_resource {
	($ty:ty, $api_version:expr, $kind:expr) => {
		impl $ty {
			pub const API_VERSION: &'static str = $api_version;
			pub const KIND: &'static str = $kind;

			pub fn type_meta_static() -> TypeMeta {
				TypeMeta::new(Self::API_VERSION, Self::KIND)
			}
		}

		impl Object for $ty {
			fn type_meta(&self) -> TypeMeta {
				Self::type_meta_static()
			}

			fn meta(&self) -> &ObjectMeta {
				&self.metadata
			}
		}

		impl Resource for $ty {
			fn meta_mut(&mut self) -> &mut ObjectMeta {
				&mut self.metadata
			}
		}
	};
}

/// Secret payloads; `data` values are base64 encoded.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Secret {
	#[serde(default)]
	pub metadata: ObjectMeta,
	#[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
	pub data: BTreeMap<String, String>,
	#[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
	pub string_data: BTreeMap<String, String>,
	#[serde(rename = "type", default, skip_serializing_if = "String::is_empty")]
	pub type_: String,
}

impl Secret {
	pub fn new(namespace: &str, name: &str) -> Self {
		Self {
			metadata: ObjectMeta::new(namespace, name),
			..Default::default()
		}
	}
}

impl_resource!(Secret, "v1", "Secret");

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigMap {
	#[serde(default)]
	pub metadata: ObjectMeta,
	#[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
	pub data: BTreeMap<String, String>,
	#[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
	pub binary_data: BTreeMap<String, String>,
}

impl ConfigMap {
	pub fn new(namespace: &str, name: &str) -> Self {
		Self {
			metadata: ObjectMeta::new(namespace, name),
			..Default::default()
		}
	}
}

impl_resource!(ConfigMap, "v1", "ConfigMap");

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LabelSelector {
	#[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
	pub match_labels: BTreeMap<String, String>,
}

/// Pod template; the pod spec stays in wire form so the pod spec merge
/// registry can work on it directly.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PodTemplateSpec {
	#[serde(default)]
	pub metadata: ObjectMeta,
	#[serde(default)]
	pub spec: Value,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentSpec {
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub replicas: Option<i32>,
	#[serde(default)]
	pub selector: LabelSelector,
	#[serde(default)]
	pub template: PodTemplateSpec,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Deployment {
	#[serde(default)]
	pub metadata: ObjectMeta,
	#[serde(default)]
	pub spec: DeploymentSpec,
}

impl Deployment {
	pub fn new(namespace: &str, name: &str) -> Self {
		Self {
			metadata: ObjectMeta::new(namespace, name),
			..Default::default()
		}
	}
}

impl_resource!(Deployment, "apps/v1", "Deployment");

/// Object of any type, carrying its type information and untyped content.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DynamicObject {
	#[serde(flatten)]
	pub types: TypeMeta,
	#[serde(default)]
	pub metadata: ObjectMeta,
	#[serde(flatten)]
	pub data: Map<String, Value>,
}

impl DynamicObject {
	pub fn new(types: TypeMeta, namespace: &str, name: &str) -> Self {
		Self {
			types,
			metadata: ObjectMeta::new(namespace, name),
			data: Map::new(),
		}
	}
}

impl Object for DynamicObject {
	fn type_meta(&self) -> TypeMeta {
		self.types.clone()
	}

	fn meta(&self) -> &ObjectMeta {
		&self.metadata
	}
}

impl Resource for DynamicObject {
	fn meta_mut(&mut self) -> &mut ObjectMeta {
		&mut self.metadata
	}
}

#[cfg(test)]
#[cfg(feature = "unit-tests")]
mod tests {
	use pretty_assertions::assert_eq;
	use serde_json::json;

	use super::*;

	#[test]
	fn dynamic_object_keeps_unknown_content() {
		let value = json!({
			"apiVersion": "example.io/v1",
			"kind": "Widget",
			"metadata": {"name": "w", "namespace": "default"},
			"spec": {"size": 3},
		});

		let object: DynamicObject = serde_json::from_value(value.clone()).unwrap();

		assert_eq!(object.type_meta(), TypeMeta::new("example.io/v1", "Widget"));
		assert_eq!(object.key().to_string(), "default/w");
		assert_eq!(object.data.get("spec"), Some(&json!({"size": 3})));
		assert_eq!(serde_json::to_value(&object).unwrap(), value);
	}

	#[test]
	fn typed_resources_report_their_kind() {
		assert_eq!(Secret::new("ns", "s").type_meta().to_string(), "v1, Kind=Secret");
		assert_eq!(
			Deployment::new("ns", "d").type_meta().to_string(),
			"apps/v1, Kind=Deployment"
		);
	}
}
