use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt;

/// Stable identifier of a structural type, e.g. `core/v1.Container` or
/// `[]core/v1.EnvVar`.
///
/// Tags are plain strings so registries can be declared as constants and
/// compared without any run-time type information.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TypeTag(Cow<'static, str>);

impl TypeTag {
	/// Build a tag from a static string; usable in `const` items.
	pub const fn from_static(tag: &'static str) -> Self {
		Self(Cow::Borrowed(tag))
	}

	pub fn new(tag: impl Into<String>) -> Self {
		Self(Cow::Owned(tag.into()))
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}
}

impl fmt::Display for TypeTag {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

impl From<&str> for TypeTag {
	fn from(tag: &str) -> Self {
		Self::new(tag)
	}
}

impl From<String> for TypeTag {
	fn from(tag: String) -> Self {
		Self::new(tag)
	}
}

pub const STRING: TypeTag = TypeTag::from_static("string");
pub const BOOL: TypeTag = TypeTag::from_static("bool");
pub const INT32: TypeTag = TypeTag::from_static("int32");
pub const INT64: TypeTag = TypeTag::from_static("int64");
pub const FLOAT64: TypeTag = TypeTag::from_static("float64");
pub const OPT_STRING: TypeTag = TypeTag::from_static("*string");
pub const OPT_BOOL: TypeTag = TypeTag::from_static("*bool");
pub const OPT_INT32: TypeTag = TypeTag::from_static("*int32");
pub const OPT_INT64: TypeTag = TypeTag::from_static("*int64");
pub const STRING_LIST: TypeTag = TypeTag::from_static("[]string");
pub const STRING_MAP: TypeTag = TypeTag::from_static("map[string]string");

/// Scalar kinds understood by the default merge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarKind {
	String,
	Integer,
	Float,
	Bool,
}

/// A named field of a record and the tag of its type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
	pub name: String,
	pub tag: TypeTag,
}

/// Structure of a tagged type. Records list their fields explicitly so the
/// merge walk knows which tag to resolve for every sub-value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Shape {
	Record(Vec<Field>),
	List(TypeTag),
	Map(TypeTag),
	Optional(TypeTag),
	Scalar(ScalarKind),
	/// Indivisible value: never merged field by field.
	Opaque,
}

/// Table of type shapes keyed by tag.
#[derive(Debug, Clone)]
pub struct Schema {
	shapes: HashMap<TypeTag, Shape>,
}

impl Default for Schema {
	fn default() -> Self {
		Self::new()
	}
}

impl Schema {
	/// Create a schema pre-populated with the scalar, optional scalar and
	/// string collection tags.
	pub fn new() -> Self {
		let mut schema = Self::empty();
		schema.shapes.insert(STRING, Shape::Scalar(ScalarKind::String));
		schema.shapes.insert(BOOL, Shape::Scalar(ScalarKind::Bool));
		schema.shapes.insert(INT32, Shape::Scalar(ScalarKind::Integer));
		schema.shapes.insert(INT64, Shape::Scalar(ScalarKind::Integer));
		schema.shapes.insert(FLOAT64, Shape::Scalar(ScalarKind::Float));
		schema.shapes.insert(OPT_STRING, Shape::Optional(STRING));
		schema.shapes.insert(OPT_BOOL, Shape::Optional(BOOL));
		schema.shapes.insert(OPT_INT32, Shape::Optional(INT32));
		schema.shapes.insert(OPT_INT64, Shape::Optional(INT64));
		schema.shapes.insert(STRING_LIST, Shape::List(STRING));
		schema.shapes.insert(STRING_MAP, Shape::Map(STRING));
		schema
	}

	/// A schema without any built-in tags.
	pub fn empty() -> Self {
		Self {
			shapes: HashMap::new(),
		}
	}

	/// Declare a record type.
	pub fn record(mut self, tag: TypeTag, fields: &[(&str, TypeTag)]) -> Self {
		let fields = fields
			.iter()
			.map(|(name, tag)| Field {
				name: (*name).to_string(),
				tag: tag.clone(),
			})
			.collect();
		self.shapes.insert(tag, Shape::Record(fields));
		self
	}

	pub fn list(mut self, tag: TypeTag, elem: TypeTag) -> Self {
		self.shapes.insert(tag, Shape::List(elem));
		self
	}

	pub fn map(mut self, tag: TypeTag, value: TypeTag) -> Self {
		self.shapes.insert(tag, Shape::Map(value));
		self
	}

	pub fn optional(mut self, tag: TypeTag, inner: TypeTag) -> Self {
		self.shapes.insert(tag, Shape::Optional(inner));
		self
	}

	pub fn opaque(mut self, tag: TypeTag) -> Self {
		self.shapes.insert(tag, Shape::Opaque);
		self
	}

	pub fn shape(&self, tag: &TypeTag) -> Option<&Shape> {
		self.shapes.get(tag)
	}

	pub fn is_optional(&self, tag: &TypeTag) -> bool {
		matches!(self.shapes.get(tag), Some(Shape::Optional(_)))
	}

	pub fn len(&self) -> usize {
		self.shapes.len()
	}

	pub fn is_empty(&self) -> bool {
		self.shapes.is_empty()
	}
}

/// Whether `value` is the zero value of its kind: null, `false`, `0`, the
/// empty string, or an empty list or map.
pub fn is_zero(value: &Value) -> bool {
	match value {
		Value::Null => true,
		Value::Bool(b) => !b,
		Value::Number(n) => n.as_f64() == Some(0.0),
		Value::String(s) => s.is_empty(),
		Value::Array(items) => items.is_empty(),
		Value::Object(map) => map.is_empty(),
	}
}

/// Human readable name of a JSON value kind, used in error messages.
pub(crate) fn kind_name(value: &Value) -> &'static str {
	match value {
		Value::Null => "null",
		Value::Bool(_) => "bool",
		Value::Number(_) => "number",
		Value::String(_) => "string",
		Value::Array(_) => "list",
		Value::Object(_) => "record",
	}
}

#[cfg(test)]
#[cfg(feature = "unit-tests")]
mod tests {
	use serde_json::json;

	use super::*;

	#[test]
	fn zero_values() {
		assert!(is_zero(&Value::Null));
		assert!(is_zero(&json!("")));
		assert!(is_zero(&json!(0)));
		assert!(is_zero(&json!(0.0)));
		assert!(is_zero(&json!(false)));
		assert!(is_zero(&json!([])));
		assert!(is_zero(&json!({})));

		assert!(!is_zero(&json!("x")));
		assert!(!is_zero(&json!(-1)));
		assert!(!is_zero(&json!(true)));
		assert!(!is_zero(&json!([0])));
	}

	#[test]
	fn builtin_tags_are_registered() {
		let schema = Schema::new();
		assert_eq!(
			schema.shape(&STRING),
			Some(&Shape::Scalar(ScalarKind::String))
		);
		assert!(schema.is_optional(&OPT_INT32));
		assert!(!schema.is_optional(&INT32));
		assert!(Schema::empty().is_empty());
	}

	#[test]
	fn record_declaration_keeps_field_order() {
		let tag = TypeTag::from_static("test.Pair");
		let schema = Schema::new().record(tag.clone(), &[("b", STRING), ("a", INT32)]);

		let Some(Shape::Record(fields)) = schema.shape(&tag) else {
			panic!("expected a record shape");
		};
		let names: Vec<_> = fields.iter().map(|f| f.name.as_str()).collect();
		assert_eq!(names, vec!["b", "a"]);
	}

	#[test]
	fn tags_compare_by_content() {
		assert_eq!(TypeTag::from_static("core/v1.Pod"), TypeTag::new("core/v1.Pod"));
		assert_eq!(TypeTag::from("x").to_string(), "x");
	}
}
