use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::collections::HashMap;

use super::error::MergeError;
use super::list::merge_list_by_key;
use super::schema::{Field, Schema, Shape, TypeTag, is_zero, kind_name};

/// Merge strategy registered for a type tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transformer {
	/// Replace the destination when the source is non-zero. For optional
	/// tags only an absent source counts as zero.
	Overwrite,
	/// Copy the named record fields from the source, even when absent there.
	OverrideFields(Vec<String>),
	/// Deep merge fields present in the source and clear optional fields it
	/// leaves unset.
	NilOtherFields,
	/// Merge a list of records by the value of `key`.
	MergeListByKey { key: String, append: bool },
}

impl Transformer {
	/// Keyed list merge dropping destination elements missing from the source.
	pub fn merge_list_by_key(key: impl Into<String>) -> Self {
		Self::MergeListByKey {
			key: key.into(),
			append: false,
		}
	}

	/// Keyed list merge keeping destination elements missing from the source.
	pub fn append_list_by_key(key: impl Into<String>) -> Self {
		Self::MergeListByKey {
			key: key.into(),
			append: true,
		}
	}

	pub fn override_fields(fields: &[&str]) -> Self {
		Self::OverrideFields(fields.iter().map(|f| (*f).to_string()).collect())
	}
}

/// Registry of merge strategies over a [`Schema`].
///
/// The registry is consulted at every level of the walk: a tag with a
/// registered [`Transformer`] is merged by it alone, every other tag falls back
/// to the default merge for its shape.
#[derive(Debug, Clone)]
pub struct Transformers {
	schema: Schema,
	transformers: HashMap<TypeTag, Transformer>,
}

impl Transformers {
	pub fn new(schema: Schema) -> Self {
		Self {
			schema,
			transformers: HashMap::new(),
		}
	}

	/// Register `transformer` for `tag`, replacing any previous entry.
	pub fn with(mut self, tag: TypeTag, transformer: Transformer) -> Self {
		self.transformers.insert(tag, transformer);
		self
	}

	pub fn transformer(&self, tag: &TypeTag) -> Option<&Transformer> {
		self.transformers.get(tag)
	}

	pub fn schema(&self) -> &Schema {
		&self.schema
	}

	/// Deep merge `src` into `dst`, both holding a value of type `tag`.
	pub fn merge(&self, tag: &TypeTag, dst: &mut Value, src: &Value) -> Result<(), MergeError> {
		match self.transformers.get(tag) {
			Some(transformer) => self.apply(transformer, tag, dst, src),
			None => self.merge_default(tag, dst, src),
		}
	}

	/// Merge two typed values through their JSON representation.
	pub fn merge_typed<T>(&self, tag: &TypeTag, dst: &mut T, src: &T) -> Result<(), MergeError>
	where
		T: Serialize + DeserializeOwned,
	{
		let mut merged = serde_json::to_value(&*dst)?;
		let src = serde_json::to_value(src)?;
		self.merge(tag, &mut merged, &src)?;
		*dst = serde_json::from_value(merged)?;
		Ok(())
	}

	fn apply(
		&self,
		transformer: &Transformer,
		tag: &TypeTag,
		dst: &mut Value,
		src: &Value,
	) -> Result<(), MergeError> {
		match transformer {
			Transformer::Overwrite if self.schema.is_optional(tag) => overwrite_if_present(dst, src),
			Transformer::Overwrite => overwrite_if_nonzero(dst, src),
			Transformer::OverrideFields(fields) => override_fields(fields, dst, src),
			Transformer::NilOtherFields => {
				let fields = self.record_fields(tag)?;
				self.nil_other_fields(fields, dst, src)
			}
			Transformer::MergeListByKey { key, append } => match self.schema.shape(tag) {
				Some(Shape::List(elem)) => merge_list_by_key(self, elem, key, dst, src, *append),
				_ => Err(MergeError::ShapeMismatch {
					tag: tag.clone(),
					expected: "list",
				}),
			},
		}
	}

	fn record_fields(&self, tag: &TypeTag) -> Result<&[Field], MergeError> {
		match self.schema.shape(tag) {
			Some(Shape::Record(fields)) => Ok(fields),
			_ => Err(MergeError::ShapeMismatch {
				tag: tag.clone(),
				expected: "record",
			}),
		}
	}

	fn nil_other_fields(&self, fields: &[Field], dst: &mut Value, src: &Value) -> Result<(), MergeError> {
		let Some(src_map) = as_record(src, "record")? else {
			return Ok(());
		};
		if dst.is_null() {
			*dst = src.clone();
			return Ok(());
		}
		let dst_map = as_record_mut(dst)?;

		for field in fields {
			match src_map.get(&field.name).filter(|v| !v.is_null()) {
				Some(value) => self.merge_slot(&field.tag, dst_map, &field.name, value)?,
				None if self.schema.is_optional(&field.tag) => {
					dst_map.remove(&field.name);
				}
				None => {}
			}
		}

		for (name, value) in src_map {
			if !fields.iter().any(|f| &f.name == name) && !value.is_null() {
				merge_untyped_slot(dst_map, name, value)?;
			}
		}
		Ok(())
	}

	fn merge_default(&self, tag: &TypeTag, dst: &mut Value, src: &Value) -> Result<(), MergeError> {
		match self.schema.shape(tag) {
			Some(Shape::Record(fields)) => self.merge_record(fields, dst, src),
			Some(Shape::Optional(inner)) => {
				if src.is_null() {
					return Ok(());
				}
				if dst.is_null() {
					*dst = src.clone();
					return Ok(());
				}
				self.merge(inner, dst, src)
			}
			Some(Shape::Map(value_tag)) => self.merge_map(value_tag, dst, src),
			// lists without a registered strategy are replaced wholesale
			Some(Shape::List(_)) | Some(Shape::Scalar(_)) | Some(Shape::Opaque) | None => {
				overwrite_if_nonzero(dst, src)
			}
		}
	}

	fn merge_record(&self, fields: &[Field], dst: &mut Value, src: &Value) -> Result<(), MergeError> {
		let Some(src_map) = as_record(src, "record")? else {
			return Ok(());
		};
		if dst.is_null() {
			*dst = src.clone();
			return Ok(());
		}
		let dst_map = as_record_mut(dst)?;

		for (name, value) in src_map {
			if value.is_null() {
				continue;
			}
			match fields.iter().find(|f| &f.name == name) {
				Some(field) => self.merge_slot(&field.tag, dst_map, name, value)?,
				None => merge_untyped_slot(dst_map, name, value)?,
			}
		}
		Ok(())
	}

	fn merge_map(&self, value_tag: &TypeTag, dst: &mut Value, src: &Value) -> Result<(), MergeError> {
		let Some(src_map) = as_record(src, "map")? else {
			return Ok(());
		};
		if dst.is_null() {
			*dst = src.clone();
			return Ok(());
		}
		let dst_map = as_record_mut(dst)?;

		for (name, value) in src_map {
			if !value.is_null() {
				self.merge_slot(value_tag, dst_map, name, value)?;
			}
		}
		Ok(())
	}

	/// Merge `value` into the entry `name` of `dst`, creating the entry when the
	/// merge leaves something behind.
	fn merge_slot(
		&self,
		tag: &TypeTag,
		dst: &mut Map<String, Value>,
		name: &str,
		value: &Value,
	) -> Result<(), MergeError> {
		let mut slot = dst.remove(name).unwrap_or(Value::Null);
		let result = self.merge(tag, &mut slot, value);
		if !slot.is_null() {
			dst.insert(name.to_string(), slot);
		}
		result
	}
}

fn merge_untyped_slot(dst: &mut Map<String, Value>, name: &str, value: &Value) -> Result<(), MergeError> {
	let mut slot = dst.remove(name).unwrap_or(Value::Null);
	let result = merge_untyped(&mut slot, value);
	if !slot.is_null() {
		dst.insert(name.to_string(), slot);
	}
	result
}

/// Merge a value whose fields are not declared in the schema: records present
/// on both sides merge entry by entry, anything else is overwritten when the
/// source is non-zero.
fn merge_untyped(dst: &mut Value, src: &Value) -> Result<(), MergeError> {
	match (dst, src) {
		(Value::Object(dst_map), Value::Object(src_map)) => {
			for (name, value) in src_map {
				if !value.is_null() {
					merge_untyped_slot(dst_map, name, value)?;
				}
			}
			Ok(())
		}
		(dst, src) => overwrite_if_nonzero(dst, src),
	}
}

fn as_record<'a>(value: &'a Value, expected: &'static str) -> Result<Option<&'a Map<String, Value>>, MergeError> {
	match value {
		Value::Null => Ok(None),
		Value::Object(map) => Ok(Some(map)),
		other => Err(MergeError::NotSettable {
			dst: expected,
			src: kind_name(other),
		}),
	}
}

fn as_record_mut(value: &mut Value) -> Result<&mut Map<String, Value>, MergeError> {
	let kind = kind_name(value);
	match value {
		Value::Object(map) => Ok(map),
		_ => Err(MergeError::NotSettable {
			dst: kind,
			src: "record",
		}),
	}
}

fn override_fields(fields: &[String], dst: &mut Value, src: &Value) -> Result<(), MergeError> {
	let Some(src_map) = as_record(src, "record")? else {
		return Ok(());
	};
	if dst.is_null() {
		*dst = Value::Object(Map::new());
	}
	let dst_map = as_record_mut(dst)?;

	for field in fields {
		match src_map.get(field).filter(|v| !v.is_null()) {
			Some(value) => {
				dst_map.insert(field.clone(), value.clone());
			}
			None => {
				dst_map.remove(field);
			}
		}
	}
	Ok(())
}

#[derive(PartialEq)]
enum Category {
	Scalar,
	List,
	Record,
}

fn category(value: &Value) -> Option<Category> {
	match value {
		Value::Null => None,
		Value::Bool(_) | Value::Number(_) | Value::String(_) => Some(Category::Scalar),
		Value::Array(_) => Some(Category::List),
		Value::Object(_) => Some(Category::Record),
	}
}

/// Replace `dst` with `src` unless `src` is the zero value of its kind.
pub fn overwrite_if_nonzero(dst: &mut Value, src: &Value) -> Result<(), MergeError> {
	if is_zero(src) {
		return Ok(());
	}
	overwrite(dst, src)
}

/// Replace `dst` with `src` unless `src` is absent. Used for optional values,
/// where `0`, `false` and `""` are values in their own right.
pub fn overwrite_if_present(dst: &mut Value, src: &Value) -> Result<(), MergeError> {
	if src.is_null() {
		return Ok(());
	}
	overwrite(dst, src)
}

fn overwrite(dst: &mut Value, src: &Value) -> Result<(), MergeError> {
	if let Some(current) = category(dst) {
		if category(src) != Some(current) {
			return Err(MergeError::NotSettable {
				dst: kind_name(dst),
				src: kind_name(src),
			});
		}
	}
	*dst = src.clone();
	Ok(())
}
