use serde_json::Value;

use super::error::MergeError;
use super::schema::{TypeTag, kind_name};
use super::transformers::Transformers;

/// Value of a list element's key field.
#[derive(Debug, Clone, Copy, PartialEq)]
enum KeyValue<'a> {
	Int(i64),
	Uint(u64),
	Float(f64),
	Str(&'a str),
	Bool(bool),
}

impl<'a> KeyValue<'a> {
	/// Extract `key` from a list element. Elements without the field (or with
	/// a null value) have no key and never match.
	fn of(elem: &'a Value, key: &str) -> Result<Option<Self>, MergeError> {
		let Some(value) = elem.get(key) else {
			return Ok(None);
		};
		match value {
			Value::Null => Ok(None),
			Value::Bool(b) => Ok(Some(Self::Bool(*b))),
			Value::String(s) => Ok(Some(Self::Str(s))),
			Value::Number(n) => {
				if let Some(i) = n.as_i64() {
					Ok(Some(Self::Int(i)))
				} else if let Some(u) = n.as_u64() {
					Ok(Some(Self::Uint(u)))
				} else {
					Ok(n.as_f64().map(Self::Float))
				}
			}
			other => Err(MergeError::UnsupportedKey {
				key: key.to_string(),
				kind: kind_name(other),
			}),
		}
	}

	fn kind(&self) -> &'static str {
		match self {
			// i64 and u64 are the same JSON integer kind
			Self::Int(_) | Self::Uint(_) => "integer",
			Self::Float(_) => "float",
			Self::Str(_) => "string",
			Self::Bool(_) => "bool",
		}
	}

	fn matches(&self, other: &Self) -> bool {
		match (self, other) {
			(Self::Int(a), Self::Int(b)) => a == b,
			(Self::Uint(a), Self::Uint(b)) => a == b,
			(Self::Int(a), Self::Uint(b)) | (Self::Uint(b), Self::Int(a)) => {
				u64::try_from(*a).is_ok_and(|a| a == *b)
			}
			(Self::Float(a), Self::Float(b)) => a == b,
			(Self::Str(a), Self::Str(b)) => a == b,
			(Self::Bool(a), Self::Bool(b)) => a == b,
			_ => false,
		}
	}
}

/// Index of the first element of `list` whose `key` equals `elem_key`.
///
/// Fails when an element scanned before the match carries the key with a
/// different kind.
fn index_by_key(
	key: &str,
	elem_key: Option<KeyValue<'_>>,
	list: &[Value],
) -> Result<Option<usize>, MergeError> {
	let Some(elem_key) = elem_key else {
		return Ok(None);
	};

	for (i, candidate) in list.iter().enumerate() {
		let Some(candidate_key) = KeyValue::of(candidate, key)? else {
			continue;
		};
		if candidate_key.kind() != elem_key.kind() {
			return Err(MergeError::KeyKindMismatch {
				key: key.to_string(),
				dst: candidate_key.kind(),
				src: elem_key.kind(),
			});
		}
		if candidate_key.matches(&elem_key) {
			return Ok(Some(i));
		}
	}

	Ok(None)
}

/// Merge the list `src` into `dst`, matching elements by their `key` field.
///
/// Matched elements are deep merged in place with `transformers` applied to
/// the element type `elem`; unmatched source elements are appended. Unless
/// `append` is set, the destination is then replaced by the merged elements in
/// source order, dropping destination elements whose key is not in `src`.
pub fn merge_list_by_key(
	transformers: &Transformers,
	elem: &TypeTag,
	key: &str,
	dst: &mut Value,
	src: &Value,
	append: bool,
) -> Result<(), MergeError> {
	let src_items = match src {
		Value::Array(items) => items,
		Value::Null => return Ok(()),
		other => {
			return Err(MergeError::NotSettable {
				dst: "list",
				src: kind_name(other),
			});
		}
	};

	if dst.is_null() {
		*dst = Value::Array(Vec::with_capacity(src_items.len()));
	}
	let dst_kind = kind_name(dst);
	let Value::Array(dst_items) = dst else {
		return Err(MergeError::NotSettable {
			dst: dst_kind,
			src: "list",
		});
	};

	// destination index backing each source position
	let mut entries = Vec::with_capacity(src_items.len());
	for item in src_items {
		let item_key = KeyValue::of(item, key)?;
		let idx = match index_by_key(key, item_key, dst_items)? {
			Some(idx) => {
				transformers.merge(elem, &mut dst_items[idx], item)?;
				idx
			}
			None => {
				dst_items.push(item.clone());
				dst_items.len() - 1
			}
		};
		entries.push(idx);
	}

	if !append {
		let merged: Vec<Value> = entries.iter().map(|&i| dst_items[i].clone()).collect();
		*dst_items = merged;
	}

	Ok(())
}

#[cfg(test)]
#[cfg(feature = "unit-tests")]
mod tests {
	use pretty_assertions::assert_eq;
	use serde_json::json;

	use super::*;
	use crate::merge::schema::{INT32, STRING, Schema};
	use crate::merge::transformers::Transformer;

	const PORT: TypeTag = TypeTag::from_static("test.Port");
	const PORTS: TypeTag = TypeTag::from_static("[]test.Port");

	fn registry(append: bool) -> Transformers {
		let schema = Schema::new()
			.record(PORT, &[("name", STRING), ("port", INT32), ("protocol", STRING)])
			.list(PORTS, PORT);
		let list = if append {
			Transformer::append_list_by_key("port")
		} else {
			Transformer::merge_list_by_key("port")
		};
		Transformers::new(schema).with(PORTS, list)
	}

	#[test]
	fn replace_mode_follows_source_order() {
		let t = registry(false);
		let mut dst = json!([
			{"name": "http", "port": 80},
			{"name": "metrics", "port": 9125},
			{"name": "admin", "port": 8080},
		]);
		let src = json!([
			{"port": 8080, "protocol": "TCP"},
			{"name": "web", "port": 80},
		]);

		merge_list_by_key(&t, &PORT, "port", &mut dst, &src, false).unwrap();

		assert_eq!(
			dst,
			json!([
				{"name": "admin", "port": 8080, "protocol": "TCP"},
				{"name": "web", "port": 80},
			])
		);
	}

	#[test]
	fn append_mode_keeps_untouched_elements() {
		let t = registry(true);
		let mut dst = json!([{"name": "http", "port": 80}, {"name": "admin", "port": 8080}]);
		let src = json!([{"port": 9125, "name": "metrics"}, {"port": 80, "protocol": "UDP"}]);

		merge_list_by_key(&t, &PORT, "port", &mut dst, &src, true).unwrap();

		assert_eq!(
			dst,
			json!([
				{"name": "http", "port": 80, "protocol": "UDP"},
				{"name": "admin", "port": 8080},
				{"name": "metrics", "port": 9125},
			])
		);
	}

	#[test]
	fn empty_source_empties_destination_in_replace_mode() {
		let t = registry(false);
		let mut dst = json!([{"port": 80}]);
		merge_list_by_key(&t, &PORT, "port", &mut dst, &json!([]), false).unwrap();
		assert_eq!(dst, json!([]));
	}

	#[test]
	fn duplicate_source_keys_merge_into_one_element() {
		let t = registry(false);
		let mut dst = json!([]);
		let src = json!([
			{"port": 80, "name": "first"},
			{"port": 80, "name": "second", "protocol": "TCP"},
		]);

		merge_list_by_key(&t, &PORT, "port", &mut dst, &src, false).unwrap();

		let expected = json!({"port": 80, "name": "second", "protocol": "TCP"});
		assert_eq!(dst, json!([expected.clone(), expected]));
	}

	#[test]
	fn key_kind_mismatch_is_an_error() {
		let t = registry(false);
		let mut dst = json!([{"port": "80"}]);
		let err = merge_list_by_key(&t, &PORT, "port", &mut dst, &json!([{"port": 80}]), false)
			.unwrap_err();

		assert!(matches!(
			err,
			MergeError::KeyKindMismatch {
				dst: "string",
				src: "integer",
				..
			}
		));
	}

	#[test]
	fn composite_keys_are_rejected() {
		let t = registry(false);
		let mut dst = json!([]);
		let err = merge_list_by_key(&t, &PORT, "port", &mut dst, &json!([{"port": [80]}]), false)
			.unwrap_err();
		assert!(matches!(err, MergeError::UnsupportedKey { kind: "list", .. }));
	}

	#[test]
	fn elements_without_key_are_appended() {
		let t = registry(true);
		let mut dst = json!([{"name": "a"}]);
		merge_list_by_key(&t, &PORT, "port", &mut dst, &json!([{"name": "b"}]), true).unwrap();
		assert_eq!(dst, json!([{"name": "a"}, {"name": "b"}]));
	}

	#[test]
	fn numeric_keys_compare_across_integer_representations() {
		assert!(KeyValue::Int(80).matches(&KeyValue::Uint(80)));
		assert!(!KeyValue::Int(-1).matches(&KeyValue::Uint(u64::MAX)));
		assert!(!KeyValue::Float(80.0).matches(&KeyValue::Int(80)));
	}
}
