//! Diagnostics helpers: payload redaction and structural diffs.

use serde_json::Value;

use crate::meta::TypeMeta;

/// Strip sensitive payloads from an object snapshot.
///
/// Secrets lose `data` and `stringData`; config maps lose `data` and
/// `binaryData`. Everything else, metadata included, is kept.
pub fn redact(type_meta: &TypeMeta, object: &Value) -> Value {
	let hidden: &[&str] = match (type_meta.api_version.as_str(), type_meta.kind.as_str()) {
		("v1", "Secret") => &["data", "stringData"],
		("v1", "ConfigMap") => &["data", "binaryData"],
		_ => return object.clone(),
	};

	let mut redacted = object.clone();
	if let Value::Object(map) = &mut redacted {
		for field in hidden {
			map.remove(*field);
		}
	}
	redacted
}

/// Line-per-difference comparison of two values, `path: before != after`.
pub fn diff(before: &Value, after: &Value) -> Vec<String> {
	let mut out = Vec::new();
	walk("", before, after, &mut out);
	out
}

fn join(path: &str, segment: &str) -> String {
	if path.is_empty() {
		segment.to_string()
	} else {
		format!("{path}.{segment}")
	}
}

fn show(value: Option<&Value>) -> String {
	match value {
		Some(value) => value.to_string(),
		None => "<none>".to_string(),
	}
}

fn walk(path: &str, before: &Value, after: &Value, out: &mut Vec<String>) {
	match (before, after) {
		(Value::Object(a), Value::Object(b)) => {
			for (key, left) in a {
				match b.get(key) {
					Some(right) => walk(&join(path, key), left, right, out),
					None => out.push(format!("{}: {} != <none>", join(path, key), left)),
				}
			}
			for (key, right) in b {
				if !a.contains_key(key) {
					out.push(format!("{}: <none> != {}", join(path, key), right));
				}
			}
		}
		(Value::Array(a), Value::Array(b)) => {
			for i in 0..a.len().max(b.len()) {
				let segment = format!("{path}[{i}]");
				match (a.get(i), b.get(i)) {
					(Some(left), Some(right)) => walk(&segment, left, right, out),
					(left, right) => out.push(format!("{segment}: {} != {}", show(left), show(right))),
				}
			}
		}
		_ if before != after => {
			let path = if path.is_empty() { "<root>" } else { path };
			out.push(format!("{path}: {before} != {after}"));
		}
		_ => {}
	}
}
