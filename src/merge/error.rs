use thiserror::Error;

use super::schema::TypeTag;

/// Errors raised while structurally merging two values.
#[derive(Debug, Error)]
pub enum MergeError {
	/// The key field of two list elements holds values of different kinds.
	#[error("cannot merge when key type differs: `{key}` is {dst} in destination and {src} in source")]
	KeyKindMismatch {
		key: String,
		dst: &'static str,
		src: &'static str,
	},

	/// The key field holds a composite value.
	#[error("cannot merge by key `{key}`: unsupported key kind {kind}")]
	UnsupportedKey { key: String, kind: &'static str },

	/// The destination cannot take the source value.
	#[error("cannot overwrite the given values: {dst} destination is not assignable from {src}")]
	NotSettable { dst: &'static str, src: &'static str },

	/// A transformer was registered for a tag whose shape it cannot handle.
	#[error("type `{tag}` is not a {expected} in the merge schema")]
	ShapeMismatch { tag: TypeTag, expected: &'static str },

	#[error("serialization error: {0}")]
	Serde(#[from] serde_json::Error),
}
