use thiserror::Error;

use crate::merge::MergeError;
use crate::meta::{ObjectKey, OwnerError};
use crate::store::StoreError;

/// Errors produced while syncing an object.
///
/// `OwnerDeleted` and `Ignored` are control-flow signals: syncers absorb
/// them and report a skipped outcome instead of a failure.
#[derive(Debug, Error)]
pub enum SyncError {
	#[error("owner is deleted")]
	OwnerDeleted,

	#[error("{0}: ignored error")]
	Ignored(String),

	#[error("cannot extract the object key: {0}")]
	MissingKey(String),

	#[error("mutate function cannot change the object key from {before} to {after}")]
	KeyChanged { before: ObjectKey, after: ObjectKey },

	#[error(transparent)]
	Merge(#[from] MergeError),

	#[error("{side} is not a managed object: missing {field}")]
	NotManaged { side: &'static str, field: &'static str },

	#[error("object is already owned by another {kind} controller {name}")]
	AlreadyOwned { kind: String, name: String },

	#[error("cross-namespace owner references are disallowed: owner {owner}, object namespace {namespace}")]
	CrossNamespaceOwner { owner: String, namespace: String },

	#[error("error when {op} resource {key}: {source}")]
	Store {
		op: &'static str,
		key: ObjectKey,
		#[source]
		source: StoreError,
	},

	#[error("cannot serialize object: {0}")]
	Serialization(#[from] serde_json::Error),

	#[error("sync cancelled")]
	Cancelled,

	#[error(transparent)]
	Mutate(#[from] anyhow::Error),
}

impl SyncError {
	/// Mark `err` as ignored; the syncer treats it as a successful skip.
	pub fn ignored(err: impl std::fmt::Display) -> Self {
		SyncError::Ignored(err.to_string())
	}

	pub(crate) fn store(op: &'static str, key: &ObjectKey, source: StoreError) -> Self {
		SyncError::Store {
			op,
			key: key.clone(),
			source,
		}
	}

	pub fn is_ignored(&self) -> bool {
		matches!(self, SyncError::Ignored(_))
	}

	pub fn is_owner_deleted(&self) -> bool {
		matches!(self, SyncError::OwnerDeleted)
	}
}

impl From<OwnerError> for SyncError {
	fn from(err: OwnerError) -> Self {
		match err {
			OwnerError::NotManaged { side, field } => SyncError::NotManaged { side, field },
			OwnerError::AlreadyOwned { kind, name } => SyncError::AlreadyOwned { kind, name },
			OwnerError::CrossNamespace {
				owner, namespace, ..
			} => SyncError::CrossNamespaceOwner { owner, namespace },
		}
	}
}
