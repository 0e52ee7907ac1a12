//! Type-driven structural merge.
//!
//! Values are walked as `serde_json::Value` alongside a [`Schema`] describing
//! each tagged type. A [`Transformers`] registry supplies per-type strategies;
//! types without one are merged field by field with non-zero source values
//! winning.

pub mod error;
pub mod list;
pub mod pod_spec;
pub mod schema;
pub mod transformers;

pub use error::MergeError;
pub use list::merge_list_by_key;
pub use pod_spec::{POD_SPEC, POD_SPEC_TAG, pod_spec_schema, pod_spec_transformers};
pub use schema::{Field, ScalarKind, Schema, Shape, TypeTag, is_zero};
pub use transformers::{Transformer, Transformers, overwrite_if_nonzero, overwrite_if_present};
