use super::ObjectMeta;

/// Append `finalizer` unless it is already present.
pub fn add_finalizer(meta: &mut ObjectMeta, finalizer: &str) {
	if has_finalizer(meta, finalizer) {
		return;
	}
	meta.finalizers.push(finalizer.to_string());
}

pub fn has_finalizer(meta: &ObjectMeta, finalizer: &str) -> bool {
	meta.finalizers.iter().any(|f| f == finalizer)
}

/// Remove every occurrence of `finalizer`, keeping the order of the others.
pub fn remove_finalizer(meta: &mut ObjectMeta, finalizer: &str) {
	meta.finalizers.retain(|f| f != finalizer);
}
