use crate::meta::{Object, ObjectMeta};

/// A change observed on a watched object.
pub enum WatchEvent<'a> {
	Create(&'a dyn Object),
	Update { old: &'a dyn Object, new: &'a dyn Object },
	Delete(&'a dyn Object),
	/// Externally triggered requeue, e.g. a [`crate::beat::Tick`].
	Generic(Option<&'a dyn Object>),
}

/// Gate deciding which watch events reach a reconciler.
pub trait Predicate: Send + Sync {
	fn create(&self, object: &dyn Object) -> bool;
	fn update(&self, old: &dyn Object, new: &dyn Object) -> bool;
	fn delete(&self, object: &dyn Object) -> bool;
	fn generic(&self, object: Option<&dyn Object>) -> bool;

	fn matches(&self, event: &WatchEvent<'_>) -> bool {
		match event {
			WatchEvent::Create(object) => self.create(*object),
			WatchEvent::Update { old, new } => self.update(*old, *new),
			WatchEvent::Delete(object) => self.delete(*object),
			WatchEvent::Generic(object) => self.generic(*object),
		}
	}
}

/// Passes objects whose class annotation names this controller's class.
///
/// A missing or empty annotation counts as the default class, which is
/// empty unless set with [`FilterByClass::with_default_class`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterByClass {
	class: String,
	ann_key: String,
	default_class: String,
}

impl FilterByClass {
	pub fn new(class: impl Into<String>, ann_key: impl Into<String>) -> Self {
		Self {
			class: class.into(),
			ann_key: ann_key.into(),
			default_class: String::new(),
		}
	}

	pub fn with_default_class(mut self, default_class: impl Into<String>) -> Self {
		self.default_class = default_class.into();
		self
	}

	pub fn matches_class(&self, meta: &ObjectMeta) -> bool {
		let class = match meta.annotations.get(&self.ann_key) {
			Some(class) if !class.is_empty() => class,
			_ => &self.default_class,
		};
		*class == self.class
	}
}

impl Predicate for FilterByClass {
	fn create(&self, object: &dyn Object) -> bool {
		self.matches_class(object.meta())
	}

	fn update(&self, _old: &dyn Object, new: &dyn Object) -> bool {
		self.matches_class(new.meta())
	}

	fn delete(&self, object: &dyn Object) -> bool {
		self.matches_class(object.meta())
	}

	fn generic(&self, _object: Option<&dyn Object>) -> bool {
		true
	}
}
