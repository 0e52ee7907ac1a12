mod common;

use std::sync::Arc;

use reconcile_kit::events::MemoryRecorder;
use reconcile_kit::meta::add_finalizer;
use reconcile_kit::resources::Deployment;
use reconcile_kit::store::{self, get_into};
use reconcile_kit::syncer::RemoveResourceSyncer;
use reconcile_kit::{Operation, SyncContext, SyncError, sync};

use common::{FailingStore, boxed, memory_store, owner};

#[cfg(feature = "integration-tests")]
mod integration_tests {
	use super::*;

	async fn seed(store: &dyn reconcile_kit::ObjectStore, name: &str) -> Deployment {
		let mut deployment = Deployment::new("default", name);
		store::create(store, &mut deployment).await.unwrap();
		deployment
	}

	#[tokio::test]
	async fn test_remove_existing_object() {
		let (mem, store) = memory_store();
		seed(store.as_ref(), "to-remove").await;
		let recorder = MemoryRecorder::new();

		let mut syncer = RemoveResourceSyncer::new(
			"TestRemoveResourceSyncer",
			boxed(owner("default", "parent")),
			Deployment::new("default", "to-remove"),
			store,
		);
		let op = sync(&SyncContext::new(), &mut syncer, Some(&recorder)).await.unwrap();

		assert_eq!(op, Operation::Deleted);
		assert!(mem.is_empty().await);
		assert_eq!(
			recorder.drain(),
			vec!["Normal TestRemoveResourceSyncerSyncSuccessfull apps/v1, Kind=Deployment default/to-remove successfully deleted"]
		);
	}

	#[tokio::test]
	async fn test_remove_missing_object_is_a_noop() {
		let (_mem, store) = memory_store();
		let recorder = MemoryRecorder::new();

		let mut syncer = RemoveResourceSyncer::new(
			"TestRemoveResourceSyncer",
			boxed(owner("default", "parent")),
			Deployment::new("default", "already-gone"),
			store,
		);
		let op = sync(&SyncContext::new(), &mut syncer, Some(&recorder)).await.unwrap();

		assert_eq!(op, Operation::None);
		assert!(recorder.is_empty());
	}

	#[tokio::test]
	async fn test_remove_twice_records_one_event() {
		let (_mem, store) = memory_store();
		seed(store.as_ref(), "twice").await;
		let recorder = MemoryRecorder::new();
		let ctx = SyncContext::new();

		for expected in [Operation::Deleted, Operation::None] {
			let mut syncer = RemoveResourceSyncer::new(
				"TestRemoveResourceSyncer",
				boxed(owner("default", "parent")),
				Deployment::new("default", "twice"),
				store.clone(),
			);
			assert_eq!(sync(&ctx, &mut syncer, Some(&recorder)).await.unwrap(), expected);
		}

		assert_eq!(recorder.len(), 1);
	}

	#[tokio::test]
	async fn test_remove_with_finalizer_marks_for_deletion() {
		let (mem, store) = memory_store();
		let mut deployment = Deployment::new("default", "guarded");
		add_finalizer(&mut deployment.metadata, "example.com/cleanup");
		store::create(store.as_ref(), &mut deployment).await.unwrap();

		let mut syncer = RemoveResourceSyncer::new(
			"TestRemoveResourceSyncer",
			None,
			Deployment::new("default", "guarded"),
			store,
		);
		assert_eq!(sync(&SyncContext::new(), &mut syncer, None).await.unwrap(), Operation::Deleted);

		let mut stored = Deployment::new("default", "guarded");
		assert!(get_into(mem.as_ref(), &mut stored).await.unwrap());
		assert!(stored.metadata.is_being_deleted());
	}

	#[tokio::test]
	async fn test_remove_store_failure() {
		let recorder = MemoryRecorder::new();
		let mut syncer = RemoveResourceSyncer::new(
			"TestRemoveResourceSyncer",
			boxed(owner("default", "parent")),
			Deployment::new("default", "to-remove"),
			Arc::new(FailingStore),
		);

		let err = sync(&SyncContext::new(), &mut syncer, Some(&recorder)).await.unwrap_err();

		assert!(matches!(err, SyncError::Store { op: "fetching", .. }), "unexpected error: {err}");
		assert!(err.to_string().starts_with("error when fetching resource"));
		assert!(recorder.is_empty());
	}
}
