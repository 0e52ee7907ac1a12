mod common;

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

use reconcile_kit::observability::SyncMetrics;
use reconcile_kit::rate_limiter::{LimiterConfig, RateLimiter, ReadinessCheck};
use reconcile_kit::resources::Deployment;
use reconcile_kit::store::{self, get_into};
use reconcile_kit::{ObjectKey, ObjectStore};

use common::memory_store;

/// Ready once the stored deployment carries a `ready` label.
struct LabelledReady;

#[async_trait]
impl ReadinessCheck for LabelledReady {
	async fn is_ready(&self, store: &dyn ObjectStore, key: &ObjectKey) -> bool {
		let mut deployment = Deployment::new(&key.namespace, &key.name);
		match get_into(store, &mut deployment).await {
			Ok(true) => deployment.metadata.labels.contains_key("ready"),
			_ => false,
		}
	}
}

#[cfg(feature = "integration-tests")]
mod integration_tests {
	use super::*;

	fn config() -> LimiterConfig {
		LimiterConfig {
			max_items: 2,
			ready_grace: Duration::from_secs(10),
			poll_interval: Duration::from_secs(5),
			item_timeout: Duration::from_secs(120),
			log_frequency: Duration::from_secs(60),
		}
	}

	#[tokio::test(start_paused = true)]
	async fn test_limiter_releases_slots_of_ready_objects() {
		let (_mem, store) = memory_store();
		let metrics = Arc::new(SyncMetrics::new().unwrap());
		let limiter = Arc::new(
			RateLimiter::new(config(), store.clone(), Arc::new(LabelledReady))
				.unwrap()
				.with_metrics(metrics.clone()),
		);

		let mut keys = Vec::new();
		for name in ["a", "b", "c"] {
			let mut deployment = Deployment::new("default", name);
			store::create(store.as_ref(), &mut deployment).await.unwrap();
			keys.push(ObjectKey::new("default", name));
		}

		assert!(limiter.should_reconcile(&keys[0]).await);
		assert!(limiter.should_reconcile(&keys[1]).await);
		assert!(!limiter.should_reconcile(&keys[2]).await);
		assert_eq!(metrics.limiter_in_flight.get(), 2);

		let (stop, shutdown) = watch::channel(false);
		let task = tokio::spawn(limiter.clone().run(shutdown));

		let mut a = Deployment::new("default", "a");
		get_into(store.as_ref(), &mut a).await.unwrap();
		a.metadata.labels.insert("ready".to_string(), "true".to_string());
		store::update(store.as_ref(), &mut a).await.unwrap();

		tokio::time::sleep(Duration::from_secs(11)).await;

		let stats = limiter.stats().await;
		assert_eq!(stats.items, 1);
		assert_eq!(stats.not_ready, 1);
		assert_eq!(metrics.limiter_in_flight.get(), 1);
		assert_eq!(metrics.limiter_not_ready.get(), 1);
		assert!(limiter.should_reconcile(&keys[2]).await);

		stop.send(true).unwrap();
		task.await.unwrap();
	}

	#[tokio::test(start_paused = true)]
	async fn test_limiter_evicts_stuck_objects() {
		let (_mem, store) = memory_store();
		let limiter = Arc::new(RateLimiter::new(config(), store, Arc::new(LabelledReady)).unwrap());
		let key = ObjectKey::new("default", "missing");
		assert!(limiter.should_reconcile(&key).await);

		let (stop, shutdown) = watch::channel(false);
		let task = tokio::spawn(limiter.clone().run(shutdown));

		tokio::time::sleep(Duration::from_secs(60)).await;
		assert_eq!(limiter.stats().await.items, 1);

		tokio::time::sleep(Duration::from_secs(66)).await;
		assert_eq!(limiter.stats().await.items, 0);

		drop(stop);
		task.await.unwrap();
	}

	#[tokio::test]
	async fn test_forget_frees_a_slot() {
		let (_mem, store) = memory_store();
		let mut config = config();
		config.max_items = 1;
		let limiter = RateLimiter::new(config, store, Arc::new(LabelledReady)).unwrap();
		let a = ObjectKey::new("default", "a");
		let b = ObjectKey::new("default", "b");

		assert!(limiter.should_reconcile(&a).await);
		assert!(!limiter.should_reconcile(&b).await);
		assert!(limiter.forget(&a).await);
		assert!(limiter.should_reconcile(&b).await);
	}
}
