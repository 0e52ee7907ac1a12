use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{Mutex, watch};
use tokio::time::{Instant, MissedTickBehavior};

use crate::meta::ObjectKey;
use crate::observability::SyncMetrics;
use crate::store::ObjectStore;

/// Tuning for [`RateLimiter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LimiterConfig {
	/// Number of keys admitted at the same time.
	pub max_items: usize,
	/// Admitted keys younger than this are never checked for readiness.
	pub ready_grace: Duration,
	pub poll_interval: Duration,
	/// Admitted keys older than this are evicted whether ready or not.
	pub item_timeout: Duration,
	pub log_frequency: Duration,
}

impl Default for LimiterConfig {
	fn default() -> Self {
		Self {
			max_items: 10,
			ready_grace: Duration::from_secs(10),
			poll_interval: Duration::from_secs(5),
			item_timeout: Duration::from_secs(600),
			log_frequency: Duration::from_secs(60),
		}
	}
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LimiterError {
	#[error("max_items must be greater than zero")]
	NoCapacity,
	#[error("{0} must be greater than zero")]
	ZeroInterval(&'static str),
}

impl LimiterConfig {
	pub fn validate(&self) -> Result<(), LimiterError> {
		if self.max_items == 0 {
			return Err(LimiterError::NoCapacity);
		}
		if self.poll_interval.is_zero() {
			return Err(LimiterError::ZeroInterval("poll_interval"));
		}
		if self.log_frequency.is_zero() {
			return Err(LimiterError::ZeroInterval("log_frequency"));
		}
		Ok(())
	}
}

/// Decides whether an admitted key has finished its work and can release
/// its slot.
#[async_trait]
pub trait ReadinessCheck: Send + Sync {
	async fn is_ready(&self, store: &dyn ObjectStore, key: &ObjectKey) -> bool;
}

/// Counters from the last sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LimiterStats {
	pub items: usize,
	pub max_items: usize,
	pub not_ready: usize,
}

#[derive(Default)]
struct State {
	items: HashMap<ObjectKey, Instant>,
	not_ready: usize,
}

/// Bounds how many keys are reconciled concurrently.
///
/// A key is admitted by [`RateLimiter::should_reconcile`] and holds its slot
/// until a sweep finds it ready or it exceeds the item timeout.
pub struct RateLimiter {
	config: LimiterConfig,
	store: Arc<dyn ObjectStore>,
	readiness: Arc<dyn ReadinessCheck>,
	state: Mutex<State>,
	metrics: Option<Arc<SyncMetrics>>,
}

impl RateLimiter {
	pub fn new(
		config: LimiterConfig,
		store: Arc<dyn ObjectStore>,
		readiness: Arc<dyn ReadinessCheck>,
	) -> Result<Self, LimiterError> {
		config.validate()?;
		Ok(Self {
			config,
			store,
			readiness,
			state: Mutex::new(State::default()),
			metrics: None,
		})
	}

	/// Report admitted and not-ready counts on the limiter gauges.
	pub fn with_metrics(mut self, metrics: Arc<SyncMetrics>) -> Self {
		self.metrics = Some(metrics);
		self
	}

	pub fn config(&self) -> &LimiterConfig {
		&self.config
	}

	/// Admit `key` when a slot is free.
	///
	/// Admitting a key that already holds a slot refreshes its admission
	/// instant.
	pub async fn should_reconcile(&self, key: &ObjectKey) -> bool {
		let mut state = self.state.lock().await;
		if state.items.len() >= self.config.max_items && !state.items.contains_key(key) {
			return false;
		}
		state.items.insert(key.clone(), Instant::now());
		self.report(&state);
		true
	}

	/// Release `key` without waiting for the next sweep.
	pub async fn forget(&self, key: &ObjectKey) -> bool {
		let mut state = self.state.lock().await;
		let removed = state.items.remove(key).is_some();
		self.report(&state);
		removed
	}

	/// Evict timed-out and ready keys and recount the ones still pending.
	///
	/// Readiness is checked without holding the state lock; a key admitted
	/// again while its check runs keeps its slot.
	pub async fn sweep(&self) {
		let now = Instant::now();
		let candidates: Vec<(ObjectKey, Instant)> = {
			let mut state = self.state.lock().await;
			let mut candidates = Vec::new();
			state.items.retain(|key, admitted| {
				let age = now.saturating_duration_since(*admitted);
				if age > self.config.item_timeout {
					log::info!("timeout exceeded for {}, releasing it (age {:?})", key, age);
					return false;
				}
				if age >= self.config.ready_grace {
					candidates.push((key.clone(), *admitted));
				}
				true
			});
			candidates
		};

		let mut ready = Vec::new();
		let mut not_ready = 0;
		for (key, admitted) in candidates {
			if self.readiness.is_ready(self.store.as_ref(), &key).await {
				ready.push((key, admitted));
			} else {
				not_ready += 1;
			}
		}

		let mut state = self.state.lock().await;
		for (key, admitted) in ready {
			if state.items.get(&key) == Some(&admitted) {
				log::debug!("{} is ready, releasing it", key);
				state.items.remove(&key);
			}
		}
		state.not_ready = not_ready;
		self.report(&state);
	}

	pub async fn stats(&self) -> LimiterStats {
		let state = self.state.lock().await;
		LimiterStats {
			items: state.items.len(),
			max_items: self.config.max_items,
			not_ready: state.not_ready,
		}
	}

	async fn write_log(&self) {
		let stats = self.stats().await;
		if stats.items == 0 {
			return;
		}
		log::info!(
			"stats: items {}/{}, not ready {}",
			stats.items,
			stats.max_items,
			stats.not_ready
		);
	}

	fn report(&self, state: &State) {
		if let Some(metrics) = &self.metrics {
			metrics.limiter_in_flight.set(state.items.len() as i64);
			metrics.limiter_not_ready.set(state.not_ready as i64);
		}
	}

	/// Run the sweep and stats loops until `shutdown` flips to true or its
	/// sender is dropped.
	pub async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
		let start = Instant::now();
		let mut poll = tokio::time::interval_at(start + self.config.poll_interval, self.config.poll_interval);
		let mut stats = tokio::time::interval_at(start + self.config.log_frequency, self.config.log_frequency);
		poll.set_missed_tick_behavior(MissedTickBehavior::Delay);
		stats.set_missed_tick_behavior(MissedTickBehavior::Delay);

		log::debug!(
			"rate limiter started (max {}, poll {:?})",
			self.config.max_items,
			self.config.poll_interval
		);

		loop {
			if *shutdown.borrow() {
				break;
			}
			tokio::select! {
				changed = shutdown.changed() => {
					if changed.is_err() {
						break;
					}
				}
				_ = poll.tick() => self.sweep().await,
				_ = stats.tick() => self.write_log().await,
			}
		}

		log::debug!("rate limiter stopped");
	}
}
