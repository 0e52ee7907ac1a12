use prometheus::{IntCounterVec, IntGauge, Opts, Registry, TextEncoder};
use std::sync::Arc;

use crate::syncer::{Outcome, SkipReason, SyncResult};

/// Prometheus metrics for syncers and the admission limiter.
pub struct SyncMetrics {
	registry: Registry,

	pub sync_operations_total: IntCounterVec,
	pub sync_failures_total: IntCounterVec,
	pub sync_skips_total: IntCounterVec,

	pub limiter_in_flight: IntGauge,
	pub limiter_not_ready: IntGauge,
}

impl SyncMetrics {
	pub fn new() -> Result<Self, prometheus::Error> {
		let registry = Registry::new();

		let sync_operations_total = IntCounterVec::new(
			Opts::new("sync_operations_total", "Syncs completed, by syncer and operation")
				.namespace("reconcile_kit"),
			&["syncer", "operation"],
		)?;
		let sync_failures_total = IntCounterVec::new(
			Opts::new("sync_failures_total", "Syncs that failed, by syncer").namespace("reconcile_kit"),
			&["syncer"],
		)?;
		let sync_skips_total = IntCounterVec::new(
			Opts::new("sync_skips_total", "Syncs skipped without error, by syncer and reason")
				.namespace("reconcile_kit"),
			&["syncer", "reason"],
		)?;
		let limiter_in_flight = IntGauge::with_opts(
			Opts::new("limiter_in_flight", "Keys currently admitted by the rate limiter")
				.namespace("reconcile_kit"),
		)?;
		let limiter_not_ready = IntGauge::with_opts(
			Opts::new("limiter_not_ready", "Admitted keys not ready at the last sweep")
				.namespace("reconcile_kit"),
		)?;

		registry.register(Box::new(sync_operations_total.clone()))?;
		registry.register(Box::new(sync_failures_total.clone()))?;
		registry.register(Box::new(sync_skips_total.clone()))?;
		registry.register(Box::new(limiter_in_flight.clone()))?;
		registry.register(Box::new(limiter_not_ready.clone()))?;

		Ok(Self {
			registry,
			sync_operations_total,
			sync_failures_total,
			sync_skips_total,
			limiter_in_flight,
			limiter_not_ready,
		})
	}

	/// Count one sync result.
	pub fn observe(&self, syncer: &str, result: &SyncResult) {
		match &result.outcome {
			Outcome::Persisted => self
				.sync_operations_total
				.with_label_values(&[syncer, result.operation.as_str()])
				.inc(),
			Outcome::Skipped(reason) => {
				let reason = match reason {
					SkipReason::OwnerDeleted => "owner_deleted",
					SkipReason::Ignored(_) => "ignored",
					SkipReason::NotFound => "not_found",
				};
				self.sync_skips_total.with_label_values(&[syncer, reason]).inc();
			}
			Outcome::Failed(_) => self.sync_failures_total.with_label_values(&[syncer]).inc(),
		}
	}

	/// Encode metrics in Prometheus text format
	pub fn encode(&self) -> String {
		let encoder = TextEncoder::new();
		let metric_families = self.registry.gather();
		match encoder.encode_to_string(&metric_families) {
			Ok(s) => s,
			Err(e) => {
				log::error!("failed to encode metrics: {}", e);
				String::new()
			}
		}
	}
}

pub fn init_metrics() -> anyhow::Result<Arc<SyncMetrics>> {
	Ok(Arc::new(SyncMetrics::new()?))
}
