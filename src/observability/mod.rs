pub mod logging;
pub mod metrics;

pub use logging::{LogFormat, init_logging};
pub use metrics::{SyncMetrics, init_metrics};

use std::sync::Arc;

use crate::config::Settings;
use crate::events::LogRecorder;

/// Global observability state
pub struct ObservabilityState {
	pub metrics: Arc<SyncMetrics>,
	/// Event recorder tagged with the configured component.
	pub recorder: Arc<LogRecorder>,
}

/// Initialize logging and metrics from the loaded settings.
pub fn init_observability(settings: &Settings) -> anyhow::Result<ObservabilityState> {
	init_logging(settings.log_format, settings.log_level)?;
	let metrics = init_metrics()?;
	let recorder = Arc::new(LogRecorder::new(settings.event_component.clone()));

	tracing::info!(
		component = "observability",
		format = ?settings.log_format,
		level = %settings.log_level,
		event_component = %settings.event_component,
		"Observability initialized: structured logging and metrics enabled"
	);

	Ok(ObservabilityState { metrics, recorder })
}
