use serde::{Deserialize, Serialize};
use std::str::FromStr;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Output format of the log subscriber.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
	/// Structured JSON, one record per line (production).
	#[default]
	Json,
	/// Human readable, coloured output (development).
	Pretty,
}

impl FromStr for LogFormat {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.to_ascii_lowercase().as_str() {
			"json" | "production" => Ok(LogFormat::Json),
			"pretty" | "text" | "development" => Ok(LogFormat::Pretty),
			other => Err(format!("unknown log format `{other}`")),
		}
	}
}

fn filter(level: log::Level) -> EnvFilter {
	// RUST_LOG wins over the configured level
	EnvFilter::try_from_default_env()
		.or_else(|_| EnvFilter::try_new(level.as_str().to_ascii_lowercase()))
		.unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Install the global tracing subscriber.
///
/// Records emitted through the `log` macros are forwarded to the same
/// subscriber.
pub fn init_logging(format: LogFormat, level: log::Level) -> anyhow::Result<()> {
	let registry = tracing_subscriber::registry().with(filter(level));

	let result = match format {
		LogFormat::Json => registry
			.with(
				tracing_subscriber::fmt::layer()
					.json()
					.with_current_span(true)
					.with_span_list(true)
					.with_target(true)
					.with_level(true)
					.with_file(true)
					.with_line_number(true),
			)
			.try_init(),
		LogFormat::Pretty => registry
			.with(
				tracing_subscriber::fmt::layer()
					.with_target(true)
					.with_level(true),
			)
			.try_init(),
	};

	result.map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))
}

#[cfg(test)]
#[cfg(feature = "unit-tests")]
mod tests {
	use super::*;

	#[test]
	fn parses_formats() {
		assert_eq!("JSON".parse::<LogFormat>().unwrap(), LogFormat::Json);
		assert_eq!("development".parse::<LogFormat>().unwrap(), LogFormat::Pretty);
		assert!("xml".parse::<LogFormat>().is_err());
	}

	#[test]
	fn logging_initialization() {
		// Note: We can only initialize logging once per process
		let _ = init_logging(LogFormat::Pretty, log::Level::Debug);
	}
}
