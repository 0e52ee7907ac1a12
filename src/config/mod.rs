use log::Level;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

use crate::observability::LogFormat;
use crate::rate_limiter::LimiterConfig;

/// Runtime configuration for reconcile-kit.
///
/// Values are loaded from (in order): the `/etc/reconcile-kit/settings.json`
/// file, the same file name in the user config folders (all optional), and
/// environment variables prefixed with `RKIT_` (e.g. `RKIT_LOG_LEVEL`).
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone)]
#[serde(default)]
pub struct Settings {
	pub log_level: Level,
	pub log_format: LogFormat,
	/// Component name attached to recorded events.
	pub event_component: String,
	// Admission limiter
	pub limiter_max_items: usize,
	pub limiter_ready_grace_secs: u64,
	pub limiter_poll_interval_secs: u64,
	pub limiter_item_timeout_secs: u64,
	pub limiter_log_frequency_secs: u64,
	pub beat_interval_secs: u64,
}

impl Default for Settings {
	fn default() -> Self {
		Self {
			log_level: Level::Info,
			log_format: LogFormat::Json,
			event_component: "reconcile-kit".to_string(),
			limiter_max_items: 10,
			limiter_ready_grace_secs: 10,
			limiter_poll_interval_secs: 5,
			limiter_item_timeout_secs: 600,
			limiter_log_frequency_secs: 60,
			beat_interval_secs: 24 * 60 * 60,
		}
	}
}

impl Settings {
	pub fn limiter(&self) -> LimiterConfig {
		LimiterConfig {
			max_items: self.limiter_max_items,
			ready_grace: Duration::from_secs(self.limiter_ready_grace_secs),
			poll_interval: Duration::from_secs(self.limiter_poll_interval_secs),
			item_timeout: Duration::from_secs(self.limiter_item_timeout_secs),
			log_frequency: Duration::from_secs(self.limiter_log_frequency_secs),
		}
	}

	pub fn beat_interval(&self) -> Duration {
		Duration::from_secs(self.beat_interval_secs)
	}
}

#[derive(Debug, Error)]
pub enum SettingsError {
	#[error("configuration error: {0}")]
	Config(#[from] config::ConfigError),
	#[error("invalid value `{value}` for {var}")]
	InvalidEnv { var: &'static str, value: String },
}

const SYSTEM_CONFIG: &str = "/etc/reconcile-kit/settings.json";

pub fn load() -> Result<Settings, SettingsError> {
	load_with(None)
}

/// Load settings with `path` as an extra, required config file layered over
/// the system and user files.
pub fn load_from(path: &Path) -> Result<Settings, SettingsError> {
	load_with(Some(path))
}

fn load_with(extra: Option<&Path>) -> Result<Settings, SettingsError> {
	let mut builder =
		config::Config::builder().add_source(config::File::with_name(SYSTEM_CONFIG).required(false));

	if let Some(folder) = dirs::config_dir() {
		let user_config_path = folder.join("reconcile-kit").join("settings.json");
		builder = builder.add_source(config::File::from(user_config_path).required(false));
	}
	if let Some(path) = extra {
		builder = builder.add_source(config::File::from(path.to_path_buf()).required(true));
	}

	builder = builder.add_source(config::Environment::with_prefix("RKIT").separator("__"));

	let cfg = builder.build()?;
	let mut s: Settings = cfg.try_deserialize()?;
	apply_env_overrides(&mut s)?;
	Ok(s)
}

fn env_value(var: &'static str) -> Option<String> {
	std::env::var(var).ok().filter(|v| !v.is_empty())
}

fn parse_env<T: FromStr>(var: &'static str) -> Result<Option<T>, SettingsError> {
	match env_value(var) {
		Some(value) => value
			.parse::<T>()
			.map(Some)
			.map_err(|_| SettingsError::InvalidEnv { var, value }),
		None => Ok(None),
	}
}

// Direct variables win over whatever the layered sources produced.
fn apply_env_overrides(s: &mut Settings) -> Result<(), SettingsError> {
	if let Some(level) = parse_env::<Level>("RKIT_LOG_LEVEL")? {
		s.log_level = level;
	}
	if let Some(format) = parse_env::<LogFormat>("RKIT_LOG_FORMAT")? {
		s.log_format = format;
	}
	if let Some(component) = env_value("RKIT_EVENT_COMPONENT") {
		s.event_component = component;
	}
	if let Some(max) = parse_env("RKIT_LIMITER_MAX_ITEMS")? {
		s.limiter_max_items = max;
	}
	if let Some(secs) = parse_env("RKIT_LIMITER_READY_GRACE_SECS")? {
		s.limiter_ready_grace_secs = secs;
	}
	if let Some(secs) = parse_env("RKIT_LIMITER_POLL_INTERVAL_SECS")? {
		s.limiter_poll_interval_secs = secs;
	}
	if let Some(secs) = parse_env("RKIT_LIMITER_ITEM_TIMEOUT_SECS")? {
		s.limiter_item_timeout_secs = secs;
	}
	if let Some(secs) = parse_env("RKIT_LIMITER_LOG_FREQUENCY_SECS")? {
		s.limiter_log_frequency_secs = secs;
	}
	if let Some(secs) = parse_env("RKIT_BEAT_INTERVAL_SECS")? {
		s.beat_interval_secs = secs;
	}
	Ok(())
}
