//! Connector configuration read from the environment.

use std::ffi::OsString;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use ctrlink_runtime::registry;
use serde::Serialize;
use tracing::warn;

use crate::retry::{DEFAULT_INITIAL_DELAY, DEFAULT_MAX_ATTEMPTS, RetryPolicy};

pub const RETRY_DELAY_ENV: &str = "CTRLINK_RETRY_DELAY_MS";
pub const MAX_ATTEMPTS_ENV: &str = "CTRLINK_MAX_ATTEMPTS";
pub const WORKERS_ENV: &str = "CTRLINK_WORKERS";
pub const AUTO_STOP_ENV: &str = "CTRLINK_AUTO_STOP";

/// Engines started by a cluster when no count is given.
pub const DEFAULT_WORKERS: usize = 2;

/// Tunables shared by connectors and clusters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectorConfig {
	/// Registry root holding `cluster_<profile>` directories.
	pub registry_root: PathBuf,
	pub retry_delay_ms: u64,
	pub max_attempts: u32,
	pub workers: usize,
	pub auto_stop: bool,
}

impl Default for ConnectorConfig {
	fn default() -> Self {
		Self {
			registry_root: PathBuf::from(".ctrlink"),
			retry_delay_ms: DEFAULT_INITIAL_DELAY.as_millis() as u64,
			max_attempts: DEFAULT_MAX_ATTEMPTS,
			workers: DEFAULT_WORKERS,
			auto_stop: true,
		}
	}
}

impl ConnectorConfig {
	/// Reads every knob from the process environment.
	pub fn from_env() -> Self {
		let mut config = Self::from_lookup(|key| std::env::var_os(key));
		match registry::default_root() {
			Ok(root) => config.registry_root = root,
			Err(e) => warn!(target = "ctrlink.config", "{e}; using ./.ctrlink"),
		}
		config
	}

	/// Reads the retry, worker and auto-stop knobs through `lookup`.
	///
	/// The registry root keeps its default; [`from_env`](Self::from_env)
	/// resolves it against the home directory.
	pub fn from_lookup<F>(lookup: F) -> Self
	where
		F: Fn(&str) -> Option<OsString>,
	{
		let defaults = Self::default();
		Self {
			registry_root: lookup(registry::ROOT_ENV)
				.filter(|v| !v.is_empty())
				.map(PathBuf::from)
				.unwrap_or(defaults.registry_root),
			retry_delay_ms: parse_knob(&lookup, RETRY_DELAY_ENV, defaults.retry_delay_ms),
			max_attempts: parse_knob(&lookup, MAX_ATTEMPTS_ENV, defaults.max_attempts),
			workers: parse_knob(&lookup, WORKERS_ENV, defaults.workers),
			auto_stop: lookup(AUTO_STOP_ENV)
				.map(|raw| parse_flag(&raw, defaults.auto_stop))
				.unwrap_or(defaults.auto_stop),
		}
	}

	pub fn retry_policy(&self) -> RetryPolicy {
		RetryPolicy::new(Duration::from_millis(self.retry_delay_ms), self.max_attempts)
	}
}

fn parse_knob<T, F>(lookup: &F, key: &str, default: T) -> T
where
	T: FromStr + Copy + std::fmt::Display,
	F: Fn(&str) -> Option<OsString>,
{
	let Some(raw) = lookup(key) else {
		return default;
	};
	let text = raw.to_string_lossy();
	match text.trim().parse() {
		Ok(value) => value,
		Err(_) => {
			warn!(target = "ctrlink.config", key, value = %text, "unparseable value, using {default}");
			default
		}
	}
}

fn parse_flag(raw: &OsString, default: bool) -> bool {
	let text = raw.to_string_lossy();
	match text.trim().to_ascii_lowercase().as_str() {
		"1" | "true" | "yes" | "on" => true,
		"0" | "false" | "no" | "off" => false,
		_ => {
			warn!(target = "ctrlink.config", key = AUTO_STOP_ENV, value = %text, "unparseable flag, using {default}");
			default
		}
	}
}
