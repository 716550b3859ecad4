//! Structured output envelope for all CLI commands.
//!
//! Every command prints one result envelope on stdout:
//!
//! ```json
//! {
//!   "schemaVersion": 1,
//!   "ok": true,
//!   "command": "connect",
//!   "data": { ... },
//!   "timings": { "durationMs": 12 }
//! }
//! ```
//!
//! On failure `data` is replaced by an error with a stable code:
//!
//! ```json
//! {
//!   "ok": false,
//!   "command": "connect",
//!   "error": {
//!     "code": "CLIENT_CONNECTOR",
//!     "message": "Could not connect to the controller using ...",
//!     "details": { "source": "...", "attempts": 9 }
//!   }
//! }
//! ```

#[cfg(test)]
mod tests;

use std::io::{self, Write};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

/// Bumped on breaking changes to the envelope.
pub const SCHEMA_VERSION: u32 = 1;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
	/// Pretty-printed JSON (default)
	#[default]
	Json,
	/// One JSON document per line
	Ndjson,
	/// Human-readable text
	Text,
}

impl std::fmt::Display for OutputFormat {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			OutputFormat::Json => write!(f, "json"),
			OutputFormat::Ndjson => write!(f, "ndjson"),
			OutputFormat::Text => write!(f, "text"),
		}
	}
}

/// The result envelope returned by all commands.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandResult<T: Serialize> {
	#[serde(skip_serializing_if = "Option::is_none")]
	pub schema_version: Option<u32>,

	pub ok: bool,

	/// Command name (e.g. "resolve", "cluster.run")
	pub command: String,

	/// Only present on success
	#[serde(skip_serializing_if = "Option::is_none")]
	pub data: Option<T>,

	/// Only present on failure
	#[serde(skip_serializing_if = "Option::is_none")]
	pub error: Option<CommandError>,

	#[serde(skip_serializing_if = "Option::is_none")]
	pub timings: Option<Timings>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandError {
	pub code: ErrorCode,

	pub message: String,

	#[serde(skip_serializing_if = "Option::is_none")]
	pub details: Option<serde_json::Value>,
}

/// Standardized error codes for programmatic handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
	/// No resolution strategy produced a descriptor
	DescriptorNotFound,
	/// Value is neither a descriptor nor a usable descriptor file
	InvalidDescriptor,
	/// Descriptor file missing or empty
	DescriptorNotReady,
	/// Controller did not accept the connection
	ConnectionFailed,
	/// Retry budget spent without reaching the controller
	ClientConnector,
	/// Controller named a client type this build does not know
	AdapterResolution,
	/// Remote object raised an error
	RemoteError,
	/// Malformed frame or reply
	ProtocolError,
	/// Illegal cluster lifecycle transition
	ClusterState,
	/// Cluster directory could not be found or created
	ClusterDir,
	/// Cluster launcher missing or failed
	LaunchFailed,
	/// File I/O error
	IoError,
	/// Invalid input provided
	InvalidInput,
	/// Unknown/internal error
	InternalError,
}

impl std::fmt::Display for ErrorCode {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		// Same spelling as the serialized form.
		let name = match self {
			ErrorCode::DescriptorNotFound => "DESCRIPTOR_NOT_FOUND",
			ErrorCode::InvalidDescriptor => "INVALID_DESCRIPTOR",
			ErrorCode::DescriptorNotReady => "DESCRIPTOR_NOT_READY",
			ErrorCode::ConnectionFailed => "CONNECTION_FAILED",
			ErrorCode::ClientConnector => "CLIENT_CONNECTOR",
			ErrorCode::AdapterResolution => "ADAPTER_RESOLUTION",
			ErrorCode::RemoteError => "REMOTE_ERROR",
			ErrorCode::ProtocolError => "PROTOCOL_ERROR",
			ErrorCode::ClusterState => "CLUSTER_STATE",
			ErrorCode::ClusterDir => "CLUSTER_DIR",
			ErrorCode::LaunchFailed => "LAUNCH_FAILED",
			ErrorCode::IoError => "IO_ERROR",
			ErrorCode::InvalidInput => "INVALID_INPUT",
			ErrorCode::InternalError => "INTERNAL_ERROR",
		};
		f.write_str(name)
	}
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Timings {
	pub duration_ms: u64,
}

impl From<Duration> for Timings {
	fn from(duration: Duration) -> Self {
		Timings {
			duration_ms: duration.as_millis() as u64,
		}
	}
}

/// Builder for [`CommandResult`]; times the command from construction.
pub struct ResultBuilder<T: Serialize> {
	command: String,
	data: Option<T>,
	error: Option<CommandError>,
	start_time: Instant,
}

impl<T: Serialize> ResultBuilder<T> {
	pub fn new(command: impl Into<String>) -> Self {
		Self {
			command: command.into(),
			data: None,
			error: None,
			start_time: Instant::now(),
		}
	}

	pub fn data(mut self, data: T) -> Self {
		self.data = Some(data);
		self
	}

	pub fn error(mut self, code: ErrorCode, message: impl Into<String>) -> Self {
		self.error = Some(CommandError {
			code,
			message: message.into(),
			details: None,
		});
		self
	}

	pub fn command_error(mut self, error: CommandError) -> Self {
		self.error = Some(error);
		self
	}

	pub fn build(self) -> CommandResult<T> {
		CommandResult {
			schema_version: Some(SCHEMA_VERSION),
			ok: self.error.is_none(),
			command: self.command,
			data: if self.error.is_none() { self.data } else { None },
			error: self.error,
			timings: Some(self.start_time.elapsed().into()),
		}
	}
}

pub fn print_result<T: Serialize>(result: &CommandResult<T>, format: OutputFormat) {
	match format {
		OutputFormat::Json => {
			if let Ok(json) = serde_json::to_string_pretty(result) {
				println!("{json}");
			}
		}
		OutputFormat::Ndjson => {
			if let Ok(json) = serde_json::to_string(result) {
				println!("{json}");
			}
		}
		OutputFormat::Text => print_result_text(result),
	}
}

fn print_result_text<T: Serialize>(result: &CommandResult<T>) {
	let mut stdout = io::stdout().lock();

	if result.ok {
		let Some(data) = &result.data else { return };
		match serde_json::to_value(data) {
			Ok(serde_json::Value::Object(fields)) => {
				for (key, value) in fields {
					match value {
						serde_json::Value::String(s) => {
							let _ = writeln!(stdout, "{key}: {s}");
						}
						other => {
							let _ = writeln!(stdout, "{key}: {other}");
						}
					}
				}
			}
			Ok(other) => {
				let _ = writeln!(stdout, "{other}");
			}
			Err(_) => {}
		}
	} else if let Some(error) = &result.error {
		let _ = writeln!(stdout, "Error [{}]: {}", error.code, error.message);
	}
}

/// Human-facing copy of a failure, always on stderr.
pub fn print_error_stderr(error: &CommandError) {
	eprintln!("Error [{}]: {}", error.code, error.message);
}
