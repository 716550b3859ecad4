use serde_json::json;
use thiserror::Error;

use crate::output::{CommandError, ErrorCode};

pub type Result<T> = std::result::Result<T, CliError>;

#[derive(Debug, Error)]
pub enum CliError {
	#[error("invalid input: {0}")]
	InvalidInput(String),

	#[error(transparent)]
	Ctrlink(#[from] ctrlink::Error),

	/// Failures outside the library, message includes the context chain.
	#[error("{0:#}")]
	Anyhow(#[from] anyhow::Error),
}

/// Picks the envelope code for a library error.
///
/// Connector failures keep their own code; the innermost cause only goes
/// into `details`.
pub fn error_code(err: &ctrlink::Error) -> ErrorCode {
	use ctrlink::Error as E;
	match err {
		E::DescriptorNotFound(_) => ErrorCode::DescriptorNotFound,
		E::InvalidDescriptor(_) => ErrorCode::InvalidDescriptor,
		E::DescriptorNotReady(_) => ErrorCode::DescriptorNotReady,
		E::ConnectionFailed(_) | E::TransportError(_) | E::ChannelClosed => ErrorCode::ConnectionFailed,
		E::ClientConnector { .. } | E::RetryBudgetExhausted { .. } => ErrorCode::ClientConnector,
		E::AdapterResolution(_) => ErrorCode::AdapterResolution,
		E::Remote { .. } => ErrorCode::RemoteError,
		E::ProtocolError(_) | E::Json(_) => ErrorCode::ProtocolError,
		E::ClusterState(_) => ErrorCode::ClusterState,
		E::ClusterDir(_) => ErrorCode::ClusterDir,
		E::LauncherNotFound | E::LaunchFailed(_) => ErrorCode::LaunchFailed,
		E::Io(_) => ErrorCode::IoError,
		E::EventLoop(_) => ErrorCode::InternalError,
	}
}

impl CliError {
	/// Convert this error to a CommandError for structured output
	pub fn to_command_error(&self) -> CommandError {
		let (code, details) = match self {
			CliError::InvalidInput(_) => (ErrorCode::InvalidInput, None),
			CliError::Anyhow(_) => (ErrorCode::InternalError, None),
			CliError::Ctrlink(err) => {
				let details = match err {
					ctrlink::Error::ClientConnector {
						source_label, attempts, ..
					} => Some(json!({
						"source": source_label,
						"attempts": attempts,
						"cause": error_code(err.root_cause()),
					})),
					ctrlink::Error::Remote { name, .. } => Some(json!({ "remote": name })),
					_ => None,
				};
				(error_code(err), details)
			}
		};

		CommandError {
			code,
			message: self.to_string(),
			details,
		}
	}
}
