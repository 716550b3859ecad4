//! Error types for the controller runtime.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for runtime operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while locating, connecting to, or managing a controller.
#[derive(Debug, Error)]
pub enum Error {
	/// No descriptor resolution strategy produced a valid source.
	#[error("Descriptor not found: {0}")]
	DescriptorNotFound(String),

	/// A string or file does not hold a well-formed descriptor.
	#[error("Not a valid descriptor or descriptor file: {0:?}")]
	InvalidDescriptor(String),

	/// The descriptor file exists (or will) but holds no descriptor yet.
	#[error("Descriptor file {} is not ready (missing or empty)", .0.display())]
	DescriptorNotReady(PathBuf),

	/// Failed to establish a connection with a controller.
	#[error("Failed to connect to controller: {0}")]
	ConnectionFailed(String),

	/// Transport-level error (framing, socket I/O).
	#[error("Transport error: {0}")]
	TransportError(String),

	/// Protocol-level error (unexpected frame contents).
	#[error("Protocol error: {0}")]
	ProtocolError(String),

	/// Error raised by the remote object.
	#[error("{name}: {message}")]
	Remote {
		/// Error type name reported by the controller.
		name: String,
		/// Human-readable error message.
		message: String,
	},

	/// Channel closed unexpectedly.
	#[error("Channel closed unexpectedly")]
	ChannelClosed,

	/// The retry loop was given no attempts to spend.
	#[error("Could not connect to controller, max attempts ({max_attempts}) exceeded")]
	RetryBudgetExhausted { max_attempts: u32 },

	/// Terminal connection failure, with the descriptor source and attempt count.
	#[error(
		"Could not connect to the controller using {source_label} after {attempts} attempt(s). \
		 This usually means that i) the controller was not started or ii) a firewall was \
		 blocking the client from connecting to the controller. Last error: {source}"
	)]
	ClientConnector {
		/// Descriptor source that was tried (inline descriptor or file path).
		source_label: String,
		/// Number of attempts the retry budget allowed.
		attempts: u32,
		#[source]
		source: Box<Error>,
	},

	/// The controller asked for a client type this process does not know.
	#[error("Cannot resolve client type '{0}'")]
	AdapterResolution(String),

	/// Illegal cluster lifecycle transition.
	#[error("Cluster state error: {0}")]
	ClusterState(String),

	/// Cluster directory could not be found or created.
	#[error("Cluster directory error: {0}")]
	ClusterDir(String),

	/// Cluster launcher binary was not found.
	#[error("Cluster launcher not found. Install ctrlcluster or set CTRLINK_CLUSTER_BIN")]
	LauncherNotFound,

	/// Failed to launch or stop the cluster process.
	#[error("Cluster launcher failed: {0}")]
	LaunchFailed(String),

	/// The background event loop is unavailable or was re-entered.
	#[error("Event loop error: {0}")]
	EventLoop(String),

	/// I/O error.
	#[error("I/O error: {0}")]
	Io(#[from] std::io::Error),

	/// JSON serialization/deserialization error.
	#[error("JSON error: {0}")]
	Json(#[from] serde_json::Error),
}

impl Error {
	/// Returns the innermost error of a [`Error::ClientConnector`] chain.
	pub fn root_cause(&self) -> &Error {
		match self {
			Error::ClientConnector { source, .. } => source.root_cause(),
			other => other,
		}
	}

	/// Returns true for errors that say nothing about the controller being
	/// unreachable and therefore must not be retried.
	pub fn is_fatal(&self) -> bool {
		matches!(
			self,
			Error::DescriptorNotFound(_)
				| Error::AdapterResolution(_)
				| Error::ClusterState(_)
				| Error::ClusterDir(_)
				| Error::EventLoop(_)
		)
	}

	/// Returns true if this is a cluster lifecycle error.
	pub fn is_cluster_state(&self) -> bool {
		matches!(self, Error::ClusterState(_))
	}
}
