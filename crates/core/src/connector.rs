//! Client connectors.
//!
//! [`AsyncClientConnector`] chains the pieces together: resolve the descriptor
//! source, connect with retry through the capability cache, then adapt the
//! capability into a typed client. [`ClientConnector`] exposes the same
//! operations to synchronous callers by running them on the background event
//! loop.
//!
//! ```ignore
//! let connector = ClientConnector::new()?;
//! let tc = connector.get_task_client(ClientRequest::default().profile("lab"))?;
//! let status = tc.call("queue_status", serde_json::Value::Null)?;
//! ```

use std::path::PathBuf;
use std::sync::{Arc, OnceLock};

use ctrlink_protocol::ControllerRole;
use ctrlink_runtime::{DescriptorSource, Error, EventLoop, Result, RpcSession, Session};
use tracing::info;

use crate::adapter::ClientRegistry;
use crate::cache::ConnectionCache;
use crate::clients::{BlockingClient, TypedClient};
use crate::config::ConnectorConfig;
use crate::resolver::{self, DEFAULT_PROFILE, ResolveRequest, ResolvedBy};
use crate::retry::{self, RetryPolicy};

/// Where to find a controller and how hard to try.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientRequest {
	/// Descriptor string or descriptor file path.
	pub descriptor: Option<String>,
	pub cluster_dir: Option<PathBuf>,
	pub profile: String,
	/// Overrides the connector's configured policy.
	pub retry: Option<RetryPolicy>,
}

impl Default for ClientRequest {
	fn default() -> Self {
		Self {
			descriptor: None,
			cluster_dir: None,
			profile: DEFAULT_PROFILE.to_string(),
			retry: None,
		}
	}
}

impl ClientRequest {
	pub fn descriptor(mut self, descriptor: impl Into<String>) -> Self {
		self.descriptor = Some(descriptor.into());
		self
	}

	pub fn cluster_dir(mut self, dir: impl Into<PathBuf>) -> Self {
		self.cluster_dir = Some(dir.into());
		self
	}

	pub fn profile(mut self, profile: impl Into<String>) -> Self {
		self.profile = profile.into();
		self
	}

	pub fn retry(mut self, policy: RetryPolicy) -> Self {
		self.retry = Some(policy);
		self
	}
}

/// Async connector owning one session and its capability cache.
pub struct AsyncClientConnector {
	session: Arc<dyn Session>,
	cache: ConnectionCache,
	registry: ClientRegistry,
	config: ConnectorConfig,
}

impl std::fmt::Debug for AsyncClientConnector {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("AsyncClientConnector")
			.field("cached", &self.cache.len())
			.field("registry", &self.registry)
			.field("config", &self.config)
			.finish()
	}
}

impl AsyncClientConnector {
	/// Connector over a fresh TCP session, configured from the environment.
	pub fn new() -> Self {
		Self::with_session(Arc::new(RpcSession::new()), ConnectorConfig::from_env())
	}

	pub fn with_session(session: Arc<dyn Session>, config: ConnectorConfig) -> Self {
		Self {
			cache: ConnectionCache::new(Arc::clone(&session)),
			session,
			registry: ClientRegistry::with_defaults(),
			config,
		}
	}

	/// Replaces the client type registry.
	pub fn with_registry(mut self, registry: ClientRegistry) -> Self {
		self.registry = registry;
		self
	}

	pub fn config(&self) -> &ConnectorConfig {
		&self.config
	}

	pub fn cache(&self) -> &ConnectionCache {
		&self.cache
	}

	pub fn session(&self) -> &Arc<dyn Session> {
		&self.session
	}

	/// Resolves the descriptor source `role`'s client would connect to.
	pub fn resolve(&self, role: ControllerRole, request: &ClientRequest) -> Result<(DescriptorSource, ResolvedBy)> {
		resolver::resolve(&ResolveRequest {
			descriptor: request.descriptor.as_deref(),
			cluster_dir: request.cluster_dir.as_deref(),
			descriptor_file_name: Some(role.descriptor_file_name()),
			registry_root: &self.config.registry_root,
			profile: &request.profile,
		})
	}

	/// Connects to the `role` controller and returns its typed client.
	///
	/// # Errors
	///
	/// Resolution and adapter errors are returned as is. Connection failures
	/// come back as [`Error::ClientConnector`] carrying the descriptor source
	/// and the attempt budget.
	pub async fn get_client(&self, role: ControllerRole, request: &ClientRequest) -> Result<Arc<dyn TypedClient>> {
		let (source, resolved_by) = self.resolve(role, request)?;
		let policy = request.retry.unwrap_or_else(|| self.config.retry_policy());

		let capability = retry::connect_with_retry(&self.cache, &source, &policy)
			.await
			.map_err(|e| connector_error(e, &source, &policy))?;

		let client = self.registry.adapt(capability, Arc::clone(&self.session)).await?;
		info!(
			target = "ctrlink.connector",
			role = %role,
			source = %source,
			resolved_by = %resolved_by,
			client = client.type_name(),
			"client ready"
		);
		Ok(client)
	}

	pub async fn get_task_client(&self, request: &ClientRequest) -> Result<Arc<dyn TypedClient>> {
		self.get_client(ControllerRole::Task, request).await
	}

	pub async fn get_multiengine_client(&self, request: &ClientRequest) -> Result<Arc<dyn TypedClient>> {
		self.get_client(ControllerRole::MultiEngine, request).await
	}
}

impl Default for AsyncClientConnector {
	fn default() -> Self {
		Self::new()
	}
}

fn connector_error(err: Error, source: &DescriptorSource, policy: &RetryPolicy) -> Error {
	if err.is_fatal() {
		return err;
	}
	let attempts = match err {
		Error::RetryBudgetExhausted { .. } => 0,
		_ => policy.max_attempts,
	};
	Error::ClientConnector {
		source_label: source.label(),
		attempts,
		source: Box::new(err),
	}
}

/// Blocking connector driving an [`AsyncClientConnector`] on the background
/// event loop.
#[derive(Debug, Clone)]
pub struct ClientConnector {
	inner: Arc<AsyncClientConnector>,
	event_loop: &'static EventLoop,
}

impl ClientConnector {
	pub fn new() -> Result<Self> {
		Self::from_async(AsyncClientConnector::new())
	}

	/// Wraps an existing async connector.
	pub fn from_async(inner: AsyncClientConnector) -> Result<Self> {
		Ok(Self {
			inner: Arc::new(inner),
			event_loop: EventLoop::global()?,
		})
	}

	pub fn as_async(&self) -> &Arc<AsyncClientConnector> {
		&self.inner
	}

	pub fn get_client(&self, role: ControllerRole, request: ClientRequest) -> Result<BlockingClient> {
		let inner = Arc::clone(&self.inner);
		let client = self
			.event_loop
			.run_blocking(async move { inner.get_client(role, &request).await })?;
		Ok(BlockingClient::new(client, self.event_loop))
	}

	pub fn get_task_client(&self, request: ClientRequest) -> Result<BlockingClient> {
		self.get_client(ControllerRole::Task, request)
	}

	pub fn get_multiengine_client(&self, request: ClientRequest) -> Result<BlockingClient> {
		self.get_client(ControllerRole::MultiEngine, request)
	}
}

static DEFAULT_CONNECTOR: OnceLock<ClientConnector> = OnceLock::new();

/// Process-wide blocking connector, created on first use.
pub fn default_connector() -> Result<&'static ClientConnector> {
	if let Some(connector) = DEFAULT_CONNECTOR.get() {
		return Ok(connector);
	}
	let connector = ClientConnector::new()?;
	Ok(DEFAULT_CONNECTOR.get_or_init(|| connector))
}

/// Task client through the [`default_connector`].
pub fn get_task_client(request: ClientRequest) -> Result<BlockingClient> {
	default_connector()?.get_task_client(request)
}

/// Multi-engine client through the [`default_connector`].
pub fn get_multiengine_client(request: ClientRequest) -> Result<BlockingClient> {
	default_connector()?.get_multiengine_client(request)
}
