//! Cluster lifecycle.
//!
//! A cluster is one controller plus N engines started by an external launcher
//! against a cluster directory. [`AsyncCluster`] tracks the lifecycle
//!
//! ```text
//! before ──start──▶ running ──stop──▶ after
//!                      ▲                 │
//!                      └──────start──────┘
//! ```
//!
//! and hands out clients connected through the cluster's directory.
//! [`Cluster`] is the blocking counterpart; dropping a running one with
//! auto-stop enabled stops it.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

use ctrlink_runtime::{
	BoxFuture, ClusterDirectory, Error, EventLoop, Launcher, ProcessLauncher, Result, RpcSession,
};
use serde::Serialize;
use tracing::{info, warn};

use crate::clients::{BlockingClient, TypedClient};
use crate::config::ConnectorConfig;
use crate::connector::{AsyncClientConnector, ClientRequest};
use crate::resolver::DEFAULT_PROFILE;
use crate::retry::RetryPolicy;

/// Lifecycle state of a cluster handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ClusterState {
	Before,
	Running,
	After,
}

impl fmt::Display for ClusterState {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(match self {
			ClusterState::Before => "before",
			ClusterState::Running => "running",
			ClusterState::After => "after",
		})
	}
}

/// Builds a launcher for a cluster directory; called on every start.
pub type LauncherFactory = Arc<dyn Fn(&ClusterDirectory) -> Result<Arc<dyn Launcher>> + Send + Sync>;

/// How to find (or create) the cluster directory.
#[derive(Debug, Clone)]
pub struct ClusterOptions {
	pub profile: String,
	/// Explicit cluster directory; preferred over the profile when it exists.
	pub cluster_dir: Option<PathBuf>,
	/// Create the profile directory if it cannot be found.
	pub auto_create: bool,
	pub config: ConnectorConfig,
}

impl ClusterOptions {
	/// Options for the default profile, configured from the environment.
	pub fn new() -> Self {
		Self::with_config(ConnectorConfig::from_env())
	}

	pub fn with_config(config: ConnectorConfig) -> Self {
		Self {
			profile: DEFAULT_PROFILE.to_string(),
			cluster_dir: None,
			auto_create: false,
			config,
		}
	}

	pub fn profile(mut self, profile: impl Into<String>) -> Self {
		self.profile = profile.into();
		self
	}

	pub fn cluster_dir(mut self, dir: impl Into<PathBuf>) -> Self {
		self.cluster_dir = Some(dir.into());
		self
	}

	pub fn auto_create(mut self, auto_create: bool) -> Self {
		self.auto_create = auto_create;
		self
	}

	/// Locates the cluster directory.
	///
	/// Tries the explicit directory, then the profile; creates the profile
	/// directory when `auto_create` is set or the profile is `default`. The
	/// `security/` and `log/` subdirectories are created if missing.
	pub fn setup_directory(&self) -> Result<ClusterDirectory> {
		let found = self.locate_directory()?;
		found.ensure_subdirs()?;
		Ok(found)
	}

	fn locate_directory(&self) -> Result<ClusterDirectory> {
		if let Some(dir) = &self.cluster_dir {
			match ClusterDirectory::find(dir) {
				Ok(found) => return Ok(found),
				Err(Error::ClusterDir(msg)) => {
					warn!(target = "ctrlink.cluster", "{msg}; trying profile '{}'", self.profile);
				}
				Err(e) => return Err(e),
			}
		}

		let root = &self.config.registry_root;
		match ClusterDirectory::find_by_profile(root, &self.profile) {
			Ok(found) => Ok(found),
			Err(Error::ClusterDir(_)) if self.auto_create || self.profile == DEFAULT_PROFILE => {
				ClusterDirectory::create_by_profile(root, &self.profile)
			}
			Err(Error::ClusterDir(msg)) => Err(Error::ClusterDir(format!("Cluster dir not found: {msg}"))),
			Err(e) => Err(e),
		}
	}
}

impl Default for ClusterOptions {
	fn default() -> Self {
		Self::new()
	}
}

/// Async cluster handle.
pub struct AsyncCluster {
	directory: ClusterDirectory,
	profile: String,
	state: ClusterState,
	auto_stop: bool,
	config: ConnectorConfig,
	launcher_factory: LauncherFactory,
	launcher: Option<Arc<dyn Launcher>>,
	connector: OnceLock<Arc<AsyncClientConnector>>,
}

impl fmt::Debug for AsyncCluster {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("AsyncCluster")
			.field("profile", &self.profile)
			.field("location", &self.directory.location())
			.field("state", &self.state)
			.field("auto_stop", &self.auto_stop)
			.finish_non_exhaustive()
	}
}

impl AsyncCluster {
	/// Sets up the cluster directory; nothing is launched yet.
	pub fn new(options: ClusterOptions) -> Result<Self> {
		let directory = options.setup_directory()?;
		Ok(Self {
			directory,
			profile: options.profile,
			state: ClusterState::Before,
			auto_stop: options.config.auto_stop,
			config: options.config,
			launcher_factory: Arc::new(|dir: &ClusterDirectory| -> Result<Arc<dyn Launcher>> {
				let launcher: Arc<dyn Launcher> = Arc::new(ProcessLauncher::locate(dir.location())?);
				Ok(launcher)
			}),
			launcher: None,
			connector: OnceLock::new(),
		})
	}

	/// Replaces how launchers are built.
	pub fn with_launcher_factory<F>(mut self, factory: F) -> Self
	where
		F: Fn(&ClusterDirectory) -> Result<Arc<dyn Launcher>> + Send + Sync + 'static,
	{
		self.launcher_factory = Arc::new(factory);
		self
	}

	/// Uses `connector` instead of creating one on first client request.
	pub fn with_connector(self, connector: AsyncClientConnector) -> Self {
		let _ = self.connector.set(Arc::new(connector));
		self
	}

	pub fn location(&self) -> &Path {
		self.directory.location()
	}

	pub fn directory(&self) -> &ClusterDirectory {
		&self.directory
	}

	pub fn profile(&self) -> &str {
		&self.profile
	}

	pub fn state(&self) -> ClusterState {
		self.state
	}

	pub fn is_running(&self) -> bool {
		self.state == ClusterState::Running
	}

	pub fn auto_stop(&self) -> bool {
		self.auto_stop
	}

	pub fn set_auto_stop(&mut self, auto_stop: bool) {
		self.auto_stop = auto_stop;
	}

	/// Starts the controller and `workers` engines.
	///
	/// # Errors
	///
	/// Returns [`Error::ClusterState`] if the cluster is already running, or
	/// the launcher's error; the state is unchanged on failure.
	pub async fn start(&mut self, workers: usize) -> Result<()> {
		if self.state == ClusterState::Running {
			return Err(Error::ClusterState("Cluster is already running".to_string()));
		}

		let launcher = (self.launcher_factory)(&self.directory)?;
		launcher.start(workers).await?;

		self.launcher = Some(launcher);
		self.state = ClusterState::Running;
		info!(target = "ctrlink.cluster", profile = %self.profile, workers, location = %self.location().display(), "cluster running");
		Ok(())
	}

	/// Stops the cluster and waits until the launcher has seen it exit.
	///
	/// # Errors
	///
	/// Returns [`Error::ClusterState`] unless the cluster is running.
	pub async fn stop(&mut self) -> Result<()> {
		if self.state != ClusterState::Running {
			return Err(Error::ClusterState("Cluster not running".to_string()));
		}
		let Some(launcher) = self.launcher.clone() else {
			return Err(Error::ClusterState("Cluster has no launcher".to_string()));
		};

		let (observed, stopped) = tokio::join!(launcher.observe_stop(), launcher.stop());
		if observed.is_ok() {
			self.state = ClusterState::After;
			info!(target = "ctrlink.cluster", profile = %self.profile, "cluster stopped");
		}
		stopped?;
		observed
	}

	/// Closes the handle, stopping the cluster if it is running.
	pub async fn close(&mut self) -> Result<()> {
		if self.is_running() { self.stop().await } else { Ok(()) }
	}

	fn connector(&self) -> &Arc<AsyncClientConnector> {
		self.connector.get_or_init(|| {
			Arc::new(AsyncClientConnector::with_session(
				Arc::new(RpcSession::new()),
				self.config.clone(),
			))
		})
	}

	fn client_request(&self, retry: Option<RetryPolicy>) -> ClientRequest {
		ClientRequest {
			descriptor: None,
			cluster_dir: Some(self.directory.location().to_path_buf()),
			profile: self.profile.clone(),
			retry: Some(retry.unwrap_or_else(|| self.config.retry_policy())),
		}
	}

	/// Task client of this cluster's controller.
	///
	/// A failure usually means the cluster has not finished starting.
	pub async fn get_task_client(&self, retry: Option<RetryPolicy>) -> Result<Arc<dyn TypedClient>> {
		let request = self.client_request(retry);
		self.connector().get_task_client(&request).await
	}

	/// Multi-engine client of this cluster's controller.
	pub async fn get_multiengine_client(&self, retry: Option<RetryPolicy>) -> Result<Arc<dyn TypedClient>> {
		let request = self.client_request(retry);
		self.connector().get_multiengine_client(&request).await
	}
}

impl Drop for AsyncCluster {
	fn drop(&mut self) {
		if !(self.auto_stop && self.is_running()) {
			return;
		}
		let Some(launcher) = self.launcher.take() else {
			return;
		};
		warn!(target = "ctrlink.cluster", profile = %self.profile, "auto stopping the cluster");

		let profile = self.profile.clone();
		let stop = async move {
			if let Err(e) = launcher.stop().await {
				warn!(target = "ctrlink.cluster", profile = %profile, "auto stop failed: {e}");
			}
		};
		match tokio::runtime::Handle::try_current() {
			Ok(handle) => {
				handle.spawn(stop);
			}
			Err(_) => match EventLoop::global() {
				Ok(event_loop) => {
					event_loop.handle().spawn(stop);
				}
				Err(e) => warn!(target = "ctrlink.cluster", "auto stop skipped: {e}"),
			},
		}
	}
}

/// Blocking cluster handle driving an [`AsyncCluster`] on the event loop.
///
/// Prefer [`close`](Self::close) over relying on drop: drop only makes a
/// best-effort stop and logs failures.
pub struct Cluster {
	inner: Arc<tokio::sync::Mutex<AsyncCluster>>,
	location: PathBuf,
	event_loop: &'static EventLoop,
}

impl fmt::Debug for Cluster {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Cluster").field("location", &self.location).finish_non_exhaustive()
	}
}

impl Cluster {
	pub fn new(options: ClusterOptions) -> Result<Self> {
		Self::from_async(AsyncCluster::new(options)?)
	}

	pub fn from_async(cluster: AsyncCluster) -> Result<Self> {
		Ok(Self {
			location: cluster.location().to_path_buf(),
			inner: Arc::new(tokio::sync::Mutex::new(cluster)),
			event_loop: EventLoop::global()?,
		})
	}

	pub fn location(&self) -> &Path {
		&self.location
	}

	fn with_inner<F, T>(&self, op: F) -> Result<T>
	where
		F: for<'a> FnOnce(&'a mut AsyncCluster) -> BoxFuture<'a, T> + Send + 'static,
		T: Send + 'static,
	{
		let inner = Arc::clone(&self.inner);
		self.event_loop.run_blocking(async move {
			let mut cluster = inner.lock().await;
			op(&mut *cluster).await
		})
	}

	pub fn state(&self) -> Result<ClusterState> {
		self.with_inner(|c| Box::pin(async move { Ok(c.state()) }))
	}

	pub fn is_running(&self) -> Result<bool> {
		Ok(self.state()? == ClusterState::Running)
	}

	pub fn set_auto_stop(&self, auto_stop: bool) -> Result<()> {
		self.with_inner(move |c| {
			Box::pin(async move {
				c.set_auto_stop(auto_stop);
				Ok(())
			})
		})
	}

	pub fn start(&self, workers: usize) -> Result<()> {
		self.with_inner(move |c| Box::pin(c.start(workers)))
	}

	pub fn stop(&self) -> Result<()> {
		self.with_inner(|c| Box::pin(c.stop()))
	}

	/// Stops the cluster if it is running.
	pub fn close(&self) -> Result<()> {
		self.with_inner(|c| Box::pin(c.close()))
	}

	pub fn get_task_client(&self, retry: Option<RetryPolicy>) -> Result<BlockingClient> {
		let client = self.with_inner(move |c| Box::pin(async move { c.get_task_client(retry).await }))?;
		Ok(BlockingClient::new(client, self.event_loop))
	}

	pub fn get_multiengine_client(&self, retry: Option<RetryPolicy>) -> Result<BlockingClient> {
		let client = self.with_inner(move |c| Box::pin(async move { c.get_multiengine_client(retry).await }))?;
		Ok(BlockingClient::new(client, self.event_loop))
	}
}

impl Drop for Cluster {
	fn drop(&mut self) {
		if tokio::runtime::Handle::try_current().is_ok() || self.event_loop.is_loop_thread() {
			// Blocking here would stall a runtime; AsyncCluster's own drop
			// schedules the stop instead.
			return;
		}
		let result = self.with_inner(|c| {
			Box::pin(async move {
				if c.auto_stop() && c.is_running() {
					warn!(target = "ctrlink.cluster", profile = %c.profile(), "auto stopping the cluster");
					c.stop().await
				} else {
					Ok(())
				}
			})
		});
		if let Err(e) = result {
			warn!(target = "ctrlink.cluster", location = %self.location.display(), "auto stop failed: {e}");
		}
	}
}
