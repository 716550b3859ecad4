//! Cluster process launcher.
//!
//! [`Launcher`] is the seam the cluster controller drives; [`ProcessLauncher`]
//! runs the external `ctrlcluster` program:
//!
//! ```text
//! ctrlcluster start -n <workers> --cluster-dir <dir>
//! ```
//!
//! The program is located in this order:
//! 1. `CTRLINK_CLUSTER_BIN` environment variable
//! 2. `ctrlcluster` on `PATH`

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::process::Command;
use tokio::sync::{Notify, watch};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::session::BoxFuture;

/// Environment variable naming the launcher program.
pub const LAUNCHER_ENV: &str = "CTRLINK_CLUSTER_BIN";

/// Program searched for on `PATH`.
pub const LAUNCHER_PROGRAM: &str = "ctrlcluster";

/// How long a fresh process must survive before start counts as successful.
const STARTUP_GRACE: Duration = Duration::from_millis(100);

/// Starts and stops a cluster (one controller plus engines).
pub trait Launcher: Send + Sync {
	/// Launches the cluster with `workers` engines.
	fn start(&self, workers: usize) -> BoxFuture<'_, ()>;

	/// Requests termination and waits until the process has exited.
	fn stop(&self) -> BoxFuture<'_, ()>;

	/// Resolves once the launched process has exited, for whatever reason.
	fn observe_stop(&self) -> BoxFuture<'_, ()>;
}

/// Exit notification published by the monitor task.
type ExitState = Option<String>;

struct Running {
	kill: Arc<Notify>,
	exit: watch::Receiver<ExitState>,
}

/// Launcher backed by the `ctrlcluster` child process.
pub struct ProcessLauncher {
	program: PathBuf,
	leading_args: Vec<OsString>,
	cluster_dir: PathBuf,
	running: Mutex<Option<Running>>,
}

impl std::fmt::Debug for ProcessLauncher {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("ProcessLauncher")
			.field("program", &self.program)
			.field("cluster_dir", &self.cluster_dir)
			.finish_non_exhaustive()
	}
}

impl ProcessLauncher {
	pub fn new(program: impl Into<PathBuf>, cluster_dir: impl Into<PathBuf>) -> Self {
		Self {
			program: program.into(),
			leading_args: Vec::new(),
			cluster_dir: cluster_dir.into(),
			running: Mutex::new(None),
		}
	}

	/// Locates the launcher program from the environment and `PATH`.
	///
	/// # Errors
	///
	/// Returns [`Error::LauncherNotFound`] if neither source yields a program.
	pub fn locate(cluster_dir: impl Into<PathBuf>) -> Result<Self> {
		Self::locate_with(cluster_dir, |key| std::env::var_os(key))
	}

	/// Like [`locate`](Self::locate) with an explicit environment lookup.
	pub fn locate_with<F>(cluster_dir: impl Into<PathBuf>, lookup: F) -> Result<Self>
	where
		F: Fn(&str) -> Option<OsString>,
	{
		if let Some(program) = lookup(LAUNCHER_ENV).filter(|v| !v.is_empty()) {
			let program = PathBuf::from(program);
			if program.is_file() {
				debug!(target = "ctrlink.launcher", program = %program.display(), "using {LAUNCHER_ENV}");
				return Ok(Self::new(program, cluster_dir));
			}
			warn!(
				target = "ctrlink.launcher",
				program = %program.display(),
				"{LAUNCHER_ENV} does not point to a file; falling back to PATH"
			);
		}

		match which::which(LAUNCHER_PROGRAM) {
			Ok(program) => Ok(Self::new(program, cluster_dir)),
			Err(_) => Err(Error::LauncherNotFound),
		}
	}

	/// Arguments inserted before `start`, for wrapper programs.
	pub fn with_leading_args<I, S>(mut self, args: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<OsString>,
	{
		self.leading_args = args.into_iter().map(Into::into).collect();
		self
	}

	pub fn program(&self) -> &Path {
		&self.program
	}

	pub fn cluster_dir(&self) -> &Path {
		&self.cluster_dir
	}

	async fn launch(&self, workers: usize) -> Result<()> {
		{
			let running = self.running.lock();
			if let Some(current) = running.as_ref() {
				if current.exit.borrow().is_none() {
					return Err(Error::LaunchFailed("cluster process is already running".to_string()));
				}
			}
		}

		let mut cmd = Command::new(&self.program);
		cmd.args(&self.leading_args)
			.arg("start")
			.arg("-n")
			.arg(workers.to_string())
			.arg("--cluster-dir")
			.arg(&self.cluster_dir)
			.stdin(Stdio::null())
			.stdout(Stdio::null())
			.stderr(Stdio::inherit())
			.kill_on_drop(true);

		let mut child = cmd
			.spawn()
			.map_err(|e| Error::LaunchFailed(format!("Failed to spawn {}: {e}", self.program.display())))?;

		tokio::time::sleep(STARTUP_GRACE).await;

		match child.try_wait() {
			Ok(Some(status)) => {
				return Err(Error::LaunchFailed(format!(
					"Cluster process exited immediately with status: {status}"
				)));
			}
			Ok(None) => {}
			Err(e) => {
				return Err(Error::LaunchFailed(format!("Failed to check process status: {e}")));
			}
		}

		let pid = child.id();
		let kill = Arc::new(Notify::new());
		let (exit_tx, exit_rx) = watch::channel::<ExitState>(None);

		let kill_signal = Arc::clone(&kill);
		tokio::spawn(async move {
			let status = tokio::select! {
				status = child.wait() => status,
				_ = kill_signal.notified() => {
					if let Err(e) = child.start_kill() {
						warn!(target = "ctrlink.launcher", pid, "failed to signal cluster process: {e}");
					}
					child.wait().await
				}
			};
			let summary = match status {
				Ok(status) => status.to_string(),
				Err(e) => format!("wait failed: {e}"),
			};
			info!(target = "ctrlink.launcher", pid, status = %summary, "cluster process exited");
			let _ = exit_tx.send(Some(summary));
		});

		info!(target = "ctrlink.launcher", pid, workers, dir = %self.cluster_dir.display(), "cluster process started");
		*self.running.lock() = Some(Running { kill, exit: exit_rx });
		Ok(())
	}

	fn exit_receiver(&self) -> Option<watch::Receiver<ExitState>> {
		self.running.lock().as_ref().map(|r| r.exit.clone())
	}

	async fn wait_exit(mut exit: watch::Receiver<ExitState>) -> Result<()> {
		exit.wait_for(Option::is_some)
			.await
			.map(|_| ())
			.map_err(|_| Error::LaunchFailed("lost track of the cluster process".to_string()))
	}
}

impl Launcher for ProcessLauncher {
	fn start(&self, workers: usize) -> BoxFuture<'_, ()> {
		Box::pin(self.launch(workers))
	}

	fn stop(&self) -> BoxFuture<'_, ()> {
		Box::pin(async move {
			let kill = self.running.lock().as_ref().map(|r| Arc::clone(&r.kill));
			let Some(kill) = kill else {
				return Ok(());
			};
			kill.notify_one();
			match self.exit_receiver() {
				Some(exit) => Self::wait_exit(exit).await,
				None => Ok(()),
			}
		})
	}

	fn observe_stop(&self) -> BoxFuture<'_, ()> {
		Box::pin(async move {
			match self.exit_receiver() {
				Some(exit) => Self::wait_exit(exit).await,
				None => Ok(()),
			}
		})
	}
}

#[cfg(all(test, unix))]
mod tests {
	use tempfile::TempDir;

	use super::*;

	fn sh_launcher(script: &str, dir: &Path) -> ProcessLauncher {
		ProcessLauncher::new("/bin/sh", dir).with_leading_args(["-c", script, LAUNCHER_PROGRAM])
	}

	#[tokio::test]
	async fn start_passes_worker_count_and_directory() {
		let dir = TempDir::new().unwrap();
		let launcher = sh_launcher(r#"echo "$@" > "$5/args"; exec sleep 30"#, dir.path());

		launcher.start(3).await.unwrap();

		let args_file = dir.path().join("args");
		let mut recorded = String::new();
		for _ in 0..50 {
			recorded = std::fs::read_to_string(&args_file).unwrap_or_default();
			if !recorded.is_empty() {
				break;
			}
			tokio::time::sleep(Duration::from_millis(20)).await;
		}
		assert_eq!(
			recorded.trim(),
			format!("start -n 3 --cluster-dir {}", dir.path().display())
		);

		launcher.stop().await.unwrap();
	}

	#[tokio::test]
	async fn stop_terminates_and_releases_observers() {
		let dir = TempDir::new().unwrap();
		let launcher = Arc::new(sh_launcher("exec sleep 30", dir.path()));
		launcher.start(1).await.unwrap();

		let observer = {
			let launcher = Arc::clone(&launcher);
			tokio::spawn(async move { launcher.observe_stop().await })
		};

		tokio::time::timeout(Duration::from_secs(5), launcher.stop())
			.await
			.unwrap()
			.unwrap();
		tokio::time::timeout(Duration::from_secs(5), observer)
			.await
			.unwrap()
			.unwrap()
			.unwrap();
	}

	#[tokio::test]
	async fn observe_stop_sees_natural_exit() {
		let dir = TempDir::new().unwrap();
		let launcher = sh_launcher("sleep 0.3", dir.path());
		launcher.start(1).await.unwrap();

		tokio::time::timeout(Duration::from_secs(5), launcher.observe_stop())
			.await
			.unwrap()
			.unwrap();
	}

	#[tokio::test]
	async fn immediate_exit_is_launch_failure() {
		let dir = TempDir::new().unwrap();
		let launcher = sh_launcher("exit 3", dir.path());

		let err = launcher.start(1).await.unwrap_err();
		assert!(matches!(err, Error::LaunchFailed(ref m) if m.contains("exited immediately")), "{err:?}");
	}

	#[tokio::test]
	async fn second_start_while_running_is_rejected() {
		let dir = TempDir::new().unwrap();
		let launcher = sh_launcher("exec sleep 30", dir.path());
		launcher.start(1).await.unwrap();

		let err = launcher.start(1).await.unwrap_err();
		assert!(matches!(err, Error::LaunchFailed(_)));

		launcher.stop().await.unwrap();
		launcher.start(1).await.unwrap();
		launcher.stop().await.unwrap();
	}

	#[tokio::test]
	async fn stop_without_start_is_noop() {
		let dir = TempDir::new().unwrap();
		let launcher = sh_launcher("exec sleep 30", dir.path());
		launcher.stop().await.unwrap();
		launcher.observe_stop().await.unwrap();
	}

	#[test]
	fn locate_prefers_environment_override() {
		let dir = TempDir::new().unwrap();
		let program = dir.path().join("my-cluster");
		std::fs::write(&program, "").unwrap();

		let expected = program.clone();
		let launcher = ProcessLauncher::locate_with(dir.path(), move |key| {
			(key == LAUNCHER_ENV).then(|| expected.clone().into_os_string())
		})
		.unwrap();
		assert_eq!(launcher.program(), program);
		assert_eq!(launcher.cluster_dir(), dir.path());
	}
}
