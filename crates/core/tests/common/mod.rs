// Shared fixtures for the integration tests: an in-memory launcher that
// records start/stop calls and can run a hook when the "cluster" comes up
// (for example to publish a descriptor file).

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use ctrlink::{BoxFuture, Error, Launcher};
use tokio::sync::watch;

type StartHook = Box<dyn Fn(usize) + Send + Sync>;

pub struct MockLauncher {
	pub starts: AtomicUsize,
	pub stops: AtomicUsize,
	pub last_workers: AtomicUsize,
	fail_start: AtomicBool,
	running: watch::Sender<bool>,
	on_start: Option<StartHook>,
}

impl MockLauncher {
	pub fn new() -> Arc<Self> {
		Arc::new(Self::build(None))
	}

	/// Runs `hook(workers)` after every successful start.
	pub fn with_hook(hook: impl Fn(usize) + Send + Sync + 'static) -> Arc<Self> {
		Arc::new(Self::build(Some(Box::new(hook))))
	}

	fn build(on_start: Option<StartHook>) -> Self {
		let (running, _) = watch::channel(false);
		Self {
			starts: AtomicUsize::new(0),
			stops: AtomicUsize::new(0),
			last_workers: AtomicUsize::new(0),
			fail_start: AtomicBool::new(false),
			running,
			on_start,
		}
	}

	pub fn fail_next_start(&self) {
		self.fail_start.store(true, Ordering::SeqCst);
	}

	pub fn is_running(&self) -> bool {
		*self.running.borrow()
	}

	/// Simulates the cluster process exiting on its own.
	pub fn crash(&self) {
		self.running.send_replace(false);
	}

	pub fn starts(&self) -> usize {
		self.starts.load(Ordering::SeqCst)
	}

	pub fn stops(&self) -> usize {
		self.stops.load(Ordering::SeqCst)
	}
}

impl Launcher for MockLauncher {
	fn start(&self, workers: usize) -> BoxFuture<'_, ()> {
		Box::pin(async move {
			if self.fail_start.swap(false, Ordering::SeqCst) {
				return Err(Error::LaunchFailed("Cluster process exited immediately with status: 1".into()));
			}
			self.starts.fetch_add(1, Ordering::SeqCst);
			self.last_workers.store(workers, Ordering::SeqCst);
			self.running.send_replace(true);
			if let Some(hook) = &self.on_start {
				hook(workers);
			}
			Ok(())
		})
	}

	fn stop(&self) -> BoxFuture<'_, ()> {
		Box::pin(async move {
			self.stops.fetch_add(1, Ordering::SeqCst);
			self.running.send_replace(false);
			Ok(())
		})
	}

	fn observe_stop(&self) -> BoxFuture<'_, ()> {
		Box::pin(async move {
			let mut rx = self.running.subscribe();
			rx.wait_for(|running| !running)
				.await
				.map(|_| ())
				.map_err(|_| Error::ChannelClosed)
		})
	}
}
