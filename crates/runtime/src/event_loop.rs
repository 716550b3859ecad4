//! Process-wide background event loop.
//!
//! Blocking callers hand futures to a single-threaded tokio runtime that lives
//! on its own thread for the lifetime of the process. Every connector shares
//! that loop, so connections and cached capabilities stay bound to one runtime
//! regardless of which thread asks for them.
//!
//! ```ignore
//! let loop_ = EventLoop::global()?;
//! let value = loop_.run_blocking(async { Ok(41 + 1) })?;
//! ```

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::{OnceLock, mpsc};
use std::thread::{self, ThreadId};

use futures_util::FutureExt;
use parking_lot::Mutex;
use tokio::runtime::{Builder, Handle};
use tracing::debug;

use crate::error::{Error, Result};

const LOOP_THREAD_NAME: &str = "ctrlink-loop";

static GLOBAL: OnceLock<EventLoop> = OnceLock::new();
static INIT_LOCK: Mutex<()> = Mutex::new(());

/// Handle to the background loop thread.
#[derive(Debug)]
pub struct EventLoop {
	handle: Handle,
	thread_id: ThreadId,
}

impl EventLoop {
	/// Returns the process-wide loop, starting it on first use.
	///
	/// Concurrent first calls serialize on a lock, so only one loop thread is
	/// ever spawned.
	pub fn global() -> Result<&'static EventLoop> {
		if let Some(existing) = GLOBAL.get() {
			return Ok(existing);
		}
		let _guard = INIT_LOCK.lock();
		if let Some(existing) = GLOBAL.get() {
			return Ok(existing);
		}
		let started = Self::start()?;
		Ok(GLOBAL.get_or_init(|| started))
	}

	/// Starts a dedicated loop thread.
	///
	/// The thread parks in `block_on(pending)` and never joins, so it does not
	/// keep the process alive once `main` returns.
	pub fn start() -> Result<EventLoop> {
		let runtime = Builder::new_current_thread()
			.enable_all()
			.build()
			.map_err(|e| Error::EventLoop(format!("failed to build runtime: {e}")))?;
		let handle = runtime.handle().clone();

		let thread = thread::Builder::new()
			.name(LOOP_THREAD_NAME.to_string())
			.spawn(move || {
				runtime.block_on(std::future::pending::<()>());
			})
			.map_err(|e| Error::EventLoop(format!("failed to spawn loop thread: {e}")))?;

		debug!(target = "ctrlink.loop", thread = ?thread.thread().id(), "event loop started");
		Ok(EventLoop {
			handle,
			thread_id: thread.thread().id(),
		})
	}

	/// Runtime handle, for spawning work that must live on this loop.
	pub fn handle(&self) -> &Handle {
		&self.handle
	}

	/// Returns true when called from the loop thread itself.
	pub fn is_loop_thread(&self) -> bool {
		thread::current().id() == self.thread_id
	}

	/// Runs `fut` to completion on the loop and blocks the caller until it
	/// finishes.
	///
	/// The future's own error comes back unchanged. A panic inside the future
	/// is resumed on the calling thread. Calling this from the loop thread
	/// would deadlock, so it fails with [`Error::EventLoop`] instead.
	///
	/// The caller waits on a plain channel rather than a tokio one, so threads
	/// that are themselves driving a runtime may call this too. They stay
	/// blocked for the duration; async code should prefer the `Async*` API.
	pub fn run_blocking<F, T>(&self, fut: F) -> Result<T>
	where
		F: Future<Output = Result<T>> + Send + 'static,
		T: Send + 'static,
	{
		if self.is_loop_thread() {
			return Err(Error::EventLoop(
				"run_blocking called from the event loop thread".to_string(),
			));
		}

		let (tx, rx) = mpsc::sync_channel(1);
		self.handle.spawn(async move {
			let outcome = AssertUnwindSafe(fut).catch_unwind().await;
			let _ = tx.send(outcome);
		});

		match rx.recv() {
			Ok(Ok(result)) => result,
			Ok(Err(panic)) => std::panic::resume_unwind(panic),
			Err(_) => Err(Error::EventLoop("event loop dropped the task".to_string())),
		}
	}
}

/// Runs `fut` on the process-wide loop.
///
/// See [`EventLoop::run_blocking`].
pub fn run_blocking<F, T>(fut: F) -> Result<T>
where
	F: Future<Output = Result<T>> + Send + 'static,
	T: Send + 'static,
{
	EventLoop::global()?.run_blocking(fut)
}
