//! One TCP connection to a controller, with request/response correlation.
//!
//! # Message Flow
//!
//! 1. [`PeerConnection::send`] allocates an ID and parks a oneshot sender
//! 2. The request is queued for the writer task
//! 3. The dispatch task receives the response frame and completes the oneshot
//! 4. When the stream closes every parked request fails with `ChannelClosed`

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::task::{Context, Poll};
use std::time::Duration;

use ctrlink_protocol::{Request, Response};
use parking_lot::Mutex;
use serde_json::Value;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error};

use crate::error::{Error, Result};
use crate::transport::FrameTransport;

/// Pending request callbacks keyed by request ID.
type CallbackMap = Arc<Mutex<HashMap<u32, oneshot::Sender<Result<Value>>>>>;

/// Removes the parked callback when a request future is dropped early.
struct CancelGuard {
	id: u32,
	callbacks: CallbackMap,
	completed: bool,
}

impl Drop for CancelGuard {
	fn drop(&mut self) {
		if !self.completed && self.callbacks.lock().remove(&self.id).is_some() {
			debug!(target = "ctrlink.session", id = self.id, "removed orphaned callback");
		}
	}
}

struct ResponseFuture {
	rx: oneshot::Receiver<Result<Value>>,
	guard: CancelGuard,
}

impl Future for ResponseFuture {
	type Output = Result<Value>;

	fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
		match Pin::new(&mut self.rx).poll(cx) {
			Poll::Ready(result) => {
				self.guard.completed = true;
				Poll::Ready(result.map_err(|_| Error::ChannelClosed).and_then(|r| r))
			}
			Poll::Pending => Poll::Pending,
		}
	}
}

/// Connection to a single `host:port`.
pub(crate) struct PeerConnection {
	authority: String,
	last_id: AtomicU32,
	callbacks: CallbackMap,
	outbound_tx: mpsc::UnboundedSender<Value>,
	closed: Arc<AtomicBool>,
}

impl PeerConnection {
	/// Opens a TCP connection and starts its reader, writer and dispatch tasks.
	pub(crate) async fn connect(authority: &str, timeout: Duration) -> Result<Arc<Self>> {
		let stream = match tokio::time::timeout(timeout, TcpStream::connect(authority)).await {
			Ok(Ok(stream)) => stream,
			Ok(Err(e)) => return Err(Error::ConnectionFailed(format!("{authority}: {e}"))),
			Err(_) => {
				return Err(Error::ConnectionFailed(format!(
					"{authority}: no answer within {}ms",
					timeout.as_millis()
				)));
			}
		};
		let _ = stream.set_nodelay(true);
		let (reader, writer) = stream.into_split();
		Ok(Self::spawn(authority, reader, writer))
	}

	/// Wires a connection over an arbitrary stream pair.
	///
	/// Must be called from within a tokio runtime.
	pub(crate) fn spawn<R, W>(authority: &str, reader: R, writer: W) -> Arc<Self>
	where
		R: AsyncRead + Unpin + Send + 'static,
		W: AsyncWrite + Unpin + Send + 'static,
	{
		let (transport, mut message_rx) = FrameTransport::new(writer, reader);
		let (mut sender, mut receiver) = transport.into_parts();
		let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<Value>();

		let peer = Arc::new(Self {
			authority: authority.to_string(),
			last_id: AtomicU32::new(0),
			callbacks: Arc::new(Mutex::new(HashMap::new())),
			outbound_tx,
			closed: Arc::new(AtomicBool::new(false)),
		});

		let label = peer.authority.clone();
		tokio::spawn(async move {
			if let Err(e) = receiver.run().await {
				error!(target = "ctrlink.session", peer = %label, "transport read error: {e}");
			}
		});

		let label = peer.authority.clone();
		tokio::spawn(async move {
			while let Some(message) = outbound_rx.recv().await {
				if let Err(e) = sender.send(message).await {
					error!(target = "ctrlink.session", peer = %label, "transport write error: {e}");
					break;
				}
			}
		});

		let callbacks = Arc::clone(&peer.callbacks);
		let closed = Arc::clone(&peer.closed);
		let label = peer.authority.clone();
		tokio::spawn(async move {
			while let Some(message) = message_rx.recv().await {
				if let Err(e) = dispatch(&callbacks, message) {
					error!(target = "ctrlink.session", peer = %label, "error dispatching frame: {e}");
				}
			}
			closed.store(true, Ordering::SeqCst);
			let pending: Vec<_> = callbacks.lock().drain().collect();
			debug!(
				target = "ctrlink.session",
				peer = %label,
				pending = pending.len(),
				"connection closed"
			);
			for (_, callback) in pending {
				let _ = callback.send(Err(Error::ChannelClosed));
			}
		});

		peer
	}

	pub(crate) fn authority(&self) -> &str {
		&self.authority
	}

	pub(crate) fn is_closed(&self) -> bool {
		self.closed.load(Ordering::SeqCst)
	}

	/// Sends a request to `object` and awaits the response.
	pub(crate) async fn send(&self, object: &str, method: &str, params: Value) -> Result<Value> {
		let id = self.last_id.fetch_add(1, Ordering::SeqCst);
		debug!(target = "ctrlink.session", peer = %self.authority, id, object, method, "sending request");

		let (tx, rx) = oneshot::channel();
		self.callbacks.lock().insert(id, tx);
		let guard = CancelGuard {
			id,
			callbacks: Arc::clone(&self.callbacks),
			completed: false,
		};

		// Re-check after parking the callback: the dispatch task sets `closed`
		// before draining, so one of the two always sees the other.
		if self.is_closed() {
			return Err(Error::ChannelClosed);
		}

		let request = Request {
			id,
			object: object.to_string(),
			method: method.to_string(),
			params,
		};
		if self.outbound_tx.send(serde_json::to_value(&request)?).is_err() {
			return Err(Error::ChannelClosed);
		}

		ResponseFuture { rx, guard }.await
	}
}

fn dispatch(callbacks: &CallbackMap, message: Value) -> Result<()> {
	let response: Response = serde_json::from_value(message)?;
	let callback = callbacks
		.lock()
		.remove(&response.id)
		.ok_or_else(|| Error::ProtocolError(format!("Cannot find request to respond: id={}", response.id)))?;

	let result = match response.error {
		Some(error) => Err(Error::Remote {
			name: error.name.unwrap_or_else(|| "Error".to_string()),
			message: error.message,
		}),
		None => Ok(response.result.unwrap_or(Value::Null)),
	};
	let _ = callback.send(result);
	Ok(())
}
