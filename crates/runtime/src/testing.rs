//! In-process controller for tests.
//!
//! [`TestController`] listens on `127.0.0.1`, answers `__resolve__` for the
//! objects it exports, reports a configured client name for
//! `get_client_name`, and echoes any other method's params back.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use ctrlink_protocol::{METHOD_GET_CLIENT_NAME, METHOD_RESOLVE, Request, Response};
use serde_json::Value;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::error::Result;
use crate::transport::FrameTransport;

/// Controller stand-in serving a fixed set of objects.
pub struct TestController {
	port: u16,
	accepted: Arc<AtomicUsize>,
	accept_task: JoinHandle<()>,
}

impl TestController {
	/// Starts listening; `objects` maps object names to the client type name
	/// each reports.
	///
	/// Must be called from within a tokio runtime.
	pub async fn start(objects: &[(&str, &str)]) -> Result<Self> {
		let listener = TcpListener::bind("127.0.0.1:0").await?;
		let port = listener.local_addr()?.port();
		let objects: Arc<HashMap<String, String>> = Arc::new(
			objects
				.iter()
				.map(|(object, client)| (object.to_string(), client.to_string()))
				.collect(),
		);
		let accepted = Arc::new(AtomicUsize::new(0));

		let counter = Arc::clone(&accepted);
		let accept_task = tokio::spawn(async move {
			while let Ok((stream, _)) = listener.accept().await {
				counter.fetch_add(1, Ordering::SeqCst);
				let objects = Arc::clone(&objects);
				tokio::spawn(async move {
					let (reader, writer) = stream.into_split();
					let (transport, message_rx) = FrameTransport::new(writer, reader);
					let (sender, receiver) = transport.into_parts();
					serve(objects, sender, receiver, message_rx).await;
				});
			}
		});

		Ok(Self {
			port,
			accepted,
			accept_task,
		})
	}

	pub fn port(&self) -> u16 {
		self.port
	}

	/// Descriptor string for `object` on this controller.
	pub fn descriptor(&self, object: &str) -> String {
		format!("rpc://127.0.0.1:{}/{object}", self.port)
	}

	/// Number of TCP connections accepted so far.
	pub fn accepted(&self) -> usize {
		self.accepted.load(Ordering::SeqCst)
	}

	/// Stops accepting new connections.
	pub fn shutdown(&self) {
		self.accept_task.abort();
	}
}

impl Drop for TestController {
	fn drop(&mut self) {
		self.accept_task.abort();
	}
}

async fn serve<W, R>(
	objects: Arc<HashMap<String, String>>,
	mut sender: crate::transport::FrameSender<W>,
	mut receiver: crate::transport::FrameReceiver<R>,
	mut message_rx: mpsc::UnboundedReceiver<Value>,
) where
	W: tokio::io::AsyncWrite + Unpin + Send,
	R: tokio::io::AsyncRead + Unpin + Send + 'static,
{
	let reader = tokio::spawn(async move {
		let _ = receiver.run().await;
	});

	while let Some(message) = message_rx.recv().await {
		let Ok(request) = serde_json::from_value::<Request>(message) else {
			continue;
		};
		let response = match objects.get(&request.object) {
			None => Response::err(
				request.id,
				"NoSuchObject",
				format!("no object named '{}'", request.object),
			),
			Some(client) => match request.method.as_str() {
				METHOD_RESOLVE => Response::ok(request.id, Value::Null),
				METHOD_GET_CLIENT_NAME => Response::ok(request.id, Value::String(client.clone())),
				_ => Response::ok(request.id, request.params),
			},
		};
		let Ok(value) = serde_json::to_value(&response) else {
			continue;
		};
		if sender.send(value).await.is_err() {
			break;
		}
	}

	reader.abort();
}
