//! RPC session and remote capabilities.
//!
//! A [`Session`] turns a [`Descriptor`] into a live [`Capability`]. The
//! connector layer only talks to these two traits, so tests (and alternative
//! transports) can supply their own session without touching the retry or
//! caching logic.
//!
//! [`RpcSession`] is the stock implementation: it keeps one TCP connection
//! per controller address and multiplexes every capability on that address
//! over it.

mod peer;

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use ctrlink_protocol::METHOD_RESOLVE;
use dashmap::DashMap;
use serde_json::Value;
use tracing::{debug, info};

use self::peer::PeerConnection;
use crate::descriptor::Descriptor;
use crate::error::Result;

/// Boxed future returned by the session traits.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>;

/// Default bound on establishing a TCP connection to a controller.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Long-lived connection manager shared by every capability of a connector.
pub trait Session: Send + Sync {
	/// Establishes a capability for `descriptor`.
	///
	/// Fails if the controller is unreachable or does not export the object.
	fn get_reference<'a>(&'a self, descriptor: &'a Descriptor) -> BoxFuture<'a, Arc<dyn Capability>>;
}

/// Live handle to a remote object.
pub trait Capability: Send + Sync {
	/// Descriptor this capability was obtained from.
	fn descriptor(&self) -> &Descriptor;

	/// Invokes `method` on the remote object.
	fn call_remote<'a>(&'a self, method: &'a str, params: Value) -> BoxFuture<'a, Value>;
}

impl fmt::Debug for dyn Capability {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Capability").field("descriptor", &self.descriptor().as_str()).finish()
	}
}

/// TCP session speaking the length-prefixed JSON protocol.
pub struct RpcSession {
	peers: DashMap<String, Arc<PeerConnection>>,
	connect_timeout: Duration,
}

impl Default for RpcSession {
	fn default() -> Self {
		Self::new()
	}
}

impl RpcSession {
	pub fn new() -> Self {
		Self {
			peers: DashMap::new(),
			connect_timeout: DEFAULT_CONNECT_TIMEOUT,
		}
	}

	pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
		self.connect_timeout = timeout;
		self
	}

	/// Number of open controller connections.
	pub fn peer_count(&self) -> usize {
		self.peers.iter().filter(|p| !p.value().is_closed()).count()
	}

	async fn peer(&self, authority: &str) -> Result<Arc<PeerConnection>> {
		let existing = self.peers.get(authority).map(|p| Arc::clone(p.value()));
		if let Some(peer) = existing {
			if !peer.is_closed() {
				return Ok(peer);
			}
			debug!(target = "ctrlink.session", peer = authority, "dropping closed connection");
			self.peers.remove(authority);
		}

		let peer = PeerConnection::connect(authority, self.connect_timeout).await?;
		info!(target = "ctrlink.session", peer = peer.authority(), "connected to controller");
		self.peers.insert(authority.to_string(), Arc::clone(&peer));
		Ok(peer)
	}
}

impl Session for RpcSession {
	fn get_reference<'a>(&'a self, descriptor: &'a Descriptor) -> BoxFuture<'a, Arc<dyn Capability>> {
		Box::pin(async move {
			let peer = self.peer(descriptor.authority()).await?;
			peer.send(descriptor.object(), METHOD_RESOLVE, Value::Null).await?;
			debug!(target = "ctrlink.session", descriptor = %descriptor, "resolved remote object");

			let capability: Arc<dyn Capability> = Arc::new(RemoteCapability {
				descriptor: descriptor.clone(),
				peer,
			});
			Ok(capability)
		})
	}
}

/// Capability backed by an [`RpcSession`] connection.
struct RemoteCapability {
	descriptor: Descriptor,
	peer: Arc<PeerConnection>,
}

impl Capability for RemoteCapability {
	fn descriptor(&self) -> &Descriptor {
		&self.descriptor
	}

	fn call_remote<'a>(&'a self, method: &'a str, params: Value) -> BoxFuture<'a, Value> {
		Box::pin(async move { self.peer.send(self.descriptor.object(), method, params).await })
	}
}
