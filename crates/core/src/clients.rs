//! Typed clients handed back to callers.
//!
//! A typed client wraps a remote capability together with the session it came
//! from. The concrete type is chosen at runtime by the controller (see
//! [`ClientRegistry`](crate::ClientRegistry)), so callers receive an
//! `Arc<dyn TypedClient>` and downcast when they need the concrete API.

use std::fmt;
use std::sync::Arc;

use ctrlink_runtime::{BoxFuture, Capability, EventLoop, Result, Session};
use downcast_rs::{DowncastSync, impl_downcast};
use serde_json::Value;

/// Common interface of every adapted client.
pub trait TypedClient: DowncastSync {
	/// Registry name of this client type.
	fn type_name(&self) -> &'static str;

	/// Capability the client talks through.
	fn capability(&self) -> &Arc<dyn Capability>;

	/// Session shared with every other client of the same connector.
	fn session(&self) -> &Arc<dyn Session>;

	/// Invokes `method` on the remote object.
	fn call<'a>(&'a self, method: &'a str, params: Value) -> BoxFuture<'a, Value> {
		self.capability().call_remote(method, params)
	}
}

impl_downcast!(sync TypedClient);

impl fmt::Debug for dyn TypedClient {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct(self.type_name())
			.field("descriptor", &self.capability().descriptor().as_str())
			.finish()
	}
}

macro_rules! typed_client {
	($(#[$meta:meta])* $name:ident, $type_name:literal) => {
		$(#[$meta])*
		pub struct $name {
			capability: Arc<dyn Capability>,
			session: Arc<dyn Session>,
		}

		impl $name {
			/// Name the controller reports for this client type.
			pub const TYPE_NAME: &'static str = $type_name;

			pub fn new(capability: Arc<dyn Capability>, session: Arc<dyn Session>) -> Self {
				Self { capability, session }
			}
		}

		impl TypedClient for $name {
			fn type_name(&self) -> &'static str {
				Self::TYPE_NAME
			}

			fn capability(&self) -> &Arc<dyn Capability> {
				&self.capability
			}

			fn session(&self) -> &Arc<dyn Session> {
				&self.session
			}
		}
	};
}

typed_client!(
	/// Client for a task controller (load-balanced task submission).
	TaskClient,
	"ctrlink::clients::TaskClient"
);

typed_client!(
	/// Client for a multi-engine controller (direct engine addressing).
	MultiEngineClient,
	"ctrlink::clients::MultiEngineClient"
);

/// Synchronous facade over a typed client.
///
/// Calls are relayed to the process-wide event loop and block the caller.
#[derive(Clone)]
pub struct BlockingClient {
	inner: Arc<dyn TypedClient>,
	event_loop: &'static EventLoop,
}

impl fmt::Debug for BlockingClient {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_tuple("BlockingClient").field(&self.inner).finish()
	}
}

impl BlockingClient {
	pub(crate) fn new(inner: Arc<dyn TypedClient>, event_loop: &'static EventLoop) -> Self {
		Self { inner, event_loop }
	}

	pub fn type_name(&self) -> &'static str {
		self.inner.type_name()
	}

	/// Underlying async client.
	pub fn inner(&self) -> &Arc<dyn TypedClient> {
		&self.inner
	}

	/// Returns the concrete client if it is a `T`.
	pub fn downcast<T: TypedClient>(&self) -> Option<Arc<T>> {
		Arc::clone(&self.inner).downcast_arc::<T>().ok()
	}

	/// Invokes `method` on the remote object and waits for the result.
	pub fn call(&self, method: &str, params: Value) -> Result<Value> {
		let client = Arc::clone(&self.inner);
		let method = method.to_string();
		self.event_loop
			.run_blocking(async move { client.call(&method, params).await })
	}
}
