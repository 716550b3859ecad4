//! In-memory session used by unit tests.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use ctrlink_protocol::METHOD_GET_CLIENT_NAME;
use ctrlink_runtime::{BoxFuture, Capability, Descriptor, Error, Session};
use serde_json::Value;

use crate::clients::TaskClient;

/// Session whose objects report fixed client names.
pub(crate) struct MockSession {
	client_names: HashMap<String, String>,
	refuse_first: usize,
	pub(crate) connects: AtomicUsize,
}

impl MockSession {
	/// Every object reports `TaskClient`.
	pub(crate) fn new() -> Self {
		Self {
			client_names: HashMap::new(),
			refuse_first: 0,
			connects: AtomicUsize::new(0),
		}
	}

	pub(crate) fn with_client(mut self, object: &str, client: &str) -> Self {
		self.client_names.insert(object.to_string(), client.to_string());
		self
	}

	/// Fails the first `n` connects with `ConnectionFailed`.
	pub(crate) fn refusing_first(mut self, n: usize) -> Self {
		self.refuse_first = n;
		self
	}

	pub(crate) fn connect_count(&self) -> usize {
		self.connects.load(Ordering::SeqCst)
	}
}

impl Session for MockSession {
	fn get_reference<'a>(&'a self, descriptor: &'a Descriptor) -> BoxFuture<'a, Arc<dyn Capability>> {
		Box::pin(async move {
			let n = self.connects.fetch_add(1, Ordering::SeqCst);
			if n < self.refuse_first {
				return Err(Error::ConnectionFailed(format!("{}: refused", descriptor.authority())));
			}
			let client_name = self
				.client_names
				.get(descriptor.object())
				.cloned()
				.unwrap_or_else(|| TaskClient::TYPE_NAME.to_string());
			let capability: Arc<dyn Capability> = Arc::new(MockCapability {
				descriptor: descriptor.clone(),
				client_name,
			});
			Ok(capability)
		})
	}
}

pub(crate) struct MockCapability {
	descriptor: Descriptor,
	client_name: String,
}

impl Capability for MockCapability {
	fn descriptor(&self) -> &Descriptor {
		&self.descriptor
	}

	fn call_remote<'a>(&'a self, method: &'a str, params: Value) -> BoxFuture<'a, Value> {
		Box::pin(async move {
			if method == METHOD_GET_CLIENT_NAME {
				Ok(Value::String(self.client_name.clone()))
			} else {
				Ok(params)
			}
		})
	}
}
