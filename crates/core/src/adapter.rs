//! Capability to typed-client adaptation.
//!
//! The controller names the client type its object expects through
//! `get_client_name`; [`ClientRegistry`] maps that name to a constructor.

use std::collections::HashMap;
use std::sync::Arc;

use ctrlink_protocol::METHOD_GET_CLIENT_NAME;
use ctrlink_runtime::{Capability, Error, Result, Session};
use serde_json::Value;
use tracing::debug;

use crate::clients::{MultiEngineClient, TaskClient, TypedClient};

/// Builds a typed client from a capability and its session.
pub type ClientConstructor =
	Arc<dyn Fn(Arc<dyn Capability>, Arc<dyn Session>) -> Arc<dyn TypedClient> + Send + Sync>;

/// Type-name to constructor table.
#[derive(Clone, Default)]
pub struct ClientRegistry {
	constructors: HashMap<String, ClientConstructor>,
}

impl std::fmt::Debug for ClientRegistry {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		let mut names: Vec<_> = self.constructors.keys().collect();
		names.sort();
		f.debug_struct("ClientRegistry").field("types", &names).finish()
	}
}

impl ClientRegistry {
	/// Empty registry.
	pub fn new() -> Self {
		Self::default()
	}

	/// Registry knowing [`TaskClient`] and [`MultiEngineClient`].
	pub fn with_defaults() -> Self {
		let mut registry = Self::new();
		registry.register(TaskClient::TYPE_NAME, |capability, session| {
			Arc::new(TaskClient::new(capability, session))
		});
		registry.register(MultiEngineClient::TYPE_NAME, |capability, session| {
			Arc::new(MultiEngineClient::new(capability, session))
		});
		registry
	}

	/// Adds or replaces the constructor for `type_name`.
	pub fn register<F>(&mut self, type_name: impl Into<String>, constructor: F) -> &mut Self
	where
		F: Fn(Arc<dyn Capability>, Arc<dyn Session>) -> Arc<dyn TypedClient> + Send + Sync + 'static,
	{
		self.constructors.insert(type_name.into(), Arc::new(constructor));
		self
	}

	pub fn contains(&self, type_name: &str) -> bool {
		self.constructors.contains_key(type_name)
	}

	/// Asks the capability for its client type and builds that client.
	///
	/// # Errors
	///
	/// Returns [`Error::AdapterResolution`] if the reported name is not
	/// registered, [`Error::ProtocolError`] if the reply is not a string, or
	/// the remote call's own error.
	pub async fn adapt(
		&self,
		capability: Arc<dyn Capability>,
		session: Arc<dyn Session>,
	) -> Result<Arc<dyn TypedClient>> {
		let reply = capability.call_remote(METHOD_GET_CLIENT_NAME, Value::Null).await?;
		let type_name = match reply {
			Value::String(name) => name,
			other => {
				return Err(Error::ProtocolError(format!(
					"{METHOD_GET_CLIENT_NAME} returned {other}, expected a type name"
				)));
			}
		};

		let constructor = self
			.constructors
			.get(&type_name)
			.ok_or_else(|| Error::AdapterResolution(type_name.clone()))?;
		debug!(
			target = "ctrlink.adapter",
			descriptor = %capability.descriptor(),
			client = %type_name,
			"adapted capability"
		);
		Ok(constructor(capability, session))
	}
}
