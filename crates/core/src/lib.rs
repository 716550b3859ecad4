//! ctrlink: resilient clients for controller processes
//!
//! A controller publishes its address as a descriptor
//! (`rpc://host:port/object`) in a file under its cluster directory. This
//! crate finds that descriptor, connects through a shared session while the
//! controller is still booting, and hands back a typed client.
//!
//! # Pipeline
//!
//! ```text
//! resolver ──▶ retry ──▶ cache ──▶ adapter ──▶ TypedClient
//!   │            │         │          │
//!   │            │         │          └─ get_client_name → ClientRegistry
//!   │            │         └─ one capability per descriptor
//!   │            └─ re-read descriptor, back off ×1.5
//!   └─ explicit → cluster dir → profile
//! ```
//!
//! [`AsyncClientConnector`] and [`AsyncCluster`] are the async API.
//! [`ClientConnector`] and [`Cluster`] expose the same operations to
//! synchronous code by running them on a background event loop.
//!
//! # Example
//!
//! ```ignore
//! use ctrlink::{Cluster, ClusterOptions};
//!
//! let cluster = Cluster::new(ClusterOptions::new().profile("lab").auto_create(true))?;
//! cluster.start(4)?;
//! let tc = cluster.get_task_client(None)?;
//! let reply = tc.call("queue_status", serde_json::Value::Null)?;
//! cluster.close()?;
//! ```

pub mod adapter;
pub mod cache;
pub mod clients;
pub mod cluster;
pub mod config;
pub mod connector;
pub mod resolver;
pub mod retry;

#[cfg(test)]
mod test_support;

pub use adapter::{ClientConstructor, ClientRegistry};
pub use cache::ConnectionCache;
pub use clients::{BlockingClient, MultiEngineClient, TaskClient, TypedClient};
pub use cluster::{AsyncCluster, Cluster, ClusterOptions, ClusterState, LauncherFactory};
pub use config::ConnectorConfig;
pub use connector::{
	AsyncClientConnector, ClientConnector, ClientRequest, default_connector, get_multiengine_client,
	get_task_client,
};
pub use ctrlink_protocol::ControllerRole;
pub use ctrlink_runtime::{
	BoxFuture, Capability, ClusterDirectory, Descriptor, DescriptorSource, Error, EventLoop, Launcher,
	ProcessLauncher, Result, RpcSession, Session, run_blocking,
};
pub use resolver::{ResolveRequest, ResolvedBy, resolve};
pub use retry::{RetryPolicy, connect_with_retry};
