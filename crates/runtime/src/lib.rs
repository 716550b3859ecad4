//! ctrlink runtime: descriptors, sessions, event loop and cluster processes
//!
//! This crate provides the low-level infrastructure for talking to a
//! controller process:
//!
//! - **Descriptors**: Parsing `rpc://host:port/object` strings and the files
//!   controllers write them to
//! - **Transport**: Length-prefixed JSON frames over TCP
//! - **Session**: Request/response correlation and remote capabilities
//! - **Event loop**: A background runtime blocking callers submit work to
//! - **Registry / launcher**: Cluster directories and the `ctrlcluster` process
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐
//! │   ctrlink   │  Resolver, cache, retry, client adapter, cluster
//! └──────┬──────┘
//!        │ uses Session / Capability / Launcher
//! ┌──────▼──────────┐
//! │ ctrlink-runtime │  This crate
//! │  ┌───────────┐  │
//! │  │ Session   │  │  Request correlation, one TCP connection per controller
//! │  └───────────┘  │
//! │  ┌───────────┐  │
//! │  │ Transport │  │  Length-prefixed frames
//! │  └───────────┘  │
//! │  ┌───────────┐  │
//! │  │ EventLoop │  │  Background single-threaded runtime
//! │  └───────────┘  │
//! └─────────────────┘
//! ```

pub mod descriptor;
pub mod error;
pub mod event_loop;
pub mod launcher;
pub mod registry;
pub mod session;
pub mod transport;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use descriptor::{Descriptor, DescriptorSource, is_valid_descriptor, is_valid_descriptor_file};
pub use error::{Error, Result};
pub use event_loop::{EventLoop, run_blocking};
pub use launcher::{Launcher, ProcessLauncher};
pub use registry::ClusterDirectory;
pub use session::{BoxFuture, Capability, RpcSession, Session};
pub use transport::{FrameReceiver, FrameSender, FrameTransport};
