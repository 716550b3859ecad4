//! Wire types for the controller capability protocol.
//!
//! This crate contains the serde-serializable types exchanged between a
//! client session and a controller process, plus the fixed names both sides
//! agree on (method names, descriptor file names).
//!
//! # Design Philosophy
//!
//! Types in this crate are:
//! - **Pure data**: No behavior beyond serialization/deserialization
//! - **Stable**: Changes only when the wire protocol changes
//!
//! Session management, retry and client adaptation live in `ctrlink-runtime`
//! and `ctrlink`.

pub mod message;
pub mod role;

pub use message::*;
pub use role::*;
