//! Library half of the `ctrlink` binary.
//!
//! Split out so the argument parser, the output envelope and the error
//! mapping can be tested without spawning the binary.

pub mod cli;
pub mod commands;
pub mod error;
pub mod logging;
pub mod output;
