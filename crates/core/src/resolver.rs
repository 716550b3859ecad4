//! Descriptor discovery.
//!
//! Strategies are tried in a fixed order and the first that yields a valid
//! source wins:
//!
//! 1. An explicit descriptor or descriptor-file path
//! 2. `<cluster_dir>/security/<file name>`
//! 3. `<cluster_<profile>>/security/<file name>`, searched from the registry root
//!
//! Resolution only checks syntax. The file may still be empty; that is handled
//! per connection attempt by the retry loop.

use std::fmt;
use std::path::Path;

use ctrlink_runtime::{ClusterDirectory, DescriptorSource, Error, Result};
use serde::Serialize;
use tracing::debug;

/// Profile used when none is given.
pub const DEFAULT_PROFILE: &str = "default";

/// Strategy that produced a [`DescriptorSource`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolvedBy {
	Explicit,
	ClusterDir,
	Profile,
}

impl fmt::Display for ResolvedBy {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(match self {
			ResolvedBy::Explicit => "explicit",
			ResolvedBy::ClusterDir => "cluster_dir",
			ResolvedBy::Profile => "profile",
		})
	}
}

/// Inputs to [`resolve`].
#[derive(Debug, Clone, Copy)]
pub struct ResolveRequest<'a> {
	/// Descriptor string or descriptor file path.
	pub descriptor: Option<&'a str>,
	pub cluster_dir: Option<&'a Path>,
	/// File name inside the cluster's `security/` directory.
	pub descriptor_file_name: Option<&'a str>,
	pub registry_root: &'a Path,
	pub profile: &'a str,
}

impl<'a> ResolveRequest<'a> {
	pub fn new(registry_root: &'a Path) -> Self {
		Self {
			descriptor: None,
			cluster_dir: None,
			descriptor_file_name: None,
			registry_root,
			profile: DEFAULT_PROFILE,
		}
	}
}

/// Finds the descriptor source for `request`.
///
/// # Errors
///
/// Returns [`Error::DescriptorNotFound`] if no strategy applies, or the
/// registry/validation error of the strategy that was selected.
pub fn resolve(request: &ResolveRequest<'_>) -> Result<(DescriptorSource, ResolvedBy)> {
	if let Some(explicit) = request.descriptor {
		if let Some(source) = DescriptorSource::parse(explicit) {
			debug!(target = "ctrlink.resolver", source = %source, "using explicit descriptor");
			return Ok((source, ResolvedBy::Explicit));
		}
		debug!(target = "ctrlink.resolver", value = explicit, "explicit descriptor is not valid, falling back");
	}

	let Some(file_name) = request.descriptor_file_name else {
		return Err(Error::DescriptorNotFound(
			"a descriptor file name is required when no valid descriptor is given".to_string(),
		));
	};

	if let Some(dir) = request.cluster_dir {
		let cluster = ClusterDirectory::find(dir).map_err(not_found)?;
		let source = DescriptorSource::file(cluster.security_dir().join(file_name)).map_err(not_found)?;
		debug!(target = "ctrlink.resolver", source = %source, "resolved from cluster directory");
		return Ok((source, ResolvedBy::ClusterDir));
	}

	let cluster = ClusterDirectory::find_by_profile(request.registry_root, request.profile).map_err(not_found)?;
	let source = DescriptorSource::file(cluster.security_dir().join(file_name)).map_err(not_found)?;
	debug!(target = "ctrlink.resolver", source = %source, profile = request.profile, "resolved from profile");
	Ok((source, ResolvedBy::Profile))
}

fn not_found(err: Error) -> Error {
	Error::DescriptorNotFound(err.to_string())
}
