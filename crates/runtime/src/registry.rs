//! Cluster directory registry.
//!
//! A cluster directory is named `cluster_<profile>` and holds a `security/`
//! subdirectory (where controllers write their descriptor files) and a `log/`
//! subdirectory. Profiles are looked up in this order:
//!
//! 1. The current working directory
//! 2. The registry root (`CTRLINK_DIR`, else `~/.ctrlink`)
//! 3. Each entry of `CTRLINK_CLUSTER_DIR_PATH`

use std::env;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

use ctrlink_protocol::ControllerRole;
use tracing::{debug, info};

use crate::error::{Error, Result};

/// Environment variable overriding the registry root.
pub const ROOT_ENV: &str = "CTRLINK_DIR";

/// Extra search path for cluster directories, in `PATH` syntax.
pub const SEARCH_PATH_ENV: &str = "CTRLINK_CLUSTER_DIR_PATH";

const ROOT_DIR_NAME: &str = ".ctrlink";
const SECURITY_DIR: &str = "security";
const LOG_DIR: &str = "log";

/// Returns the directory name used for `profile`.
pub fn cluster_dir_name(profile: &str) -> String {
	format!("cluster_{profile}")
}

/// Registry root: `CTRLINK_DIR` if set, otherwise `~/.ctrlink`.
pub fn default_root() -> Result<PathBuf> {
	if let Some(root) = env::var_os(ROOT_ENV).filter(|v| !v.is_empty()) {
		return Ok(PathBuf::from(root));
	}
	dirs::home_dir()
		.map(|home| home.join(ROOT_DIR_NAME))
		.ok_or_else(|| Error::ClusterDir("cannot determine home directory; set CTRLINK_DIR".to_string()))
}

/// A directory holding one cluster's security and log files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterDirectory {
	location: PathBuf,
}

impl ClusterDirectory {
	/// Opens an existing cluster directory. Nothing is written to disk.
	pub fn find(path: impl AsRef<Path>) -> Result<Self> {
		let location = path.as_ref();
		if !location.is_dir() {
			return Err(Error::ClusterDir(format!(
				"cluster directory not found: {}",
				location.display()
			)));
		}
		Ok(Self {
			location: location.to_path_buf(),
		})
	}

	/// Searches the standard locations for `cluster_<profile>`.
	pub fn find_by_profile(root: impl AsRef<Path>, profile: &str) -> Result<Self> {
		let search = search_paths(root.as_ref(), env::var_os(SEARCH_PATH_ENV));
		Self::find_in(&search, profile)
	}

	/// Searches `paths` in order for `cluster_<profile>`.
	pub fn find_in(paths: &[PathBuf], profile: &str) -> Result<Self> {
		let name = cluster_dir_name(profile);
		for base in paths {
			let candidate = base.join(&name);
			if candidate.is_dir() {
				debug!(target = "ctrlink.registry", path = %candidate.display(), profile, "found cluster directory");
				return Self::find(candidate);
			}
		}
		Err(Error::ClusterDir(format!(
			"no cluster directory for profile '{profile}' in {}",
			paths.iter().map(|p| p.display().to_string()).collect::<Vec<_>>().join(", ")
		)))
	}

	/// Creates `<root>/cluster_<profile>` with its subdirectories.
	///
	/// Succeeds if the directory already exists.
	pub fn create_by_profile(root: impl AsRef<Path>, profile: &str) -> Result<Self> {
		let location = root.as_ref().join(cluster_dir_name(profile));
		std::fs::create_dir_all(&location)?;
		info!(target = "ctrlink.registry", path = %location.display(), profile, "created cluster directory");
		let dir = Self { location };
		dir.ensure_subdirs()?;
		Ok(dir)
	}

	/// Finds the profile's directory, creating it under `root` when missing
	/// and `create` is set.
	pub fn find_or_create(root: impl AsRef<Path>, profile: &str, create: bool) -> Result<Self> {
		let root = root.as_ref();
		match Self::find_by_profile(root, profile) {
			Ok(dir) => dir.ensure_subdirs().map(|()| dir),
			Err(Error::ClusterDir(_)) if create => Self::create_by_profile(root, profile),
			Err(e) => Err(e),
		}
	}

	pub fn location(&self) -> &Path {
		&self.location
	}

	/// Directory holding descriptor files.
	pub fn security_dir(&self) -> PathBuf {
		self.location.join(SECURITY_DIR)
	}

	pub fn log_dir(&self) -> PathBuf {
		self.location.join(LOG_DIR)
	}

	/// Path of the descriptor file written by a controller of `role`.
	pub fn descriptor_path(&self, role: ControllerRole) -> PathBuf {
		self.security_dir().join(role.descriptor_file_name())
	}

	/// Creates `security/` and `log/` if they are missing.
	pub fn ensure_subdirs(&self) -> Result<()> {
		std::fs::create_dir_all(self.security_dir())?;
		std::fs::create_dir_all(self.log_dir())?;
		Ok(())
	}
}

fn search_paths(root: &Path, extra: Option<OsString>) -> Vec<PathBuf> {
	let mut paths = Vec::new();
	if let Ok(cwd) = env::current_dir() {
		paths.push(cwd);
	}
	paths.push(root.to_path_buf());
	if let Some(extra) = extra {
		paths.extend(env::split_paths(&extra).filter(|p| !p.as_os_str().is_empty()));
	}
	paths
}
