//! Capability descriptors and the places they are read from.
//!
//! A descriptor is the address a controller publishes for one of its
//! objects, `rpc://<host>:<port>/<object>`. Controllers write it to a file
//! under their cluster directory; that file may be missing or empty while the
//! controller is still booting, so [`DescriptorSource::load`] is called again
//! on every connection attempt instead of once up front.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use ctrlink_protocol::DESCRIPTOR_EXTENSION;
use url::Url;

use crate::error::{Error, Result};

/// URL scheme every descriptor uses.
pub const DESCRIPTOR_SCHEME: &str = "rpc";

/// A syntactically valid capability address.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Descriptor {
	raw: String,
	authority: String,
	object: String,
}

impl Descriptor {
	/// Parses a descriptor string.
	///
	/// # Errors
	///
	/// Returns [`Error::InvalidDescriptor`] unless the string has the `rpc`
	/// scheme, a host, an explicit port and a non-empty object path.
	pub fn parse(value: &str) -> Result<Self> {
		let invalid = || Error::InvalidDescriptor(value.to_string());
		let url = Url::parse(value.trim()).map_err(|_| invalid())?;
		if url.scheme() != DESCRIPTOR_SCHEME {
			return Err(invalid());
		}
		let host = url.host_str().filter(|h| !h.is_empty()).ok_or_else(invalid)?;
		let port = url.port().ok_or_else(invalid)?;
		let object = url.path().trim_matches('/');
		if object.is_empty() {
			return Err(invalid());
		}

		Ok(Self {
			raw: value.trim().to_string(),
			authority: format!("{host}:{port}"),
			object: object.to_string(),
		})
	}

	/// The descriptor exactly as published.
	pub fn as_str(&self) -> &str {
		&self.raw
	}

	/// `host:port` of the controller.
	pub fn authority(&self) -> &str {
		&self.authority
	}

	/// Name of the remote object behind this descriptor.
	pub fn object(&self) -> &str {
		&self.object
	}
}

impl FromStr for Descriptor {
	type Err = Error;

	fn from_str(s: &str) -> Result<Self> {
		Self::parse(s)
	}
}

impl fmt::Display for Descriptor {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.raw)
	}
}

/// Returns `true` if `value` is a well-formed inline descriptor.
pub fn is_valid_descriptor(value: &str) -> bool {
	Descriptor::parse(value).is_ok()
}

/// Returns `true` if `path` names a descriptor file in an existing directory.
///
/// Only the name and the parent directory are checked: the file itself may
/// not have been written yet.
pub fn is_valid_descriptor_file(path: &Path) -> bool {
	let has_extension = path.extension().and_then(|e| e.to_str()) == Some(DESCRIPTOR_EXTENSION);
	let parent_exists = match path.parent() {
		Some(parent) if parent.as_os_str().is_empty() => true,
		Some(parent) => parent.is_dir(),
		None => false,
	};
	has_extension && parent_exists
}

/// Where a descriptor comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DescriptorSource {
	/// Descriptor given directly by the caller.
	Inline(Descriptor),
	/// Descriptor file, re-read on every [`load`](Self::load).
	File(PathBuf),
}

impl DescriptorSource {
	/// Interprets `value` as an inline descriptor or a descriptor file path.
	pub fn parse(value: &str) -> Option<Self> {
		if let Ok(descriptor) = Descriptor::parse(value) {
			return Some(Self::Inline(descriptor));
		}
		let path = Path::new(value);
		is_valid_descriptor_file(path).then(|| Self::File(path.to_path_buf()))
	}

	/// Like [`parse`](Self::parse) but fails with [`Error::InvalidDescriptor`].
	pub fn validate(value: &str) -> Result<Self> {
		Self::parse(value).ok_or_else(|| Error::InvalidDescriptor(value.to_string()))
	}

	/// Validates a descriptor file path.
	pub fn file(path: impl Into<PathBuf>) -> Result<Self> {
		let path = path.into();
		if is_valid_descriptor_file(&path) {
			Ok(Self::File(path))
		} else {
			Err(Error::InvalidDescriptor(path.display().to_string()))
		}
	}

	/// Produces the current descriptor.
	///
	/// # Errors
	///
	/// Returns [`Error::DescriptorNotReady`] if the file is missing or empty and
	/// [`Error::InvalidDescriptor`] if its first line is not a descriptor. Both
	/// are expected while the controller is still starting.
	pub fn load(&self) -> Result<Descriptor> {
		match self {
			Self::Inline(descriptor) => Ok(descriptor.clone()),
			Self::File(path) => {
				let content = match fs::read_to_string(path) {
					Ok(content) => content,
					Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
						return Err(Error::DescriptorNotReady(path.clone()));
					}
					Err(err) => return Err(Error::Io(err)),
				};
				let line = content.lines().map(str::trim).find(|l| !l.is_empty());
				match line {
					Some(line) => Descriptor::parse(line),
					None => Err(Error::DescriptorNotReady(path.clone())),
				}
			}
		}
	}

	/// Human-readable identity used in logs and errors.
	pub fn label(&self) -> String {
		match self {
			Self::Inline(descriptor) => descriptor.to_string(),
			Self::File(path) => path.display().to_string(),
		}
	}

	pub fn is_file(&self) -> bool {
		matches!(self, Self::File(_))
	}
}

impl fmt::Display for DescriptorSource {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.label())
	}
}

#[cfg(test)]
mod tests {
	use tempfile::tempdir;

	use super::*;

	#[test]
	fn parses_host_port_and_object() {
		let d = Descriptor::parse("rpc://10.0.0.5:10105/tc").unwrap();
		assert_eq!(d.authority(), "10.0.0.5:10105");
		assert_eq!(d.object(), "tc");
		assert_eq!(d.as_str(), "rpc://10.0.0.5:10105/tc");
	}

	#[test]
	fn rejects_malformed_descriptors() {
		for bad in ["", "tc", "http://h:1/tc", "rpc://h/tc", "rpc://h:1", "rpc://h:1/", "/tmp/x.descriptor"] {
			assert!(!is_valid_descriptor(bad), "{bad:?} should be rejected");
		}
	}

	#[test]
	fn descriptor_file_needs_extension_and_existing_parent() {
		let dir = tempdir().unwrap();
		assert!(is_valid_descriptor_file(&dir.path().join("controller-task.descriptor")));
		assert!(!is_valid_descriptor_file(&dir.path().join("controller-task.txt")));
		assert!(!is_valid_descriptor_file(&dir.path().join("missing").join("controller-task.descriptor")));
	}

	#[test]
	fn file_source_is_reread_on_each_load() {
		let dir = tempdir().unwrap();
		let path = dir.path().join("controller-task.descriptor");
		let source = DescriptorSource::file(&path).unwrap();

		assert!(matches!(source.load(), Err(Error::DescriptorNotReady(_))));

		fs::write(&path, "").unwrap();
		assert!(matches!(source.load(), Err(Error::DescriptorNotReady(_))));

		fs::write(&path, "rpc://127.0.0.1:4000/tc\n").unwrap();
		assert_eq!(source.load().unwrap().object(), "tc");
	}

	#[test]
	fn parse_prefers_inline_descriptor() {
		let source = DescriptorSource::parse("rpc://127.0.0.1:4000/mec").unwrap();
		assert!(!source.is_file());
		assert_eq!(source.label(), "rpc://127.0.0.1:4000/mec");
	}
}
