//! Controller roles and the descriptor files they publish.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Extension every descriptor file carries.
pub const DESCRIPTOR_EXTENSION: &str = "descriptor";

/// Role a controller plays, which fixes the name of its descriptor file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ControllerRole {
	/// Task-oriented controller (load-balanced task queue).
	Task,
	/// Multi-engine controller (direct engine access).
	#[serde(rename = "multiengine")]
	MultiEngine,
}

impl ControllerRole {
	/// File name of the descriptor published under `<cluster-dir>/security`.
	pub fn descriptor_file_name(self) -> &'static str {
		match self {
			ControllerRole::Task => "controller-task.descriptor",
			ControllerRole::MultiEngine => "controller-mec.descriptor",
		}
	}

	pub fn as_str(self) -> &'static str {
		match self {
			ControllerRole::Task => "task",
			ControllerRole::MultiEngine => "multiengine",
		}
	}
}

impl fmt::Display for ControllerRole {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for ControllerRole {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.to_ascii_lowercase().as_str() {
			"task" | "tc" => Ok(ControllerRole::Task),
			"multiengine" | "mec" => Ok(ControllerRole::MultiEngine),
			other => Err(format!("unknown controller role '{other}' (expected 'task' or 'multiengine')")),
		}
	}
}
