use std::path::PathBuf;

use ctrlink::{ConnectorConfig, ControllerRole, DescriptorSource, ResolveRequest, ResolvedBy};
use serde::Serialize;

use crate::cli::ResolveArgs;
use crate::error::Result;
use crate::output::{self, OutputFormat, ResultBuilder};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolveData {
	pub role: ControllerRole,
	/// Inline descriptor or descriptor file path.
	pub source: String,
	pub is_file: bool,
	pub resolved_by: ResolvedBy,
	pub registry_root: PathBuf,
}

pub fn execute(args: &ResolveArgs, config: ConnectorConfig, format: OutputFormat) -> Result<()> {
	let builder = ResultBuilder::new("resolve");
	let data = resolve(args, &config)?;
	output::print_result(&builder.data(data).build(), format);
	Ok(())
}

pub fn resolve(args: &ResolveArgs, config: &ConnectorConfig) -> Result<ResolveData> {
	let role = ControllerRole::from(args.selector.role);
	let request = args.selector.to_request();

	let (source, resolved_by): (DescriptorSource, ResolvedBy) = ctrlink::resolve(&ResolveRequest {
		descriptor: request.descriptor.as_deref(),
		cluster_dir: request.cluster_dir.as_deref(),
		descriptor_file_name: Some(role.descriptor_file_name()),
		registry_root: &config.registry_root,
		profile: &request.profile,
	})?;

	Ok(ResolveData {
		role,
		source: source.label(),
		is_file: source.is_file(),
		resolved_by,
		registry_root: config.registry_root.clone(),
	})
}

#[cfg(test)]
mod tests {
	use clap::Parser;
	use tempfile::TempDir;

	use super::*;
	use crate::cli::{Cli, Commands};

	fn args(argv: &[&str]) -> ResolveArgs {
		let mut full = vec!["ctrlink", "resolve"];
		full.extend_from_slice(argv);
		match Cli::try_parse_from(full).unwrap().command {
			Commands::Resolve(args) => args,
			_ => unreachable!(),
		}
	}

	fn config(root: &TempDir) -> ConnectorConfig {
		ConnectorConfig {
			registry_root: root.path().to_path_buf(),
			..ConnectorConfig::default()
		}
	}

	#[test]
	fn inline_descriptor_is_explicit() {
		let root = TempDir::new().unwrap();
		let data = resolve(&args(&["--descriptor", "rpc://127.0.0.1:4100/tc"]), &config(&root)).unwrap();

		assert_eq!(data.source, "rpc://127.0.0.1:4100/tc");
		assert!(!data.is_file);
		assert_eq!(data.resolved_by, ResolvedBy::Explicit);
	}

	#[test]
	fn cluster_dir_yields_role_file_in_security() {
		let root = TempDir::new().unwrap();
		let cluster = TempDir::new().unwrap();
		std::fs::create_dir_all(cluster.path().join("security")).unwrap();

		let data = resolve(
			&args(&[
				"--role",
				"multiengine",
				"--cluster-dir",
				cluster.path().to_str().unwrap(),
			]),
			&config(&root),
		)
		.unwrap();

		let expected = cluster.path().join("security").join("controller-mec.descriptor");
		assert_eq!(data.source, expected.display().to_string());
		assert!(data.is_file);
		assert_eq!(data.resolved_by, ResolvedBy::ClusterDir);
		assert_eq!(data.role, ControllerRole::MultiEngine);
	}

	#[test]
	fn unknown_profile_is_not_found() {
		let root = TempDir::new().unwrap();
		let profile = format!("cli-missing-{}", std::process::id());
		let err = resolve(&args(&["--profile", &profile]), &config(&root)).unwrap_err();
		assert_eq!(
			err.to_command_error().code,
			crate::output::ErrorCode::DescriptorNotFound
		);
	}
}
