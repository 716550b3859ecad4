use std::sync::Arc;

use ctrlink::{AsyncClientConnector, ConnectorConfig, ControllerRole, ResolvedBy, RpcSession};
use serde::Serialize;
use tracing::info;

use crate::cli::ConnectArgs;
use crate::error::{CliError, Result};
use crate::output::{self, OutputFormat, ResultBuilder};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectData {
	pub role: ControllerRole,
	pub source: String,
	pub resolved_by: ResolvedBy,
	/// Registered type name of the adapted client.
	pub client: String,
	pub max_attempts: u32,
}

pub async fn execute(args: &ConnectArgs, config: ConnectorConfig, format: OutputFormat) -> Result<()> {
	let builder = ResultBuilder::new("connect");
	let connector = AsyncClientConnector::with_session(Arc::new(RpcSession::new()), config);
	let data = connect(args, &connector).await?;
	output::print_result(&builder.data(data).build(), format);
	Ok(())
}

pub async fn connect(args: &ConnectArgs, connector: &AsyncClientConnector) -> Result<ConnectData> {
	let role = ControllerRole::from(args.selector.role);
	let policy = args.retry_policy(connector.config().retry_policy());
	if policy.max_attempts == 0 {
		return Err(CliError::InvalidInput("--max-attempts must be at least 1".to_string()));
	}
	let request = args.selector.to_request().retry(policy);

	let (source, resolved_by) = connector.resolve(role, &request)?;
	info!(
		target = "ctrlink.cli",
		role = %role,
		source = %source,
		max_attempts = policy.max_attempts,
		"connecting"
	);
	let client = connector.get_client(role, &request).await?;

	Ok(ConnectData {
		role,
		source: source.label(),
		resolved_by,
		client: client.type_name().to_string(),
		max_attempts: policy.max_attempts,
	})
}

#[cfg(test)]
mod tests {
	use clap::Parser;
	use tempfile::TempDir;

	use super::*;
	use crate::cli::{Cli, Commands};
	use crate::output::ErrorCode;

	fn args(argv: &[&str]) -> ConnectArgs {
		let mut full = vec!["ctrlink", "connect"];
		full.extend_from_slice(argv);
		match Cli::try_parse_from(full).unwrap().command {
			Commands::Connect(args) => args,
			_ => unreachable!(),
		}
	}

	fn connector(root: &TempDir) -> AsyncClientConnector {
		let config = ConnectorConfig {
			registry_root: root.path().to_path_buf(),
			..ConnectorConfig::default()
		};
		AsyncClientConnector::with_session(Arc::new(RpcSession::new()), config)
	}

	#[tokio::test]
	async fn zero_attempts_is_invalid_input() {
		let root = TempDir::new().unwrap();
		let err = connect(&args(&["--max-attempts", "0"]), &connector(&root))
			.await
			.unwrap_err();
		assert_eq!(err.to_command_error().code, ErrorCode::InvalidInput);
	}

	#[tokio::test]
	async fn empty_descriptor_file_exhausts_budget() {
		let root = TempDir::new().unwrap();
		let file = root.path().join("controller-task.descriptor");
		std::fs::write(&file, "").unwrap();

		let err = connect(
			&args(&[
				"--descriptor",
				file.to_str().unwrap(),
				"--delay-ms",
				"1",
				"--max-attempts",
				"2",
			]),
			&connector(&root),
		)
		.await
		.unwrap_err();

		let command_error = err.to_command_error();
		assert_eq!(command_error.code, ErrorCode::ClientConnector);
		let details = command_error.details.unwrap();
		assert_eq!(details["attempts"], 2);
		assert_eq!(details["source"], file.display().to_string());
	}
}
