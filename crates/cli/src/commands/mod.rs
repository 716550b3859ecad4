//! Command handlers. Each one builds its own result envelope and prints it;
//! errors bubble up to `main`, which prints the failure envelope.

pub mod cluster;
pub mod connect;
pub mod resolve;

use ctrlink::ConnectorConfig;
use tracing::debug;

use crate::cli::{Cli, ClusterAction, ClusterArgs, Commands};
use crate::error::Result;
use crate::output::OutputFormat;

pub async fn dispatch(cli: Cli, format: OutputFormat) -> Result<()> {
	let config = ConnectorConfig::from_env();
	debug!(target = "ctrlink.cli", command = cli.command.name(), ?config, "dispatch");

	match cli.command {
		Commands::Resolve(args) => resolve::execute(&args, config, format),
		Commands::Connect(args) => connect::execute(&args, config, format).await,
		Commands::Cluster(ClusterArgs {
			action: ClusterAction::Run(args),
		}) => cluster::run(&args, config, format).await,
	}
}
