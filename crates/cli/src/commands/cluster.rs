use std::path::PathBuf;

use anyhow::Context;
use ctrlink::{AsyncCluster, ClusterOptions, ClusterState, ConnectorConfig};
use serde::Serialize;
use tracing::info;

use crate::cli::ClusterRunArgs;
use crate::error::{CliError, Result};
use crate::output::{self, OutputFormat, ResultBuilder};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterRunData {
	pub profile: String,
	pub location: PathBuf,
	pub workers: usize,
	pub state: ClusterState,
}

pub fn options(args: &ClusterRunArgs, config: ConnectorConfig) -> ClusterOptions {
	let options = ClusterOptions::with_config(config)
		.profile(args.profile.clone())
		.auto_create(args.auto_create);
	match &args.cluster_dir {
		Some(dir) => options.cluster_dir(dir.clone()),
		None => options,
	}
}

pub fn worker_count(args: &ClusterRunArgs, config: &ConnectorConfig) -> Result<usize> {
	match args.workers.unwrap_or(config.workers) {
		0 => Err(CliError::InvalidInput("worker count must be at least 1".to_string())),
		n => Ok(n),
	}
}

/// Starts the cluster, waits for Ctrl-C, then stops it.
pub async fn run(args: &ClusterRunArgs, config: ConnectorConfig, format: OutputFormat) -> Result<()> {
	let builder = ResultBuilder::new("cluster.run");
	let workers = worker_count(args, &config)?;
	let mut cluster = AsyncCluster::new(options(args, config))?;

	cluster.start(workers).await?;
	info!(
		target = "ctrlink.cli",
		profile = cluster.profile(),
		location = %cluster.location().display(),
		workers,
		"cluster running, press Ctrl-C to stop"
	);

	// A broken signal listener still stops the cluster before reporting.
	let signal = tokio::signal::ctrl_c()
		.await
		.context("failed to listen for Ctrl-C");
	cluster.stop().await?;
	signal?;

	let data = ClusterRunData {
		profile: cluster.profile().to_string(),
		location: cluster.location().to_path_buf(),
		workers,
		state: cluster.state(),
	};
	output::print_result(&builder.data(data).build(), format);
	Ok(())
}
