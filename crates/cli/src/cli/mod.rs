
use std::path::PathBuf;
use std::time::Duration;

use clap::builder::Styles;
use clap::builder::styling::AnsiColor;
use clap::{Args, Parser, Subcommand, ValueEnum};
use ctrlink::{ClientRequest, ControllerRole, RetryPolicy};

use crate::output::OutputFormat;

/// Root CLI for ctrlink.
#[derive(Parser, Debug)]
#[command(name = "ctrlink")]
#[command(about = "Find, connect to and run controller clusters")]
#[command(version)]
#[command(styles = help_styles())]
pub struct Cli {
	/// Increase verbosity (-v info, -vv debug)
	#[arg(short, long, global = true, action = clap::ArgAction::Count)]
	pub verbose: u8,

	/// Output format: json (default), ndjson, or text
	#[arg(short = 'f', long, global = true, value_enum, default_value = "json")]
	pub format: OutputFormat,

	#[command(subcommand)]
	pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
	/// Show which descriptor a client would connect to, without connecting.
	Resolve(ResolveArgs),
	/// Connect to a controller and report the adapted client type.
	Connect(ConnectArgs),
	/// Manage a local cluster.
	Cluster(ClusterArgs),
}

impl Commands {
	/// Name used in the output envelope.
	pub fn name(&self) -> &'static str {
		match self {
			Commands::Resolve(_) => "resolve",
			Commands::Connect(_) => "connect",
			Commands::Cluster(ClusterArgs {
				action: ClusterAction::Run(_),
			}) => "cluster.run",
		}
	}
}

/// Controller role selected on the command line.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum RoleArg {
	/// Task controller
	Task,
	/// Multi-engine controller
	#[value(alias = "mec")]
	Multiengine,
}

impl From<RoleArg> for ControllerRole {
	fn from(role: RoleArg) -> Self {
		match role {
			RoleArg::Task => ControllerRole::Task,
			RoleArg::Multiengine => ControllerRole::MultiEngine,
		}
	}
}

/// How to locate the controller's descriptor.
#[derive(Args, Debug, Clone)]
pub struct SelectorArgs {
	/// Controller role
	#[arg(long, value_enum, default_value = "task")]
	pub role: RoleArg,

	/// Inline descriptor (rpc://host:port/object) or descriptor file path
	#[arg(long, value_name = "DESCRIPTOR")]
	pub descriptor: Option<String>,

	/// Cluster directory holding the descriptor file
	#[arg(long, value_name = "DIR")]
	pub cluster_dir: Option<PathBuf>,

	/// Cluster profile name
	#[arg(long, value_name = "NAME", default_value = "default")]
	pub profile: String,
}

impl SelectorArgs {
	pub fn to_request(&self) -> ClientRequest {
		let mut request = ClientRequest::default().profile(self.profile.clone());
		if let Some(descriptor) = &self.descriptor {
			request = request.descriptor(descriptor.clone());
		}
		if let Some(dir) = &self.cluster_dir {
			request = request.cluster_dir(dir.clone());
		}
		request
	}
}

#[derive(Args, Debug, Clone)]
pub struct ResolveArgs {
	#[command(flatten)]
	pub selector: SelectorArgs,
}

#[derive(Args, Debug, Clone)]
pub struct ConnectArgs {
	#[command(flatten)]
	pub selector: SelectorArgs,

	/// Delay before the second attempt, in milliseconds
	#[arg(long, value_name = "MS")]
	pub delay_ms: Option<u64>,

	/// Maximum number of connection attempts
	#[arg(long, value_name = "N")]
	pub max_attempts: Option<u32>,
}

impl ConnectArgs {
	/// Retry policy with command-line overrides applied over `base`.
	pub fn retry_policy(&self, base: RetryPolicy) -> RetryPolicy {
		RetryPolicy::new(
			self.delay_ms.map(Duration::from_millis).unwrap_or(base.initial_delay),
			self.max_attempts.unwrap_or(base.max_attempts),
		)
	}
}

#[derive(Args, Debug, Clone)]
pub struct ClusterArgs {
	#[command(subcommand)]
	pub action: ClusterAction,
}

#[derive(Subcommand, Debug, Clone)]
pub enum ClusterAction {
	/// Start a cluster and keep it running until Ctrl-C.
	Run(ClusterRunArgs),
}

#[derive(Args, Debug, Clone)]
pub struct ClusterRunArgs {
	/// Number of workers (defaults to CTRLINK_WORKERS or 2)
	#[arg(short = 'n', long, value_name = "N")]
	pub workers: Option<usize>,

	/// Cluster profile name
	#[arg(long, value_name = "NAME", default_value = "default", conflicts_with = "cluster_dir")]
	pub profile: String,

	/// Explicit cluster directory
	#[arg(long, value_name = "DIR")]
	pub cluster_dir: Option<PathBuf>,

	/// Create the profile's cluster directory if it does not exist
	#[arg(long)]
	pub auto_create: bool,
}

/// Cargo-like help colors.
fn help_styles() -> Styles {
	Styles::styled()
		.header(AnsiColor::Green.on_default().bold())
		.usage(AnsiColor::Green.on_default().bold())
		.literal(AnsiColor::Cyan.on_default())
		.placeholder(AnsiColor::Cyan.on_default())
		.valid(AnsiColor::Cyan.on_default())
}
