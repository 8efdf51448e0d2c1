use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "threadfs")]
#[command(about = "Drive blocking filesystem calls through the threadfs bridge")]
#[command(version)]
/// Command-line arguments.
pub struct Cli {
	/// TOML configuration file
	#[arg(short, long, value_name = "PATH", global = true)]
	pub config: Option<PathBuf>,

	/// Verbose logging
	#[arg(short, long, global = true)]
	pub verbose: bool,

	/// Subcommand to execute.
	#[command(subcommand)]
	pub command: Command,
}

/// Available subcommands.
#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Command {
	/// Write, read back and stat files in the storage area from two threads
	Demo,
	/// Hammer the bridge from many threads at once
	Stress {
		/// Number of calling threads
		#[arg(long, default_value_t = 8)]
		threads: usize,

		/// Calls per thread
		#[arg(long, default_value_t = 1000)]
		calls: usize,
	},
	/// Copy a host directory into the storage area and list what landed
	Load {
		/// Package directory on the host filesystem
		#[arg(value_name = "DIR")]
		dir: PathBuf,
	},
}
