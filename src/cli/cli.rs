use std::path::PathBuf;

use clap::Parser;

use crate::application::data::LogLevel;

/// Replays a scripted editing session on two store replicas and builds the
/// preview from the replica.
#[derive(Parser, Debug, Clone)]
#[command(version)]
pub struct Cli {
    /// YAML file with the `commands` to replay
    pub script: PathBuf,
    #[clap(long, short, default_value = "warn", value_enum)]
    pub log_level: LogLevel,

    /// The project directory holding `preview.yaml`
    #[clap(long, short, default_value = ".")]
    pub root: PathBuf,

    /// Start both replicas from this snapshot instead of an empty store
    #[clap(long)]
    pub snapshot_in: Option<PathBuf>,

    /// Write the final store snapshot here
    #[clap(long)]
    pub snapshot_out: Option<PathBuf>,

    /// Print the import map document of the last build
    #[clap(long)]
    pub print_import_map: bool,
}
