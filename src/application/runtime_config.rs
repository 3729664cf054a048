use std::path::PathBuf;

use crate::cli::Cli;

#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub root: PathBuf,
    pub script: PathBuf,
    pub snapshot_in: Option<PathBuf>,
    pub snapshot_out: Option<PathBuf>,
    pub print_import_map: bool,
}

impl From<Cli> for RuntimeConfig {
    fn from(cli: Cli) -> Self {
        Self {
            root: cli.root,
            script: cli.script,
            snapshot_in: cli.snapshot_in,
            snapshot_out: cli.snapshot_out,
            print_import_map: cli.print_import_map,
        }
    }
}
