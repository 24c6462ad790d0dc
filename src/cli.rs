use std::path::PathBuf;

use clap::Parser;

#[derive(Debug, Parser)]
#[command(name = "rolekeeper", about = "Discord community bot with leaderboard role sync")]
pub struct Cli {
    /// Path to the JSON config file.
    #[arg(long, default_value = "rolekeeper.json")]
    pub config: PathBuf,

    /// Command prefix. Overrides the value from the config file.
    #[arg(long)]
    pub prefix: Option<String>,
}
