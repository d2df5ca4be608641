use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// JSON config file path
    #[arg(short, long, default_value = "config.json")]
    pub config: PathBuf,

    /// Output directory for downloaded videos (overrides the config file)
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    /// Stall timeout in seconds (overrides the config file)
    #[arg(short, long)]
    pub timeout: Option<u64>,

    /// Do not draw per-file progress bars
    #[arg(long)]
    pub no_progress: bool,
}
