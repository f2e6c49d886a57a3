use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "logsieve", about = "Filter a repository's commit history")]
pub struct Cli {
    /// Paths to the git repository roots
    #[arg(default_value = ".")]
    pub roots: Vec<PathBuf>,

    /// Show only commits reachable from these branches
    #[arg(long)]
    pub branch: Vec<String>,

    /// Show only commits by these authors (substring match)
    #[arg(long)]
    pub author: Vec<String>,

    /// Commit message text to search for
    #[arg(long)]
    pub text: Option<String>,

    /// Only commits after this date (YYYY-MM-DD)
    #[arg(long)]
    pub after: Option<String>,

    /// Only commits before this date (YYYY-MM-DD)
    #[arg(long)]
    pub before: Option<String>,

    /// Full or partial commit hashes, shown regardless of other filters
    #[arg(long = "hash")]
    pub hashes: Vec<String>,

    /// Maximum number of rows to print
    #[arg(long, default_value_t = 50)]
    pub max_rows: usize,
}
