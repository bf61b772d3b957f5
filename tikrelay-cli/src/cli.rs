use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "tikrelay",
    version,
    about = "Watch a TikTok live stream through a WebSocket relay",
    long_about = "tikrelay connects to a TikTok live relay and prints chat, gift streaks, \
                  like milestones and viewer counts as they happen."
)]
pub struct Args {
    /// Configuration file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose (debug) logging
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Only log warnings and errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub log_json: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Connect to a stream and print its events until Ctrl-C
    Watch(WatchArgs),

    /// Show configuration
    Config {
        /// Print the effective configuration (API key masked)
        #[arg(long)]
        show: bool,

        /// Print the configuration file location
        #[arg(long)]
        path: bool,
    },
}

#[derive(clap::Args, Debug, Default)]
pub struct WatchArgs {
    /// TikTok username of the streamer to watch
    #[arg(short, long, env = "TIKRELAY_USERNAME")]
    pub username: Option<String>,

    /// Relay API key
    #[arg(short = 'k', long, env = "TIKRELAY_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Relay base URL (the username is appended as the last path segment)
    #[arg(long)]
    pub base_url: Option<String>,

    /// Emit a like milestone every N cumulative likes
    #[arg(long)]
    pub threshold: Option<u64>,

    /// Number of gift streaks kept in history
    #[arg(long)]
    pub max_log_items: Option<usize>,

    /// Consumer tick interval in milliseconds
    #[arg(long)]
    pub tick_ms: Option<u64>,

    /// Number of top viewers printed with each viewer count update
    #[arg(long)]
    pub top_viewers: Option<usize>,

    /// Log every relay payload at debug level
    #[arg(long)]
    pub verbose_messages: bool,
}
