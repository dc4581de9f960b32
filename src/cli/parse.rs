//! CLI parse: clap types for movetree. No behavior; definitions only.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// movetree CLI - one replica of a replicated filesystem tree
#[derive(Parser)]
#[command(name = "movetree")]
#[command(about = "Replicated filesystem tree with conflict-free concurrent moves")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Workspace root directory
    #[arg(long, default_value = ".")]
    pub workspace: PathBuf,

    /// Configuration file path (overrides default config loading)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(long, default_value = "false")]
    pub verbose: bool,

    /// Log level (trace, debug, info, warn, error, off)
    #[arg(long)]
    pub log_level: Option<String>,

    /// Log format (json, text)
    #[arg(long)]
    pub log_format: Option<String>,

    /// Log output (stdout, stderr, file)
    #[arg(long)]
    pub log_output: Option<String>,

    /// Log file path (if output is "file")
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create a directory
    Mkdir {
        /// Slash-separated path from the root
        path: String,
    },
    /// Create a file entry
    Touch {
        path: String,
        /// Opaque reference to the file contents
        #[arg(long, default_value = "0")]
        file_ref: u64,
    },
    /// Create a symlink
    Ln { path: String, target: String },
    /// Move or rename
    Mv { from: String, to: String },
    /// Delete (move to trash)
    Rm { path: String },
    /// List a subtree
    Ls {
        #[arg(default_value = "")]
        path: String,
        /// List the trash instead of the root
        #[arg(long)]
        trash: bool,
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Show the operation log
    Log {
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Print pending messages for a peer as JSON lines
    Export {
        #[arg(long)]
        peer: u64,
        /// Max ops to print (defaults to replica.push_batch_limit)
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Apply JSON-lines messages from a file ("-" for stdin)
    Import { input: PathBuf },
    /// Acknowledge the oldest pending ops for a peer
    Ack {
        #[arg(long)]
        peer: u64,
        #[arg(long, default_value = "1")]
        count: usize,
    },
    /// Queue a full resync for a peer
    Bootstrap {
        #[arg(long)]
        peer: u64,
    },
    /// Show replica status
    Status {
        #[arg(long, default_value = "text")]
        format: String,
    },
}
