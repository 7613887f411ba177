use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing::Level;

/// Inspect, create and unpack Nix archives (NAR).
///
/// Wherever a NAR is read, `-` stands for stdin.
#[derive(Parser, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// A global log level to use when printing logs.
    /// It's also possible to set `RUST_LOG` according to
    /// `tracing_subscriber::filter::EnvFilter`, which will always have
    /// priority.
    #[arg(long, env = "NAR_LOG_LEVEL", default_value_t=Level::INFO)]
    pub log_level: Level,

    /// Don't draw progress bars on stderr.
    #[clap(long, env = "NAR_NO_PROGRESS")]
    pub no_progress: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Clone)]
pub enum Command {
    /// Print the contents of a regular file inside a NAR to stdout.
    Cat {
        nar: PathBuf,

        /// Path of the file inside the archive.
        path: String,
    },

    /// List the node at a path inside a NAR, and the entries of it if it's
    /// a directory.
    Ls {
        nar: PathBuf,

        /// Path inside the archive, defaults to the root.
        #[clap(default_value = "")]
        path: String,

        /// List subdirectories recursively.
        #[clap(long, short = 'R')]
        recursive: bool,

        /// Show type, permissions and size, like `ls -l`.
        #[clap(long, short = 'l')]
        long: bool,
    },

    /// Serialize a path on the local filesystem into a NAR.
    DumpPath {
        path: PathBuf,

        /// Write the NAR to this file instead of stdout.
        #[clap(long, short = 'o')]
        output: Option<PathBuf>,
    },

    /// Unpack a NAR into a path, which must not exist yet.
    Restore { nar: PathBuf, dest: PathBuf },

    /// Validate a NAR, and print its NAR hash and NAR size.
    Hash { nar: PathBuf },
}
