//! CLI argument parsing.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "clamcmd", about = "Scan buffers and files with ClamAV through ns_clamav")]
pub struct Cli {
    /// TOML configuration file; all defaults when omitted
    #[arg(long, short, env = "CLAMCMD_CONFIG")]
    pub config: Option<PathBuf>,

    /// Server whose module section is read
    #[arg(long, env = "CLAMCMD_SERVER", default_value = "main")]
    pub server: String,

    /// Module instance name
    #[arg(long, env = "CLAMCMD_MODULE", default_value = "nsclamav")]
    pub module: String,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Scan a string, print the virus name if one is found
    Scanbuff {
        /// Content to scan
        data: String,
    },
    /// Scan a file, print the virus name if one is found
    Scanfile {
        /// File to scan
        path: PathBuf,
    },
    /// Evaluate a script with `ns_clamav` available
    Eval {
        /// Script text, e.g. `ns_clamav scanfile /tmp/x`
        script: String,
    },
    /// Read scripts from stdin and print each result
    Repl,
    /// Check that the engine answers
    Ping,
}
