use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub service: ServiceArgs,

    #[command(subcommand)]
    pub command: Commands,
}

/// Where the definitions come from and what they are checked against.
#[derive(Args)]
pub struct ServiceArgs {
    /// JSON configuration file; flags below override its values
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Installation home the definition path is relative to
    #[arg(long, global = true)]
    pub home: Option<PathBuf>,

    /// Alias definition file
    #[arg(long, global = true)]
    pub definitions: Option<PathBuf>,

    /// Historic type name table (old=new lines)
    #[arg(long, global = true)]
    pub upgrade: Option<PathBuf>,

    /// Type identifiers the running code provides, one per line
    /// (every aliased type is trusted if omitted)
    #[arg(long, global = true)]
    pub types: Option<PathBuf>,

    /// Do not compare the definition checksum
    #[arg(long, global = true)]
    pub skip_checksum: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Print the checksum of a definition file
    Checksum {
        /// File to checksum (defaults to the configured definitions)
        file: Option<PathBuf>,
    },

    /// Print the initialization report as JSON
    Report,

    /// List aliased types the catalog cannot decode; fails if any
    Audit,

    /// Resolve an alias to its type identifier and back
    Resolve {
        /// Alias or type identifier
        name: String,
    },

    /// Load a test plan and write it back in the current format
    Resave {
        /// Test plan to read
        input: PathBuf,

        /// Destination (stdout if omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Load a result log and write every record back as fragments
    ResaveRecords {
        /// Result log to read
        input: PathBuf,

        /// Destination (stdout if omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Wrap the records in a result log root element
        #[arg(long)]
        wrap: bool,
    },
}
