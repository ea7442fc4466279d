//! Command-line arguments

use clap::{Args, Parser, Subcommand};
use herdscan_telemetry::DEFAULT_LIST_LIMIT;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "herdscan")]
#[command(about = "Two-stage livestock image screening", long_about = None, version)]
pub struct Cli {
    /// Settings file (defaults to ./herdscan.yaml when present)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Model registry YAML
    #[arg(short, long, global = true)]
    pub models: Option<PathBuf>,

    /// Scan record file (JSON lines)
    #[arg(long, global = true)]
    pub store: Option<PathBuf>,

    /// Local gate model weights, overriding the registry source
    #[arg(long, env = "HERDSCAN_GATE_MODEL", global = true)]
    pub gate_model: Option<PathBuf>,

    /// Local diagnostic model weights, overriding the registry source
    #[arg(long, env = "HERDSCAN_DIAGNOSTIC_MODEL", global = true)]
    pub diagnostic_model: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    pub json_logs: bool,

    /// Print a Prometheus metrics snapshot to stderr on exit
    #[arg(long, global = true)]
    pub metrics: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Screen one image through the gate and diagnostic models
    Scan(ScanArgs),

    /// Load both models and report whether they are usable
    CheckModels,

    /// List stored scan records, newest first
    Records {
        /// Only records requested by this principal
        #[arg(long)]
        requester: Option<String>,

        /// Maximum records to print
        #[arg(long, default_value_t = DEFAULT_LIST_LIMIT)]
        limit: usize,
    },

    /// Verify the hash chain of the scan record file
    VerifyRecords,
}

#[derive(Args, Debug)]
pub struct ScanArgs {
    /// Image file (JPEG, PNG, BMP, or WebP)
    pub image: PathBuf,

    /// Gate threshold in [0, 1]; the configured default applies when omitted
    #[arg(short, long)]
    pub threshold: Option<f32>,

    /// Principal requesting the scan
    #[arg(long)]
    pub requester: Option<String>,

    /// Animal the image belongs to; required for a record to be written
    #[arg(long)]
    pub subject: Option<String>,

    /// Reference to where the image is stored
    #[arg(long)]
    pub image_ref: Option<String>,
}
