use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

/// The pipeline stage a `reprocess` invocation targets.
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum StageArg {
    P1,
    P2,
    P3,
    P4,
}

#[derive(Parser)]
#[command(name = "oracle", about = "Drive and manage the OmicsOracle literature acquisition pipeline", term_width = 100)]
pub struct Cli {
    /// Overrides STORE_ROOT for this invocation.
    #[arg(long, global = true)]
    pub store_root: Option<PathBuf>,

    /// Emit machine-readable JSON instead of a human-readable summary.
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run P1-P4 for one GEO series from scratch.
    Run(RunArgs),
    /// Resume a GEO series: process only rows missing their next stage.
    Resume(ResumeArgs),
    /// Recompute artifact checksums (and scores, if GEO context is supplied).
    Validate(ValidateArgs),
    /// Re-run a single stage for an already-discovered GEO series.
    Reprocess(ReprocessArgs),
    /// Inspect or maintain the P1 discovery cache and the P4 parsed-content cache.
    Cache {
        #[command(subcommand)]
        cmd: CacheCommand,
    },
}

#[derive(Args)]
pub struct RunArgs {
    /// GEO series accession, e.g. GSE12345.
    #[arg(long)]
    pub geo: String,

    /// Seed PubMed IDs named in the GEO record, comma-separated.
    #[arg(long, value_delimiter = ',', required = true)]
    pub pmids: Vec<String>,

    #[arg(long, default_value = "")]
    pub title: String,

    #[arg(long, default_value = "")]
    pub summary: String,

    #[arg(long, value_delimiter = ',')]
    pub keywords: Vec<String>,
}

#[derive(Args)]
pub struct ResumeArgs {
    #[arg(long)]
    pub geo: String,
}

#[derive(Args)]
pub struct ValidateArgs {
    #[arg(long)]
    pub geo: String,

    /// Optional GEO context to use for rescoring; checksum verification runs
    /// regardless of whether these are supplied.
    #[arg(long)]
    pub title: Option<String>,
    #[arg(long)]
    pub summary: Option<String>,
    #[arg(long, value_delimiter = ',')]
    pub keywords: Vec<String>,
}

#[derive(Args)]
pub struct ReprocessArgs {
    #[arg(long, value_enum)]
    pub stage: StageArg,
    #[arg(long)]
    pub geo: String,
}

#[derive(Subcommand)]
pub enum CacheCommand {
    /// Hit/miss counts and entry totals for the discovery and parsed-content caches.
    Stats,
    /// Evict discovery-cache entries older than `DISCOVERY_CACHE_TTL_S`.
    Cleanup,
    /// Drop every cache entry.
    Clear,
    /// Drop one discovery-cache entry, or every entry under a prefix ending in `*`.
    Invalidate {
        key: String,
    },
}
