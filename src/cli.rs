use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Shared application context for global flags
#[derive(Clone, Debug)]
pub struct AppContext {
    pub quiet: bool,    // global --quiet
    pub no_color: bool, // global --no-color
    pub dry_run: bool,  // global --dry-run
    pub verbose: bool,  // global --verbose
}

#[derive(Parser)]
#[command(name = "stitch")]
#[command(about = "Concatenate files into one artifact with a merged source map, incrementally")]
#[command(version, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Only report errors
    #[arg(long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log progress at info level
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Show what would be written without touching the output directory
    #[arg(long, global = true)]
    pub dry_run: bool,
}

impl Cli {
    pub fn context(&self) -> AppContext {
        AppContext {
            quiet: self.quiet,
            no_color: self.no_color,
            dry_run: self.dry_run,
            verbose: self.verbose,
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Build every configured concatenation once
    Build(BuildArgs),

    /// Build, then rebuild incrementally whenever inputs change
    Watch(WatchArgs),

    /// Initialize a stitch.toml config file
    Init(InitArgs),
}

#[derive(Debug, Clone, Args)]
pub struct BuildArgs {
    /// Config file (default: first of stitch.toml, stitch.yaml, stitch.json, .stitch.toml)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Override the configured input directory
    #[arg(short, long)]
    pub input_dir: Option<PathBuf>,

    /// Override the configured output directory
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    /// Only build units with these output files
    #[arg(short, long = "unit", value_name = "OUTPUT_FILE")]
    pub units: Vec<String>,

    /// Disable source maps for every unit
    #[arg(long)]
    pub no_source_maps: bool,
}

#[derive(Debug, Clone, Args)]
pub struct WatchArgs {
    #[command(flatten)]
    pub build: BuildArgs,

    /// Quiet period before a batch of changes is rebuilt
    #[arg(long, default_value = "100", value_name = "MS")]
    pub debounce_ms: u64,
}

#[derive(Debug, Clone, Parser)]
pub struct InitArgs {
    /// Directory to initialize config in
    #[arg(default_value = ".")]
    pub path: PathBuf,

    /// Overwrite existing config file
    #[arg(long)]
    pub force: bool,
}
