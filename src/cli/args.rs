//! Command line argument parsing for the hnswkit CLI using clap.

use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::session::InsertMode;
use crate::space::DistanceKind;

/// hnswkit - HNSW approximate nearest neighbor search
#[derive(Parser, Debug, Clone)]
#[command(name = "hnswkit")]
#[command(about = "Train, query and update HNSW vector models")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(long_about = None)]
pub struct HnswkitArgs {
    /// Verbosity level (0=quiet, 1=normal, 2=verbose, 3=debug)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Quiet mode (overrides verbose)
    #[arg(short, long)]
    pub quiet: bool,

    /// Output format
    #[arg(short = 'f', long = "format", default_value = "human")]
    pub output_format: OutputFormat,

    /// Pretty-print JSON output
    #[arg(long)]
    pub pretty: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

impl HnswkitArgs {
    /// Get the effective verbosity level
    pub fn verbosity(&self) -> u8 {
        if self.quiet {
            0
        } else {
            match self.verbose {
                0 => 1, // Default to normal
                n => n,
            }
        }
    }

    /// Default tracing filter for the effective verbosity.
    pub fn log_filter(&self) -> &'static str {
        match self.verbosity() {
            0 => "error",
            1 => "warn",
            2 => "info",
            _ => "debug",
        }
    }
}

/// Available CLI commands
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Train a model from line-delimited JSON vectors
    Train(TrainArgs),

    /// Search a model by word or vector
    Search(SearchArgs),

    /// Insert or update one vector and save the model
    Insert(InsertArgs),

    /// Show model statistics
    Stats(StatsArgs),
}

/// Model location and shape shared by every command.
#[derive(Args, Debug, Clone)]
pub struct ModelArgs {
    /// Model file (".hnsw" is appended if missing)
    #[arg(short, long, env = "HNSWKIT_MODEL", value_name = "MODEL_PATH")]
    pub model: PathBuf,

    /// Vector dimension
    #[arg(short, long, env = "HNSWKIT_DIM")]
    pub dimension: usize,

    /// Distance metric
    #[arg(long, default_value = "euclidean")]
    pub distance: DistanceArg,
}

/// Arguments for training
#[derive(Args, Debug, Clone)]
pub struct TrainArgs {
    #[command(flatten)]
    pub model: ModelArgs,

    /// Training data file, one {"word": [..]} object per line
    #[arg(value_name = "DATA_FILE")]
    pub data_path: Option<PathBuf>,

    /// JSON training configuration; flags given on the command line take precedence
    #[arg(short, long, value_name = "CONFIG_FILE")]
    pub config: Option<PathBuf>,

    /// Maximum number of records read from the data file
    #[arg(long)]
    pub max_data_size: Option<usize>,

    /// Normalize vectors to unit length
    #[arg(long)]
    pub normalize: bool,

    /// Capacity of the built index
    #[arg(long)]
    pub max_index_size: Option<usize>,

    /// Precision target in [0, 1]
    #[arg(short, long)]
    pub precision: Option<f32>,

    /// Top-k of the approximate search in the precision check
    #[arg(long)]
    pub fast_rank: Option<usize>,

    /// Top-k of the exhaustive search in the precision check
    #[arg(long)]
    pub real_rank: Option<usize>,

    /// Parameter growth step between epochs
    #[arg(long)]
    pub step: Option<usize>,

    /// Maximum number of training epochs
    #[arg(long)]
    pub max_epoch: Option<usize>,

    /// Log progress every N records
    #[arg(long)]
    pub show_span: Option<usize>,
}

/// Arguments for searching
#[derive(Args, Debug, Clone)]
pub struct SearchArgs {
    #[command(flatten)]
    pub model: ModelArgs,

    /// Word to look up, or comma-separated components with --vector
    #[arg(value_name = "QUERY", allow_hyphen_values = true)]
    pub query: String,

    /// Interpret QUERY as a vector
    #[arg(long)]
    pub vector: bool,

    /// Scan every node instead of walking the graph
    #[arg(long)]
    pub exhaustive: bool,

    /// Number of results
    #[arg(short = 'k', long, default_value = "5")]
    pub top_k: usize,

    /// Drop results within this edit distance of the query word
    #[arg(long)]
    pub filter_edit_distance: Option<usize>,

    /// Words to suppress from results (comma-separated)
    #[arg(long, value_delimiter = ',')]
    pub ignore: Vec<String>,
}

/// Arguments for inserting
#[derive(Args, Debug, Clone)]
pub struct InsertArgs {
    #[command(flatten)]
    pub model: ModelArgs,

    /// Word the vector is stored under
    #[arg(value_name = "WORD")]
    pub word: String,

    /// Vector components (comma-separated)
    #[arg(value_name = "VECTOR", value_delimiter = ',', allow_hyphen_values = true)]
    pub vector: Vec<f32>,

    /// What to do when the word already exists
    #[arg(long, default_value = "overwrite")]
    pub mode: InsertModeArg,

    /// Save to this path instead of the source model
    #[arg(short, long, value_name = "OUTPUT_PATH")]
    pub output: Option<PathBuf>,
}

/// Arguments for statistics
#[derive(Args, Debug, Clone)]
pub struct StatsArgs {
    #[command(flatten)]
    pub model: ModelArgs,
}

/// Distance metrics selectable on the command line
#[derive(ValueEnum, Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistanceArg {
    /// Squared Euclidean distance
    Euclidean,
    /// Negative inner product
    InnerProduct,
}

impl From<DistanceArg> for DistanceKind {
    fn from(arg: DistanceArg) -> Self {
        match arg {
            DistanceArg::Euclidean => DistanceKind::Euclidean,
            DistanceArg::InnerProduct => DistanceKind::InnerProduct,
        }
    }
}

/// Insert modes selectable on the command line
#[derive(ValueEnum, Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InsertModeArg {
    /// Replace the stored vector
    Overwrite,
    /// Keep the stored vector
    Discard,
}

impl From<InsertModeArg> for InsertMode {
    fn from(arg: InsertModeArg) -> Self {
        match arg {
            InsertModeArg::Overwrite => InsertMode::Overwrite,
            InsertModeArg::Discard => InsertMode::Discard,
        }
    }
}

/// Output formats
#[derive(ValueEnum, Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Human-readable output
    Human,
    /// JSON output
    Json,
}
