//! hnswkit CLI binary.

use clap::Parser;
use hnswkit::cli::{args::*, commands::*};
use hnswkit::error::StatusCode;
use std::process;
use tracing_subscriber::EnvFilter;

fn main() {
    // Parse command line arguments using clap
    let args = HnswkitArgs::parse();

    // RUST_LOG wins over the verbosity flags when set
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(args.log_filter()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    // Execute the command
    match execute_command(args) {
        Ok(StatusCode::Ok) => {}
        Ok(status) => process::exit(status.code().abs().max(1)),
        Err(e) => {
            eprintln!("Error [{}]: {e}", e.status());
            process::exit(e.status().code().abs().max(1));
        }
    }
}
