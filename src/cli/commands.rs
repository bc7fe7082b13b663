//! Command implementations for the hnswkit CLI.

use std::time::Instant;

use crate::cli::args::*;
use crate::cli::output::*;
use crate::config::{Mode, SessionConfig, TrainConfig};
use crate::error::{HnswkitError, Result, StatusCode};
use crate::session::SearchRequest;
use crate::sync::SyncSession;

/// Execute a CLI command, returning the status the process should exit with.
pub fn execute_command(args: HnswkitArgs) -> Result<StatusCode> {
    match &args.command {
        Command::Train(train_args) => train_model(train_args, &args),
        Command::Search(search_args) => search_model(search_args, &args).map(|_| StatusCode::Ok),
        Command::Insert(insert_args) => insert_vector(insert_args, &args).map(|_| StatusCode::Ok),
        Command::Stats(stats_args) => show_stats(stats_args, &args).map(|_| StatusCode::Ok),
    }
}

fn session_config(model: &ModelArgs, mode: Mode) -> SessionConfig {
    SessionConfig::new(mode, model.dimension, &model.model).with_distance(model.distance.into())
}

fn open_session(model: &ModelArgs, mode: Mode) -> Result<SyncSession> {
    let session = SyncSession::new();
    session.init(session_config(model, mode), None)?;
    Ok(session)
}

/// Merge the optional JSON config with command line overrides.
fn train_config(args: &TrainArgs) -> Result<TrainConfig> {
    let mut config = match &args.config {
        Some(path) => TrainConfig::from_json_file(path)?,
        None => TrainConfig::default(),
    };
    if let Some(path) = &args.data_path {
        config.data_path = path.clone();
    }
    if args.normalize {
        config.normalize = true;
    }
    if let Some(v) = args.max_data_size {
        config.max_data_size = v;
    }
    if let Some(v) = args.max_index_size {
        config.max_index_size = v;
    }
    if let Some(v) = args.precision {
        config.precision = v;
    }
    if let Some(v) = args.fast_rank {
        config.fast_rank = v;
    }
    if let Some(v) = args.real_rank {
        config.real_rank = v;
    }
    if let Some(v) = args.step {
        config.step = v;
    }
    if let Some(v) = args.max_epoch {
        config.max_epoch = v;
    }
    if let Some(v) = args.show_span {
        config.show_span = v;
    }
    config.validate()?;
    Ok(config)
}

/// Train a model. A run below the precision target reports `Warning`.
fn train_model(args: &TrainArgs, cli_args: &HnswkitArgs) -> Result<StatusCode> {
    let config = train_config(args)?;
    let session = open_session(&args.model, Mode::Train)?;

    if cli_args.verbosity() > 0 {
        println!("Training from: {}", config.data_path.display());
    }
    let report = session.train(&config)?;

    let message = if report.is_ok() {
        "Training reached the precision target"
    } else {
        "Training finished below the precision target"
    };
    output_result(message, &report, cli_args)?;
    Ok(report.status.status_code())
}

/// Parse comma-separated vector components.
fn parse_vector(raw: &str) -> Result<Vec<f32>> {
    raw.split(',')
        .map(|part| {
            part.trim()
                .parse::<f32>()
                .map_err(|e| HnswkitError::param(format!("invalid vector component '{part}': {e}")))
        })
        .collect()
}

/// Search a model.
fn search_model(args: &SearchArgs, cli_args: &HnswkitArgs) -> Result<()> {
    let session = open_session(&args.model, Mode::Process)?;
    for word in &args.ignore {
        session.ignore(word, true)?;
    }

    let mut request = if args.vector {
        SearchRequest::vector(parse_vector(&args.query)?, args.top_k)
    } else {
        SearchRequest::word(args.query.clone(), args.top_k)
    };
    if args.exhaustive {
        request = request.exhaustive();
    }
    if let Some(distance) = args.filter_edit_distance {
        if !request.search_type.is_word() {
            return Err(HnswkitError::param(
                "--filter-edit-distance only applies to word searches",
            ));
        }
        request = request.with_filter_edit_distance(distance);
    }

    let start_time = Instant::now();
    session.search_with(&request, |result| {
        tracing::info!(
            hits = result.len(),
            elapsed_us = start_time.elapsed().as_micros() as u64,
            "Search finished"
        );
        output_search(result.payload(), cli_args)
    })?
}

/// Insert one vector and save the model.
fn insert_vector(args: &InsertArgs, cli_args: &HnswkitArgs) -> Result<()> {
    let session = open_session(&args.model, Mode::Process)?;
    let label = session.insert(&args.vector, &args.word, args.mode.into())?;
    let saved_to = session.save(args.output.as_deref())?;
    let elements = session.stats()?.index.map_or(0, |s| s.len);

    output_result(
        "Vector inserted",
        &InsertResult {
            word: args.word.clone(),
            label,
            elements,
            saved_to: saved_to.to_string_lossy().to_string(),
        },
        cli_args,
    )
}

/// Show model statistics.
fn show_stats(args: &StatsArgs, cli_args: &HnswkitArgs) -> Result<()> {
    let session = open_session(&args.model, Mode::Process)?;
    let stats = session.stats()?;
    output_result("Model statistics", &stats, cli_args)
}
