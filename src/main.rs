#![allow(dead_code)]

mod cli;
mod commands;
mod config;
mod constants;
mod datasets;
mod decoders;
mod dot;
mod error;
mod external_id;
mod file_io;
mod filter;
mod graph;
mod loader;
mod output;
mod triples;
mod types;

use anyhow::{Context, Result};
use clap::Parser;
use cli::Command;
use commands::{draw::Style, list_relationships::Projection};
use std::fs;
use tracing::debug;
use tracing_subscriber::EnvFilter;
use triples::TripleOptions;

fn main() -> Result<()> {
    // Parse args early to get verbose flag for logging initialization
    let args = cli::Args::parse();

    // Use RUST_LOG env var if set, otherwise use verbose flag
    // Examples: RUST_LOG=debug, RUST_LOG=stixmap::loader=trace
    let env_filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if args.verbose {
        EnvFilter::new("stixmap=debug")
    } else {
        EnvFilter::new("stixmap=info")
    };

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_line_number(true)
        .with_writer(std::io::stderr)
        .init();

    debug!("Logging initialized (verbose={})", args.verbose);

    rayon::ThreadPoolBuilder::new()
        .build_global()
        .ok(); // Ignore error if pool already initialized (e.g., in tests)

    // Status info never goes to stdout
    eprintln!("stixmap v{}", env!("CARGO_PKG_VERSION"));

    let config = config::Config::discover(args.config.as_deref()).context("Failed to load configuration")?;

    // draw-triples reads its own input; everything else needs STIX sources
    let sources = if args.command.loads_sources() {
        commands::load_sources(&args.sources.selection(), &config)?
    } else {
        loader::CompositeSource::new()
    };

    let (result, output_path) = match args.command {
        Command::ListObjects { filter, format, output_path } => {
            let decoders = decoders::default_decoders(config.decoder);
            (commands::list_objects_command(&sources, &decoders, &filter, format)?, output_path)
        }
        Command::ListRelationships {
            filter,
            decoder,
            subgraph,
            external_ids,
            unique,
            undirected,
            types_only,
            format,
            output_path,
        } => {
            let projection = Projection {
                external_ids,
                triples: TripleOptions { deduplicate: unique, undirected, reduce_to_types: types_only },
            };
            let result = commands::list_relationships_command(
                &sources,
                &commands::decoders(&config, &decoder),
                &filter,
                &subgraph,
                commands::graph_options(&decoder),
                projection,
                format,
            )?;
            (result, output_path)
        }
        Command::Matrix { decoder, source_dataset, output_path } => {
            let result = commands::matrix_command(
                &sources,
                &commands::decoders(&config, &decoder),
                commands::graph_options(&decoder),
                source_dataset,
            )?;
            (result, output_path)
        }
        Command::Draw {
            filter,
            decoder,
            subgraph,
            label,
            group_by_type,
            no_edge_labels,
            types_only,
            output_path,
        } => {
            let style = Style {
                label: label.into(),
                group_by_type,
                include_edge_labels: !no_edge_labels,
                types_only,
            };
            let result = commands::draw_command(
                &sources,
                &config,
                &commands::decoders(&config, &decoder),
                &filter,
                &subgraph,
                commands::graph_options(&decoder),
                style,
            )?;
            (result, output_path)
        }
        Command::DrawTriples { input, group_by_type, output_path } => {
            (commands::draw_triples_command(input.as_deref(), &config, group_by_type)?, output_path)
        }
        Command::Summary { decoder, output_path } => {
            let result = commands::summary_command(
                &sources,
                &commands::decoders(&config, &decoder),
                commands::graph_options(&decoder),
            )?;
            (result, output_path)
        }
    };

    // Output results
    if let Some(output_path) = output_path {
        fs::write(&output_path, &result)
            .context(format!("Failed to write output to {}", output_path.display()))?;
        eprintln!("Results written to: {}", output_path.display());
    } else {
        // Results go to stdout
        print!("{}", result);
    }

    Ok(())
}
