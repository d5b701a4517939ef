//! Command implementations for the stixmap CLI.
//!
//! Each subcommand lives in its own module and exposes a `run` function that
//! returns the rendered output as a `String`; `main.rs` decides whether it
//! goes to stdout or to `--output-path`.
//!
//! - **list_objects**: filtered objects as JSON-lines or a STIX bundle
//! - **list_relationships**: the relationship graph as CSV or JSON-lines triples
//! - **matrix**: relationships between dataset objects as a CSV matrix
//! - **draw**: the relationship graph as GraphViz DOT
//! - **draw_triples**: CSV triples (file or stdin) as GraphViz DOT
//! - **summary**: node and edge totals as JSON
//!
//! ## Shared Module
//!
//! `shared` holds the steps every graph command repeats: loading the selected
//! sources, merging decoder options from the config file and the CLI, the
//! object filters, and narrowing the graph to a neighbourhood of selected
//! objects.

pub(crate) mod draw;
pub(crate) mod draw_triples;
pub(crate) mod list_objects;
pub(crate) mod list_relationships;
pub(crate) mod matrix;
pub(crate) mod shared;
pub(crate) mod summary;

// Re-export shared utilities needed by main.rs
pub(crate) use shared::{decoders, graph_options, load_sources};

// Re-export command functions for main.rs
pub(crate) use draw::run as draw_command;
pub(crate) use draw_triples::run as draw_triples_command;
pub(crate) use list_objects::run as list_objects_command;
pub(crate) use list_relationships::run as list_relationships_command;
pub(crate) use matrix::run as matrix_command;
pub(crate) use summary::run as summary_command;
