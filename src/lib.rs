//! stixmap - decode STIX 2.1 threat-intelligence content into relationship
//! graphs, triples and GraphViz diagrams.
//!
//! Objects are loaded from local files, directories, globs or HTTP(S) URLs,
//! decoded by a fixed set of decoders (plain STIX relationships plus the
//! MITRE vendor extensions), and assembled into a directed multigraph.
//!
//! # Example
//!
//! ```no_run
//! use stixmap::{build_graph, default_decoders, graph_to_triples, load, DecoderOptions, GraphOptions, TripleOptions};
//!
//! let source = load("~/src/mitre/cti/enterprise-attack/enterprise-attack.json").unwrap();
//! let decoders = default_decoders(DecoderOptions::default());
//! let graph = build_graph(source.query(), &decoders, GraphOptions::default());
//!
//! for triple in graph_to_triples(&graph, TripleOptions::default()) {
//!     println!("{}", triple);
//! }
//! ```

pub mod cli;
pub mod config;
pub mod constants;
pub mod datasets;
pub mod decoders;
pub mod dot;
pub mod error;
pub mod external_id;
mod file_io;
pub mod filter;
pub mod graph;
pub mod loader;
pub mod output;
pub mod triples;
pub mod types;

// Re-export commonly used types at crate root
pub use config::Config;
pub use datasets::{Dataset, DataSource, DatasetSelection};
pub use decoders::{default_decoders, Decoder, DecoderKind, DecoderOptions};
pub use dot::{graph_to_dot, triples_to_dot, DotOptions, NodeLabel, Palette};
pub use error::{Result, StixError};
pub use external_id::{external_id, try_external_id};
pub use filter::ObjectFilter;
pub use graph::{build_graph, triples_to_graph, GraphOptions, GraphSummary, StixGraph};
pub use loader::{load, load_many, CompositeSource, Locator, MemorySource};
pub use triples::{graph_to_triples, TripleOptions};
pub use types::{stix_type_from_id, Edge, EdgeData, Node, StixObject, Triple};
