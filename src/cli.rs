use crate::datasets::{Dataset, DatasetSelection};
use crate::dot::NodeLabel;
use clap::{Args as ClapArgs, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "stixmap")]
#[command(about = "Decode STIX 2.1 bundles into relationship graphs, triples and GraphViz diagrams")]
#[command(version)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    #[command(flatten)]
    pub sources: SourceArgs,

    /// JSON config file (data sources, edge colours, decoder options)
    #[arg(long, global = true, env = "STIXMAP_CONFIG")]
    pub config: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

/// Dataset toggles shared by every subcommand that loads objects.
#[derive(ClapArgs, Debug, Clone, Default)]
pub struct SourceArgs {
    /// Load every built-in dataset
    #[arg(long, global = true)]
    pub include_all: bool,

    /// MITRE ATT&CK Enterprise
    #[arg(long, global = true)]
    pub include_attack_enterprise: bool,

    /// MITRE ATT&CK Mobile
    #[arg(long, global = true)]
    pub include_attack_mobile: bool,

    /// MITRE ATT&CK ICS
    #[arg(long, global = true)]
    pub include_attack_ics: bool,

    /// NIST SP 800-53 controls
    #[arg(long, global = true)]
    pub include_nist_sp_800_53: bool,

    /// MITRE CAPEC
    #[arg(long, global = true)]
    pub include_capec: bool,

    /// MITRE MBC
    #[arg(long, global = true)]
    pub include_mbc: bool,

    /// ATT&CK Enterprise to NIST SP 800-53 mappings (implied by ATT&CK Enterprise + NIST SP 800-53)
    #[arg(long, global = true)]
    pub include_attack_to_nist_sp_800_53: bool,

    /// Extra file, directory, glob or URL to load (repeatable)
    #[arg(long = "include", value_name = "LOCATOR", global = true)]
    pub include: Vec<String>,
}

impl SourceArgs {
    pub fn selection(&self) -> DatasetSelection {
        DatasetSelection {
            all: self.include_all,
            attack_enterprise: self.include_attack_enterprise,
            attack_mobile: self.include_attack_mobile,
            attack_ics: self.include_attack_ics,
            nist_sp_800_53: self.include_nist_sp_800_53,
            capec: self.include_capec,
            mbc: self.include_mbc,
            attack_to_nist_sp_800_53: self.include_attack_to_nist_sp_800_53,
            locators: self.include.clone(),
        }
    }
}

/// Object selection shared by the listing and drawing commands.
#[derive(ClapArgs, Debug, Clone, Default)]
pub struct FilterArgs {
    /// Only objects with these ids (repeatable)
    #[arg(long = "object-id", value_name = "ID")]
    pub object_ids: Vec<String>,

    /// Only objects of these STIX types (repeatable)
    #[arg(long = "object-type", value_name = "TYPE")]
    pub object_types: Vec<String>,

    /// Only objects whose name or alias matches these shell patterns (repeatable)
    #[arg(long = "object-name", value_name = "PATTERN")]
    pub object_names: Vec<String>,

    /// Keep deprecated objects
    #[arg(long)]
    pub include_deprecated: bool,

    /// Keep revoked objects
    #[arg(long)]
    pub include_revoked: bool,
}

/// Decoder toggles layered over the config file.
#[derive(ClapArgs, Debug, Clone, Default)]
pub struct DecoderArgs {
    /// Emit identity nodes and created-by / modified-by edges
    #[arg(long)]
    pub include_identities: bool,

    /// Emit marking-definition nodes and edges
    #[arg(long)]
    pub include_markings: bool,

    /// Add a node per external reference URL
    #[arg(long)]
    pub expand_external_references: bool,

    /// Keep edges whose endpoints were never loaded
    #[arg(long)]
    pub keep_dangling_references: bool,
}

/// Neighbourhood selection around the objects picked by [`FilterArgs`].
#[derive(ClapArgs, Debug, Clone, Default)]
pub struct SubgraphArgs {
    /// Follow edges this many hops out from the selected objects
    #[arg(long)]
    pub radius: Option<usize>,

    /// Only follow predicates matching these shell patterns (repeatable)
    #[arg(long = "predicate", value_name = "PATTERN")]
    pub predicates: Vec<String>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List objects
    ListObjects {
        #[command(flatten)]
        filter: FilterArgs,

        /// Output format
        #[arg(short, long, default_value = "jsonl")]
        format: ObjectFormat,

        /// Write output to file
        #[arg(short, long)]
        output_path: Option<PathBuf>,
    },

    /// List relationships as triples
    ListRelationships {
        #[command(flatten)]
        filter: FilterArgs,

        #[command(flatten)]
        decoder: DecoderArgs,

        #[command(flatten)]
        subgraph: SubgraphArgs,

        /// Rename nodes to their external ids, dropping nodes without one
        #[arg(long)]
        external_ids: bool,

        /// Emit each distinct triple once
        #[arg(long)]
        unique: bool,

        /// With --unique, treat (s, p, o) and (o, p, s) as the same triple
        #[arg(long)]
        undirected: bool,

        /// Replace ids by STIX types
        #[arg(long)]
        types_only: bool,

        /// Output format
        #[arg(short, long, default_value = "csv")]
        format: TripleFormat,

        /// Write output to file
        #[arg(short, long)]
        output_path: Option<PathBuf>,
    },

    /// Relationship matrix (CSV) between objects of the loaded datasets
    Matrix {
        #[command(flatten)]
        decoder: DecoderArgs,

        /// Only relationships whose source object belongs to this dataset
        #[arg(long)]
        source_dataset: Option<Dataset>,

        /// Write output to file
        #[arg(short, long)]
        output_path: Option<PathBuf>,
    },

    /// Render the relationship graph as GraphViz DOT
    Draw {
        #[command(flatten)]
        filter: FilterArgs,

        #[command(flatten)]
        decoder: DecoderArgs,

        #[command(flatten)]
        subgraph: SubgraphArgs,

        /// Node labels
        #[arg(long, default_value = "id")]
        label: LabelArg,

        /// Group nodes into one cluster per STIX type
        #[arg(long)]
        group_by_type: bool,

        /// Leave predicates off the edges
        #[arg(long)]
        no_edge_labels: bool,

        /// Draw one node per STIX type instead of one per object
        #[arg(long)]
        types_only: bool,

        /// Write output to file
        #[arg(short, long)]
        output_path: Option<PathBuf>,
    },

    /// Render `subject,predicate,object` lines as GraphViz DOT
    DrawTriples {
        /// CSV triples file (stdin when omitted or "-")
        input: Option<PathBuf>,

        /// Group nodes into one cluster per STIX type
        #[arg(long)]
        group_by_type: bool,

        /// Write output to file
        #[arg(short, long)]
        output_path: Option<PathBuf>,
    },

    /// Node and edge totals for the relationship graph (JSON)
    Summary {
        #[command(flatten)]
        decoder: DecoderArgs,

        /// Write output to file
        #[arg(short, long)]
        output_path: Option<PathBuf>,
    },
}

impl Command {
    /// Whether the command reads STIX data sources at all.
    pub fn loads_sources(&self) -> bool {
        !matches!(self, Command::DrawTriples { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ObjectFormat {
    /// One JSON object per line
    Jsonl,
    /// A single STIX bundle
    Bundle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum TripleFormat {
    /// `subject,predicate,object` lines
    Csv,
    /// One JSON edge per line
    Jsonl,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum LabelArg {
    Id,
    Name,
    ExternalId,
}

impl From<LabelArg> for NodeLabel {
    fn from(label: LabelArg) -> Self {
        match label {
            LabelArg::Id => NodeLabel::Id,
            LabelArg::Name => NodeLabel::Name,
            LabelArg::ExternalId => NodeLabel::ExternalId,
        }
    }
}
