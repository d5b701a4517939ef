//! The `draw-triples` command: render `subject,predicate,object` lines as
//! GraphViz DOT without loading any STIX data.

use crate::config::Config;
use crate::dot::{self, DotOptions};
use crate::triples;
use anyhow::{Context, Result};
use std::fs;
use std::io;
use std::path::Path;

/// Run the triple drawing. Triples are read from `input`, or from stdin when
/// it is `None` or `-`.
pub(crate) fn run(input: Option<&Path>, config: &Config, group_by_type: bool) -> Result<String> {
    let parsed = match input.filter(|path| *path != Path::new("-")) {
        Some(path) => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("Failed to read triples from {}", path.display()))?;
            triples::parse_csv(&text).with_context(|| format!("Invalid triples in {}", path.display()))?
        }
        None => triples::read_csv(io::stdin().lock()).context("Invalid triples on stdin")?,
    };

    let options = DotOptions {
        group_by_type,
        palette: config.palette(),
        ..Default::default()
    };
    Ok(dot::triples_to_dot(&parsed, &options))
}
