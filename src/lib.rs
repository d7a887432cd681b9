//! hop-trace builds lateral movement graphs from forensic timelines.
//!
//! Timeline records are normalized into typed datums by per-format
//! parsers, projected onto a deduplicated property graph and written in
//! a JSON wire format the bundled viewer understands.

use std::path::PathBuf;

use clap::Parser;

pub mod configuration;
pub mod errors;
pub mod event_data;
pub mod graph;
pub mod input;
pub mod parsers;
pub mod report;

pub use errors::{HopTraceError, Result};
pub use event_data::{Datum, DatumKind, Direction, EventData, EventId};
pub use graph::{create_graph, EdgeType, Graph};
pub use parsers::ParserRegistry;

#[derive(Debug, Clone, Parser)]
#[clap(
    name = "hop-trace",
    about = "Lateral movement graphs from forensic timelines"
)]
pub struct Args {
    #[clap(help = "Input file with one JSON record per line")]
    pub input: PathBuf,

    #[clap(help = "Output file, stdout when absent")]
    pub output: Option<PathBuf>,

    #[clap(long, help = "Emit a JavaScript assignment instead of plain JSON")]
    pub javascript: bool,

    #[clap(long, help = "Pretty-print the JSON output")]
    pub pretty: bool,

    #[clap(short, long, help = "Show verbose output")]
    pub verbose: bool,

    #[clap(long, help = "Configuration file path")]
    pub config: Option<PathBuf>,
}

impl Args {
    pub fn validate(&self) -> std::result::Result<(), String> {
        if let Some(config) = &self.config {
            match config.extension().and_then(|s| s.to_str()) {
                Some("yaml") | Some("yml") | Some("json") | Some("toml") => {}
                _ => {
                    return Err(format!(
                        "Unsupported config file type: {}",
                        config.display()
                    ));
                }
            }
        }
        Ok(())
    }
}
