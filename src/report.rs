//! Graph rendering and output.
//!
//! The finished graph is written either as plain JSON or as a JavaScript
//! assignment that the bundled viewer can load from a `file://` page
//! without a server.

use std::collections::BTreeSet;
use std::fs;
use std::io::Write;
use std::path::Path;

use chrono::Utc;

use crate::errors::{HopTraceError, Result};
use crate::graph::Graph;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Json,
    Javascript,
}

impl OutputFormat {
    pub fn all() -> Vec<OutputFormat> {
        vec![Self::Json, Self::Javascript]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OutputFormat::Json => "json",
            OutputFormat::Javascript => "javascript",
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for OutputFormat {
    type Err = HopTraceError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "json" => Ok(OutputFormat::Json),
            "javascript" => Ok(OutputFormat::Javascript),
            _ => Err(HopTraceError::InvalidOutputFormat {
                format: s.to_string(),
                valid_formats: OutputFormat::all()
                    .iter()
                    .map(|f| f.as_str().to_string())
                    .collect(),
            }),
        }
    }
}

/// Writes graphs in the configured format, to a file or to stdout.
pub struct GraphWriter {
    format: OutputFormat,
    pretty: bool,
}

impl GraphWriter {
    pub fn new(format: OutputFormat, pretty: bool) -> Self {
        Self { format, pretty }
    }

    pub fn render(&self, graph: &Graph) -> Result<String> {
        let json = if self.pretty {
            serde_json::to_string_pretty(graph)
        } else {
            serde_json::to_string(graph)
        }
        .map_err(|error| HopTraceError::Serialization {
            message: error.to_string(),
        })?;

        Ok(match self.format {
            OutputFormat::Json => json,
            OutputFormat::Javascript => format!("var graph={};\n", json),
        })
    }

    pub fn write(&self, graph: &Graph, output: Option<&Path>) -> Result<()> {
        let rendered = self.render(graph)?;
        match output {
            Some(path) => fs::write(path, rendered).map_err(|source| HopTraceError::Io {
                path: path.display().to_string(),
                source,
            }),
            None => {
                let stdout = std::io::stdout();
                let mut handle = stdout.lock();
                handle
                    .write_all(rendered.as_bytes())
                    .and_then(|_| handle.flush())
                    .map_err(|source| HopTraceError::Io {
                        path: "<stdout>".to_string(),
                        source,
                    })
            }
        }
    }
}

/// Size figures for a finished graph.
#[derive(Debug)]
pub struct GraphStats {
    pub generated_at: String,
    pub nodes: usize,
    pub edges: usize,
    pub evidence: usize,
    pub clusters: usize,
}

impl GraphStats {
    pub fn from_graph(graph: &Graph) -> Self {
        let clusters: BTreeSet<usize> = graph
            .nodes()
            .iter()
            .filter_map(|node| node.cluster)
            .collect();
        Self {
            generated_at: Utc::now().to_rfc3339(),
            nodes: graph.node_count(),
            edges: graph.edge_count(),
            evidence: graph.edges().iter().map(|edge| edge.events.len()).sum(),
            clusters: clusters.len(),
        }
    }
}

pub fn log_summary(graph: &Graph) {
    let stats = GraphStats::from_graph(graph);
    log::info!(
        "graph summary: {} nodes, {} edges, {} evidence entries, {} clusters, generated at {}",
        stats.nodes,
        stats.edges,
        stats.evidence,
        stats.clusters,
        stats.generated_at
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::event_data::{Datum, DatumKind};
    use crate::graph::EdgeType;

    fn sample_graph() -> Graph {
        let mut graph = Graph::new();
        graph.add_data(
            &Datum::source(DatumKind::MachineName, "machine1"),
            &Datum::target(DatumKind::UserName, "user1"),
            EdgeType::Has,
            Some(10),
            Some(20.into()),
        );
        graph
    }

    mod output_format {
        use super::*;

        #[test]
        fn should_convert_output_format_to_string() {
            assert_eq!(OutputFormat::Json.as_str(), "json");
            assert_eq!(OutputFormat::Javascript.as_str(), "javascript");
        }

        #[test]
        fn should_parse_valid_output_format_from_string() {
            assert_eq!("json".parse::<OutputFormat>().unwrap(), OutputFormat::Json);
            assert_eq!(
                "javascript".parse::<OutputFormat>().unwrap(),
                OutputFormat::Javascript
            );
        }

        #[test]
        fn should_reject_invalid_output_format_string() {
            let result = "xml".parse::<OutputFormat>();
            assert!(result.is_err());

            if let Err(HopTraceError::InvalidOutputFormat {
                format,
                valid_formats,
            }) = result
            {
                assert_eq!(format, "xml");
                assert_eq!(valid_formats, vec!["json", "javascript"]);
            } else {
                panic!("Expected InvalidOutputFormat error");
            }
        }
    }

    mod graph_writer {
        use super::*;

        #[test]
        fn should_render_compact_json() {
            let writer = GraphWriter::new(OutputFormat::Json, false);
            let rendered = writer.render(&sample_graph()).unwrap();

            assert!(!rendered.contains('\n'));
            let value: serde_json::Value = serde_json::from_str(&rendered).unwrap();
            assert_eq!(value["nodes"].as_array().unwrap().len(), 2);
            assert_eq!(value["links"].as_array().unwrap().len(), 1);
        }

        #[test]
        fn should_render_pretty_json() {
            let writer = GraphWriter::new(OutputFormat::Json, true);
            let rendered = writer.render(&sample_graph()).unwrap();

            assert!(rendered.contains("\n  \"nodes\""));
        }

        #[test]
        fn should_wrap_javascript_output() {
            let writer = GraphWriter::new(OutputFormat::Javascript, false);
            let rendered = writer.render(&sample_graph()).unwrap();

            assert!(rendered.starts_with("var graph={"));
            assert!(rendered.ends_with(";\n"));

            let json = &rendered["var graph=".len()..rendered.len() - 2];
            let value: serde_json::Value = serde_json::from_str(json).unwrap();
            assert_eq!(value["nodes"].as_array().unwrap().len(), 2);
        }

        #[test]
        fn should_write_to_files() {
            let directory = tempfile::tempdir().unwrap();
            let path = directory.path().join("graph.json");

            let writer = GraphWriter::new(OutputFormat::Json, false);
            writer.write(&sample_graph(), Some(&path)).unwrap();

            let written = fs::read_to_string(&path).unwrap();
            let value: serde_json::Value = serde_json::from_str(&written).unwrap();
            assert_eq!(value["links"][0]["type"], "has");
        }
    }

    mod graph_stats {
        use super::*;

        #[test]
        fn should_measure_a_finalized_graph() {
            let mut graph = sample_graph();
            graph.add_data(
                &Datum::source(DatumKind::MachineName, "machine1"),
                &Datum::target(DatumKind::UserName, "user1"),
                EdgeType::Has,
                Some(30),
                Some(40.into()),
            );
            graph.add_data(
                &Datum::source(DatumKind::MachineName, "machine2"),
                &Datum::target(DatumKind::UserName, "user2"),
                EdgeType::Has,
                Some(50),
                Some(60.into()),
            );
            graph.finalize();

            let stats = GraphStats::from_graph(&graph);
            assert_eq!(stats.nodes, 4);
            assert_eq!(stats.edges, 2);
            assert_eq!(stats.evidence, 3);
            assert_eq!(stats.clusters, 2);
        }

        #[test]
        fn should_count_no_clusters_before_finalize() {
            let stats = GraphStats::from_graph(&sample_graph());
            assert_eq!(stats.clusters, 0);
        }
    }
}
