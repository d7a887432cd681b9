//! Record ingestion from line-delimited JSON files.
//!
//! Each input line holds one serialized record. Malformed lines are
//! logged and skipped so a single bad record cannot sink a multi-gigabyte
//! export, while I/O failures abort the run.

use std::fs::File;
use std::io::{BufRead, BufReader, Lines};
use std::path::Path;

use serde_json::Value;

use crate::errors::{HopTraceError, Result};
use crate::graph::{create_graph, Graph};
use crate::parsers::ParserRegistry;

/// Interval between progress reports while reading input lines.
const LINE_PROGRESS_INTERVAL: usize = 100_000;

/// Streaming reader over one record per line.
pub struct RecordReader {
    lines: Lines<BufReader<File>>,
    path: String,
    line_number: usize,
}

impl RecordReader {
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|source| HopTraceError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Ok(Self {
            lines: BufReader::new(file).lines(),
            path: path.display().to_string(),
            line_number: 0,
        })
    }
}

impl Iterator for RecordReader {
    type Item = Result<Value>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let line = match self.lines.next()? {
                Ok(line) => line,
                Err(source) => {
                    return Some(Err(HopTraceError::Io {
                        path: self.path.clone(),
                        source,
                    }));
                }
            };
            self.line_number += 1;
            if self.line_number % LINE_PROGRESS_INTERVAL == 0 {
                log::info!("read {} lines from {}", self.line_number, self.path);
            }
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str(&line) {
                Ok(record) => return Some(Ok(record)),
                Err(error) => {
                    log::warn!(
                        "skipping malformed record at {}:{}: {}",
                        self.path,
                        self.line_number,
                        error
                    );
                }
            }
        }
    }
}

/// Normalizes a batch of records and builds the finalized graph.
/// Records no parser recognizes contribute nothing.
pub fn records_to_graph<I>(registry: &mut ParserRegistry, records: I) -> Graph
where
    I: IntoIterator<Item = Value>,
{
    let events = records
        .into_iter()
        .map(|record| registry.normalize(&record))
        .filter(|event| !event.is_empty());
    create_graph(events)
}

/// Reads a line-delimited JSON file and builds the finalized graph.
pub fn file_to_graph(path: &Path, registry: &mut ParserRegistry) -> Result<Graph> {
    let reader = RecordReader::open(path)?;

    let mut read = 0usize;
    let mut parsed = 0usize;
    let mut failure = None;
    let records = reader.map_while(|record| match record {
        Ok(record) => Some(record),
        Err(error) => {
            failure = Some(error);
            None
        }
    });
    let events = records.filter_map(|record| {
        read += 1;
        let event = registry.normalize(&record);
        if event.is_empty() {
            None
        } else {
            parsed += 1;
            Some(event)
        }
    });
    let graph = create_graph(events);

    if let Some(error) = failure {
        return Err(error);
    }
    log::info!(
        "normalized {} of {} records from {} into {} nodes and {} edges",
        parsed,
        read,
        path.display(),
        graph.node_count(),
        graph.edge_count()
    );
    Ok(graph)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    use serde_json::json;
    use tempfile::NamedTempFile;

    use crate::event_data::DatumKind;

    fn login_record(user: &str, id: i64) -> Value {
        json!({
            "data_type": "linux:utmp:event",
            "hostname": "fileserver",
            "user": user,
            "timestamp": 1_750_000_001_000_000_i64,
            "timesketch_id": id,
        })
    }

    fn write_lines(lines: &[&str]) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        for line in lines {
            writeln!(file, "{}", line).unwrap();
        }
        file.flush().unwrap();
        file
    }

    mod record_reader {
        use super::*;

        #[test]
        fn should_yield_one_record_per_line() {
            let file = write_lines(&[
                r#"{"data_type": "linux:utmp:event"}"#,
                r#"{"data_type": "bsm:event"}"#,
            ]);

            let records: Vec<Value> = RecordReader::open(file.path())
                .unwrap()
                .map(|record| record.unwrap())
                .collect();

            assert_eq!(records.len(), 2);
            assert_eq!(records[0]["data_type"], "linux:utmp:event");
            assert_eq!(records[1]["data_type"], "bsm:event");
        }

        #[test]
        fn should_skip_blank_and_malformed_lines() {
            let file = write_lines(&[
                "",
                "not json at all",
                r#"{"data_type": "linux:utmp:event"}"#,
                "   ",
            ]);

            let records: Vec<Value> = RecordReader::open(file.path())
                .unwrap()
                .map(|record| record.unwrap())
                .collect();

            assert_eq!(records.len(), 1);
        }

        #[test]
        fn should_report_missing_files() {
            let error = RecordReader::open(Path::new("/nonexistent/records.jsonl"))
                .err()
                .unwrap();
            assert!(error.to_string().contains("/nonexistent/records.jsonl"));
        }
    }

    mod graph_building {
        use super::*;

        #[test]
        fn should_build_a_graph_from_in_memory_records() {
            let mut registry = ParserRegistry::with_default_parsers();
            let graph = records_to_graph(
                &mut registry,
                vec![login_record("mallory", 1), json!({"data_type": "unknown"})],
            );

            assert_eq!(graph.node_count(), 2);
            assert_eq!(graph.edge_count(), 1);
            let names: Vec<&str> = graph.nodes().iter().map(|n| n.value.as_str()).collect();
            assert!(names.contains(&"fileserver"));
            assert!(names.contains(&"mallory@fileserver"));
        }

        #[test]
        fn should_build_a_graph_from_a_file() {
            let file = write_lines(&[
                &serde_json::to_string(&login_record("mallory", 1)).unwrap(),
                "malformed line",
                &serde_json::to_string(&login_record("victor", 2)).unwrap(),
            ]);

            let mut registry = ParserRegistry::with_default_parsers();
            let graph = file_to_graph(file.path(), &mut registry).unwrap();

            assert_eq!(graph.node_count(), 3);
            assert_eq!(graph.edge_count(), 2);
            assert!(graph
                .nodes()
                .iter()
                .any(|n| n.kind == DatumKind::MachineName && n.cluster == Some(n.id)));
        }
    }
}
