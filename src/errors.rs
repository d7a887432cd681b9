use thiserror::Error;

use crate::event_data::DatumKind;

/// Unified error type for every fallible operation in the crate.
#[derive(Error, Debug)]
pub enum HopTraceError {
    #[error("Datum direction must be exactly one of source or target: {kind}")]
    ConflictingDirection { kind: DatumKind },

    #[error("Failed to parse {data_type} record: {message}")]
    EventParse { data_type: String, message: String },

    #[error("Invalid literal at offset {offset}: {message}")]
    LiteralDecode { offset: usize, message: String },

    #[error("Invalid output format: {format}. Valid formats: {valid_formats:?}")]
    InvalidOutputFormat {
        format: String,
        valid_formats: Vec<String>,
    },

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Failed to serialize graph: {message}")]
    Serialization { message: String },

    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, HopTraceError>;
