//! Record normalization: per-format parsers, dispatch and enrichment.
//!
//! [`ParserRegistry`] maps plaso `data_type` discriminators to parser
//! functions and reduces raw JSON records to [`EventData`]. After a
//! parser has extracted its datums, user names and ids are qualified
//! with the best machine identifier of their side and the record
//! identity (timestamp, event id) is stamped on.

pub mod bsm;
pub mod evtx;
pub mod literal;
pub mod origin;
pub mod syslog;
pub mod utmp;

use std::collections::HashMap;

use serde_json::Value;

use crate::errors::Result;
use crate::event_data::{DatumKind, Direction, EventData, EventId};

/// Parser entry point: reduces one raw record to its datums.
pub type ParseFn = fn(&Value) -> Result<EventData>;

/// Fallback anchor for users on a side with no machine identifier.
const UNKNOWN_ANCHOR: &str = "UNKNOWN";

/// Machine identifiers tried as user qualification anchors, best first.
const ANCHOR_KINDS: [DatumKind; 3] = [
    DatumKind::MachineName,
    DatumKind::Ip,
    DatumKind::StorageOrigin,
];

/// Dispatches records to format parsers and enriches their output.
///
/// Synthetic event ids are handed out from a per-registry counter, so
/// records normalized through the same registry never collide.
pub struct ParserRegistry {
    parsers: HashMap<String, ParseFn>,
    synthetic_ids: i64,
}

impl ParserRegistry {
    pub fn new() -> Self {
        Self {
            parsers: HashMap::new(),
            synthetic_ids: 0,
        }
    }

    /// A registry with every built-in format parser registered.
    pub fn with_default_parsers() -> Self {
        let mut registry = Self::new();
        registry.register(utmp::DATA_TYPE, utmp::parse);
        registry.register(evtx::DATA_TYPE, evtx::parse);
        registry.register(bsm::DATA_TYPE, bsm::parse);
        registry.register(syslog::LINE_DATA_TYPE, syslog::parse_line);
        registry.register(syslog::SSH_LOGIN_DATA_TYPE, syslog::parse_ssh_login);
        registry
    }

    /// Registers a parser for a discriminator, replacing any previous one.
    pub fn register(&mut self, data_type: &str, parser: ParseFn) {
        self.parsers.insert(data_type.to_string(), parser);
    }

    /// The discriminators this registry can handle, sorted.
    pub fn known_types(&self) -> Vec<&str> {
        let mut types: Vec<&str> = self.parsers.keys().map(String::as_str).collect();
        types.sort_unstable();
        types
    }

    /// Normalizes one raw record.
    ///
    /// Unknown discriminators yield an empty result, as do parser
    /// failures; failures are logged rather than propagated so one
    /// broken record cannot stop a run.
    pub fn normalize(&mut self, record: &Value) -> EventData {
        let data_type = match discriminator(record) {
            Some(data_type) => data_type,
            None => return EventData::new(),
        };
        let parser = match self.parsers.get(data_type) {
            Some(&parser) => parser,
            None => return EventData::new(),
        };

        let mut data = match parser(record) {
            Ok(data) => data,
            Err(err) => {
                log::warn!("failed to parse {} record: {}", data_type, err);
                return EventData::new();
            }
        };
        if data.is_empty() {
            return data;
        }

        data.event_type = Some(data_type.to_string());
        qualify_users(&mut data, Direction::Target);
        qualify_users(&mut data, Direction::Source);
        data.timestamp = record.get("timestamp").and_then(Value::as_i64);

        let synthetic = EventId::Int(self.next_synthetic_id());
        let uuid = record_id(record, "uuid").unwrap_or(synthetic);
        data.event_id = Some(record_id(record, "timesketch_id").unwrap_or(uuid));
        data
    }

    fn next_synthetic_id(&mut self) -> i64 {
        self.synthetic_ids += 1;
        self.synthetic_ids
    }
}

impl Default for ParserRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Reads the `data_type` discriminator, which is serialized either flat
/// or as an object with a `stream` field.
fn discriminator(record: &Value) -> Option<&str> {
    match record.get("data_type")? {
        Value::String(data_type) => Some(data_type),
        Value::Object(fields) => fields.get("stream").and_then(Value::as_str),
        _ => None,
    }
}

/// Suffixes user names and ids on one side with `@<anchor>`, where the
/// anchor is that side's best machine identifier.
fn qualify_users(data: &mut EventData, direction: Direction) {
    let anchor = ANCHOR_KINDS
        .iter()
        .find_map(|&kind| data.value_of(direction, kind))
        .unwrap_or(UNKNOWN_ANCHOR)
        .to_string();
    for kind in [DatumKind::UserName, DatumKind::UserId] {
        if let Some(datum) = data.get_mut(direction, kind) {
            datum.value = format!("{}@{}", datum.value, anchor);
        }
    }
}

fn record_id(record: &Value, field: &str) -> Option<EventId> {
    match record.get(field)? {
        Value::String(id) => Some(EventId::Str(id.clone())),
        Value::Number(id) => id.as_i64().map(EventId::Int),
        _ => None,
    }
}

/// String field lookup that treats mistyped fields as absent.
pub(crate) fn str_field<'a>(record: &'a Value, field: &str) -> Option<&'a str> {
    record.get(field).and_then(Value::as_str)
}
