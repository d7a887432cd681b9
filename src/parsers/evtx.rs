//! Parser for Windows security event log records.

use serde_json::Value;

use super::literal::{self, Literal};
use super::{origin, str_field};
use crate::errors::{HopTraceError, Result};
use crate::event_data::{Datum, DatumKind, Direction, EventData};

pub const DATA_TYPE: &str = "windows:evtx:record";

/// An account was successfully logged on.
const EVENT_LOGON: i64 = 4624;
/// A logon was attempted using explicit credentials.
const EVENT_EXPLICIT_LOGON: i64 = 4648;

/// Positions of the interesting fields in a 4624 strings array.
const LOGON_FIELDS: [(Direction, DatumKind, usize); 6] = [
    (Direction::Source, DatumKind::UserId, 0),
    (Direction::Source, DatumKind::UserName, 1),
    (Direction::Target, DatumKind::UserId, 4),
    (Direction::Target, DatumKind::UserName, 5),
    (Direction::Target, DatumKind::MachineName, 11),
    (Direction::Target, DatumKind::Ip, 18),
];

/// Positions of the interesting fields in a 4648 strings array.
const EXPLICIT_LOGON_FIELDS: [(Direction, DatumKind, usize); 5] = [
    (Direction::Source, DatumKind::UserId, 0),
    (Direction::Source, DatumKind::UserName, 1),
    (Direction::Target, DatumKind::UserName, 5),
    (Direction::Target, DatumKind::MachineName, 8),
    (Direction::Target, DatumKind::Ip, 12),
];

/// Parses logon records by fixed positions in the event strings array.
/// Records without a strings array, and identifiers other than the two
/// logon events, yield an empty result.
pub fn parse(record: &Value) -> Result<EventData> {
    let mut data = EventData::new();
    let strings = match event_strings(record)? {
        Some(strings) => strings,
        None => return Ok(data),
    };

    match record.get("event_identifier").and_then(Value::as_i64) {
        Some(EVENT_LOGON) => {
            data.add(Datum::source(
                DatumKind::StorageOrigin,
                origin::storage_origin(record)?,
            ));
            if let Some(computer_name) = str_field(record, "computer_name") {
                data.add(Datum::source(DatumKind::MachineName, computer_name));
            }
            add_positional(&mut data, &strings, &LOGON_FIELDS)?;
        }
        Some(EVENT_EXPLICIT_LOGON) => {
            if let Some(computer_name) = str_field(record, "computer_name") {
                data.add(Datum::source(DatumKind::MachineName, computer_name));
            }
            add_positional(&mut data, &strings, &EXPLICIT_LOGON_FIELDS)?;
        }
        _ => {}
    }
    Ok(data)
}

fn add_positional(
    data: &mut EventData,
    strings: &[String],
    fields: &[(Direction, DatumKind, usize)],
) -> Result<()> {
    for &(direction, kind, index) in fields {
        let value = strings.get(index).ok_or_else(|| HopTraceError::EventParse {
            data_type: DATA_TYPE.to_string(),
            message: format!(
                "strings entry {} is missing ({} entries present)",
                index,
                strings.len()
            ),
        })?;
        data.add(Datum::new(direction, kind, value.clone()));
    }
    Ok(())
}

/// Returns the event strings array, decoding the stringified form when
/// necessary. `None` means the record carries no strings to read.
fn event_strings(record: &Value) -> Result<Option<Vec<String>>> {
    match record.get("strings") {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Array(items)) => {
            if items.is_empty() {
                return Ok(None);
            }
            let mut strings = Vec::with_capacity(items.len());
            for item in items {
                match item.as_str() {
                    Some(value) => strings.push(value.to_string()),
                    None => {
                        return Err(parse_error("strings array holds a non-string entry"));
                    }
                }
            }
            Ok(Some(strings))
        }
        Some(Value::String(repr)) => {
            if repr.is_empty() {
                return Ok(None);
            }
            match literal::parse(repr)? {
                Literal::List(items) => {
                    let mut strings = Vec::with_capacity(items.len());
                    for item in items {
                        match item {
                            Literal::Str(value) => strings.push(value),
                            _ => {
                                return Err(parse_error(
                                    "stringified strings array holds a non-string entry",
                                ));
                            }
                        }
                    }
                    Ok(Some(strings))
                }
                _ => Err(parse_error("strings literal is not a list")),
            }
        }
        Some(_) => Err(parse_error("strings field must be an array")),
    }
}

fn parse_error(message: &str) -> HopTraceError {
    HopTraceError::EventParse {
        data_type: DATA_TYPE.to_string(),
        message: message.to_string(),
    }
}
