//! Parser for Linux wtmp login records.

use serde_json::Value;

use super::{origin, str_field};
use crate::errors::Result;
use crate::event_data::{Datum, DatumKind, EventData};

pub const DATA_TYPE: &str = "linux:utmp:event";

/// Extracts login endpoints from a wtmp record: the connecting address
/// and reporting name on the source side, the receiving host and the
/// logged-in account on the target side.
pub fn parse(record: &Value) -> Result<EventData> {
    let mut data = EventData::new();
    data.add(Datum::target(
        DatumKind::StorageOrigin,
        origin::storage_origin(record)?,
    ));

    if let Some(hostname) = str_field(record, "hostname") {
        data.add(Datum::target(DatumKind::MachineName, hostname));
    }

    // The address is serialized either flat or wrapped in an object.
    let ip_address = match record.get("ip_address") {
        Some(Value::Object(fields)) => fields.get("stream").and_then(Value::as_str),
        Some(Value::String(ip)) => Some(ip.as_str()),
        _ => None,
    };
    if let Some(ip_address) = ip_address {
        data.add(Datum::source(DatumKind::Ip, ip_address));
    }

    if let Some(computer_name) = str_field(record, "computer_name") {
        data.add(Datum::source(DatumKind::MachineName, computer_name));
    }
    if let Some(user) = str_field(record, "user") {
        data.add(Datum::target(DatumKind::UserName, user));
    }
    Ok(data)
}
