//! Parsers for syslog login records.
//!
//! Two shapes appear in the timelines: the stock sshd "Accepted password"
//! line and a dedicated ssh login event whose message sometimes runs the
//! user name straight into `from` without a separating space.

use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;

use super::{origin, str_field};
use crate::errors::Result;
use crate::event_data::{Datum, DatumKind, EventData};

pub const LINE_DATA_TYPE: &str = "syslog:line";
pub const SSH_LOGIN_DATA_TYPE: &str = "syslog:ssh:login";

fn password_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"^.*Accepted password for (?P<user>\S+) from (?P<ip>(?:[0-9]{1,3}\.){3}[0-9]{1,3}) port (?P<port>\d+).*",
        )
        .expect("pattern compiles")
    })
}

fn ssh_login_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"^.*Successful login of user: (?P<user>\S+)\s?from (?P<ip>(?:[0-9]{1,3}\.){3}[0-9]{1,3}):(?P<port>\d+).*",
        )
        .expect("pattern compiles")
    })
}

/// Parses an sshd "Accepted password" syslog line. Other syslog traffic
/// yields an empty result.
pub fn parse_line(record: &Value) -> Result<EventData> {
    let message = str_field(record, "message").unwrap_or("");
    let captures = match password_re().captures(message) {
        Some(captures) => captures,
        None => return Ok(EventData::new()),
    };

    let mut data = EventData::new();
    data.add(Datum::target(
        DatumKind::StorageOrigin,
        origin::storage_origin(record)?,
    ));
    data.add(Datum::target(DatumKind::UserName, &captures["user"]));
    data.add(Datum::source(DatumKind::Ip, &captures["ip"]));
    Ok(data)
}

/// Parses a dedicated ssh login event.
pub fn parse_ssh_login(record: &Value) -> Result<EventData> {
    let message = str_field(record, "message").unwrap_or("");
    let captures = match ssh_login_re().captures(message) {
        Some(captures) => captures,
        None => return Ok(EventData::new()),
    };

    let mut data = EventData::new();
    data.add(Datum::target(
        DatumKind::StorageOrigin,
        origin::storage_origin(record)?,
    ));
    data.add(Datum::target(
        DatumKind::MachineName,
        str_field(record, "hostname").unwrap_or("-"),
    ));
    data.add(Datum::target(DatumKind::UserName, &captures["user"]));
    data.add(Datum::source(DatumKind::Ip, &captures["ip"]));
    Ok(data)
}
