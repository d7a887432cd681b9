//! Parser for BSM audit trail records.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;

use super::{origin, str_field};
use crate::errors::{HopTraceError, Result};
use crate::event_data::{Datum, DatumKind, EventData};

pub const DATA_TYPE: &str = "bsm:event";

const OPENSSH_LOGIN: &str = "OpenSSH login (32800)";

fn success_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^.*BSM_TOKEN_RETURN32: Success*.").expect("pattern compiles")
    })
}

fn user_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"BSM_TOKEN_TEXT: successful login (\S+)\]").expect("pattern compiles")
    })
}

fn token_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\[BSM_TOKEN_SUBJECT32_EX: (.*?)\]").expect("pattern compiles")
    })
}

/// Parses a successful OpenSSH login out of an audit record. Any other
/// audit event yields an empty result.
pub fn parse(record: &Value) -> Result<EventData> {
    let mut data = EventData::new();
    data.add(Datum::target(
        DatumKind::StorageOrigin,
        origin::storage_origin(record)?,
    ));

    let event_type = str_field(record, "event_type");
    let message = str_field(record, "message").unwrap_or("");
    if event_type != Some(OPENSSH_LOGIN) || !success_re().is_match(message) {
        return Ok(EventData::new());
    }

    if let Some(user) = user_re().captures(message) {
        data.add(Datum::target(DatumKind::UserName, &user[1]));
    }

    let tokens = subject_tokens(message)?;
    if let Some(ip) = tokens.get("terminal_ip") {
        data.add(Datum::source(DatumKind::Ip, ip.as_str()));
    }
    if let Some(uid) = tokens.get("uid") {
        data.add(Datum::target(DatumKind::UserId, uid.as_str()));
    }
    Ok(data)
}

/// Splits the `key(value)` pairs inside the SUBJECT32_EX token list.
fn subject_tokens(message: &str) -> Result<BTreeMap<String, String>> {
    let mut tokens = BTreeMap::new();
    if let Some(raw) = token_re().captures(message) {
        for token in raw[1].split(',') {
            let trimmed = token.trim_matches(|c| c == ' ' || c == ')');
            let parts: Vec<&str> = trimmed.split('(').collect();
            if parts.len() != 2 {
                return Err(HopTraceError::EventParse {
                    data_type: DATA_TYPE.to_string(),
                    message: format!("malformed subject token {:?}", token),
                });
            }
            tokens.insert(parts[0].to_string(), parts[1].to_string());
        }
    }
    Ok(tokens)
}
