//! Typed datums extracted from heterogeneous forensic records.
//!
//! A parser reduces a raw timeline record to a handful of [`Datum`] values,
//! each describing one property of either the source or the target of a
//! remote access. [`EventData`] collects them, keyed by direction and kind,
//! and silently drops values that carry no forensic signal.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::errors::{HopTraceError, Result};

/// The property classes a datum can describe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DatumKind {
    Ip,
    MachineName,
    StorageOrigin,
    UserId,
    UserName,
}

impl DatumKind {
    pub fn all() -> Vec<DatumKind> {
        vec![
            DatumKind::Ip,
            DatumKind::MachineName,
            DatumKind::StorageOrigin,
            DatumKind::UserId,
            DatumKind::UserName,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DatumKind::Ip => "ip",
            DatumKind::MachineName => "machine_name",
            DatumKind::StorageOrigin => "storage_origin",
            DatumKind::UserId => "user_id",
            DatumKind::UserName => "user_name",
        }
    }
}

impl fmt::Display for DatumKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Which side of a remote access a datum describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Direction {
    Source,
    Target,
}

/// Index key for a datum: its direction together with its kind.
pub type FullName = (Direction, DatumKind);

/// One extracted property of an access, such as the target machine name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Datum {
    pub direction: Direction,
    pub kind: DatumKind,
    pub value: String,
}

impl Datum {
    pub fn new(direction: Direction, kind: DatumKind, value: impl Into<String>) -> Self {
        Self {
            direction,
            kind,
            value: value.into(),
        }
    }

    pub fn source(kind: DatumKind, value: impl Into<String>) -> Self {
        Self::new(Direction::Source, kind, value)
    }

    pub fn target(kind: DatumKind, value: impl Into<String>) -> Self {
        Self::new(Direction::Target, kind, value)
    }

    /// Builds a datum from separate source/target flags, rejecting any
    /// combination that does not name exactly one direction.
    pub fn from_flags(
        kind: DatumKind,
        source: bool,
        target: bool,
        value: impl Into<String>,
    ) -> Result<Self> {
        let direction = match (source, target) {
            (true, false) => Direction::Source,
            (false, true) => Direction::Target,
            _ => return Err(HopTraceError::ConflictingDirection { kind }),
        };
        Ok(Self::new(direction, kind, value))
    }

    pub fn full_name(&self) -> FullName {
        (self.direction, self.kind)
    }
}

/// Identifier tying a graph edge back to the record that produced it.
///
/// Records carry either a numeric timesketch id or a string uuid; events
/// without either get a synthetic counter value. Serializes transparently
/// as a bare number or string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EventId {
    Int(i64),
    Str(String),
}

impl From<i64> for EventId {
    fn from(value: i64) -> Self {
        EventId::Int(value)
    }
}

impl From<&str> for EventId {
    fn from(value: &str) -> Self {
        EventId::Str(value.to_string())
    }
}

impl From<String> for EventId {
    fn from(value: String) -> Self {
        EventId::Str(value)
    }
}

/// The datums extracted from one record, plus the record's identity.
///
/// At most one datum is kept per (direction, kind) pair; a later add
/// overwrites. Empty and blacklisted values never make it in.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventData {
    index: BTreeMap<FullName, Datum>,
    pub event_id: Option<EventId>,
    pub timestamp: Option<i64>,
    pub event_type: Option<String>,
}

impl EventData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_data(data: impl IntoIterator<Item = Datum>) -> Self {
        let mut event = Self::new();
        for datum in data {
            event.add(datum);
        }
        event
    }

    pub fn with_event_id(mut self, event_id: impl Into<EventId>) -> Self {
        self.event_id = Some(event_id.into());
        self
    }

    pub fn with_timestamp(mut self, timestamp: i64) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Stores a datum under its full name, dropping values with no
    /// forensic signal.
    pub fn add(&mut self, datum: Datum) {
        if datum.value.is_empty() {
            return;
        }
        if blacklist(datum.kind).contains(&datum.value.as_str()) {
            return;
        }
        self.index.insert(datum.full_name(), datum);
    }

    pub fn get(&self, direction: Direction, kind: DatumKind) -> Option<&Datum> {
        self.index.get(&(direction, kind))
    }

    pub fn get_mut(&mut self, direction: Direction, kind: DatumKind) -> Option<&mut Datum> {
        self.index.get_mut(&(direction, kind))
    }

    pub fn value_of(&self, direction: Direction, kind: DatumKind) -> Option<&str> {
        self.get(direction, kind).map(|datum| datum.value.as_str())
    }

    /// Iterates the stored datums in a fixed (direction, kind) order.
    pub fn items(&self) -> impl Iterator<Item = &Datum> {
        self.index.values()
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }
}

/// Placeholder values that must never become graph nodes.
fn blacklist(kind: DatumKind) -> &'static [&'static str] {
    match kind {
        DatumKind::Ip => &["127.0.0.1", "localhost", "-", "::1"],
        DatumKind::MachineName => &["127.0.0.1", "localhost", "-"],
        DatumKind::UserName => &["N/A", "-"],
        DatumKind::UserId | DatumKind::StorageOrigin => &[],
    }
}
