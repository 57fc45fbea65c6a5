//! Physical and logical row format.

use rtable_common::{
    is_replication_property, ViewId, PROP_LOCK_ACQUISITION, PROP_ROW_LOCK, PROP_TOMBSTONE,
    PROP_VERSION, PROP_VIEW_ID,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A typed property value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
    Bool(bool),
    Int64(i64),
    Double(f64),
    String(String),
    Binary(Vec<u8>),
}

impl PropertyValue {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int64(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }
}

impl From<&str> for PropertyValue {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<i64> for PropertyValue {
    fn from(v: i64) -> Self {
        Self::Int64(v)
    }
}

impl From<bool> for PropertyValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

/// Replication metadata carried as typed columns by natively replicated rows.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplicationColumns {
    /// View under which the row was last written.
    #[serde(default)]
    pub view_id: ViewId,
    /// Logical version, bumped on every replicated write.
    #[serde(default)]
    pub version: i64,
    /// Soft-delete marker.
    #[serde(default)]
    pub tombstone: bool,
    #[serde(default)]
    pub row_lock: bool,
    /// Millis since epoch at which `row_lock` was taken. Signed, matching
    /// the `Int64` property it is stored as on property-bag rows.
    #[serde(default)]
    pub lock_acquired_ms: Option<i64>,
}

/// A row exactly as stored on a replica.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawRow {
    pub partition_key: String,
    pub row_key: String,
    /// Storage-native version token. Replaced in place by the virtual token
    /// before the row is handed to a caller.
    #[serde(default)]
    pub etag: String,
    /// Millis since epoch of the last physical write.
    #[serde(default)]
    pub timestamp_ms: u64,
    /// Typed replication columns (native replicated rows only).
    #[serde(default)]
    pub replication: ReplicationColumns,
    /// Payload. Property-bag rows also keep their replication metadata here
    /// under `_rtable_`-prefixed names.
    #[serde(default)]
    pub properties: BTreeMap<String, PropertyValue>,
}

impl RawRow {
    pub fn new(partition_key: impl Into<String>, row_key: impl Into<String>) -> Self {
        Self {
            partition_key: partition_key.into(),
            row_key: row_key.into(),
            etag: String::new(),
            timestamp_ms: 0,
            replication: ReplicationColumns::default(),
            properties: BTreeMap::new(),
        }
    }

    pub fn with_property(mut self, name: impl Into<String>, value: impl Into<PropertyValue>) -> Self {
        self.properties.insert(name.into(), value.into());
        self
    }

    pub fn with_etag(mut self, etag: impl Into<String>) -> Self {
        self.etag = etag.into();
        self
    }

    /// Set the typed replication columns.
    pub fn with_replication(mut self, replication: ReplicationColumns) -> Self {
        self.replication = replication;
        self
    }

    /// Write `replication` into the property bag, the way property-bag rows
    /// carry it.
    pub fn with_replication_properties(mut self, replication: &ReplicationColumns) -> Self {
        self.properties
            .insert(PROP_VIEW_ID.to_string(), replication.view_id.get().into());
        self.properties
            .insert(PROP_VERSION.to_string(), replication.version.into());
        self.properties
            .insert(PROP_TOMBSTONE.to_string(), replication.tombstone.into());
        self.properties
            .insert(PROP_ROW_LOCK.to_string(), replication.row_lock.into());
        if let Some(ms) = replication.lock_acquired_ms {
            self.properties
                .insert(PROP_LOCK_ACQUISITION.to_string(), PropertyValue::Int64(ms));
        }
        self
    }

    pub fn property(&self, name: &str) -> Option<&PropertyValue> {
        self.properties.get(name)
    }

    /// Boolean property, `None` if absent or not a bool.
    pub fn bool_property(&self, name: &str) -> Option<bool> {
        self.property(name).and_then(PropertyValue::as_bool)
    }

    /// Int64 property, `None` if absent or not an integer.
    pub fn int64_property(&self, name: &str) -> Option<i64> {
        self.property(name).and_then(PropertyValue::as_i64)
    }

    /// Project the row for a caller: drops replication columns and every
    /// `_rtable_` property.
    pub fn into_logical(self) -> LogicalRow {
        let mut properties = self.properties;
        properties.retain(|name, _| !is_replication_property(name));
        LogicalRow {
            partition_key: self.partition_key,
            row_key: self.row_key,
            etag: self.etag,
            timestamp_ms: self.timestamp_ms,
            properties,
        }
    }
}

/// A row as seen by callers of a replicated table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogicalRow {
    pub partition_key: String,
    pub row_key: String,
    /// Virtual version token.
    pub etag: String,
    pub timestamp_ms: u64,
    pub properties: BTreeMap<String, PropertyValue>,
}

impl LogicalRow {
    pub fn property(&self, name: &str) -> Option<&PropertyValue> {
        self.properties.get(name)
    }
}

/// Declared shape of the rows a scan reads.
///
/// The shapes trace the conversion of a plain table into a replicated one:
/// property-bag rows carrying the init marker while conversion runs,
/// property-bag rows already stamped, and natively replicated rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RowShape {
    /// Natively replicated row with typed replication columns.
    Replicated,
    /// Property-bag row.
    Dynamic,
    /// Property-bag row read with the conversion init marker. A kind of
    /// `Dynamic`.
    InitDynamic,
    /// A row type the replication layer cannot read. Carries its type name.
    Unknown(&'static str),
}

impl RowShape {
    /// Returns `true` for the native replicated shape and its kinds.
    pub fn derives_from_replicated(self) -> bool {
        matches!(self, Self::Replicated)
    }

    /// Returns `true` for the property-bag shape and its kinds.
    pub fn derives_from_dynamic(self) -> bool {
        matches!(self, Self::Dynamic | Self::InitDynamic)
    }

    pub fn type_name(self) -> &'static str {
        match self {
            Self::Replicated => "ReplicatedRow",
            Self::Dynamic => "DynamicRow",
            Self::InitDynamic => "InitDynamicRow",
            Self::Unknown(name) => name,
        }
    }

    /// Parse a shape name as given on a command line (`replicated`,
    /// `dynamic`, `init-dynamic`).
    pub fn parse(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "replicated" => Some(Self::Replicated),
            "dynamic" => Some(Self::Dynamic),
            "init-dynamic" | "init_dynamic" => Some(Self::InitDynamic),
            _ => None,
        }
    }
}

impl std::fmt::Display for RowShape {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.type_name())
    }
}
