//! Per-table view binding.
//!
//! A [`ConfiguredTable`] names the view that serves a logical table and,
//! optionally, per-partition overrides keyed by the value of one row
//! property. Resolution never fails: an incomplete binding falls back to the
//! default view and reports itself through
//! [`ConfiguredTable::is_any_view_null_or_empty`].

use rtable_common::names_equal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// View binding for one logical table (or for every table, when
/// `use_as_default` is set).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfiguredTable {
    /// Table name. For a default binding this may be a placeholder such as `*`.
    pub table_name: String,

    /// Default view. Empty only while the table is being (re)configured.
    pub view_name: String,

    /// Whether the table is being converted from a plain table into the
    /// replicated scheme.
    #[serde(default)]
    pub convert_to_rtable: bool,

    /// Use this binding for any table that has no binding of its own.
    #[serde(default)]
    pub use_as_default: bool,

    /// Name of the row property whose value selects a partition override.
    #[serde(default)]
    pub partition_on_property: Option<String>,

    /// Partition value -> view name.
    #[serde(default)]
    pub partitions_to_view_map: Option<BTreeMap<String, String>>,
}

impl ConfiguredTable {
    /// A plain binding of `table_name` to `view_name` with no overrides.
    pub fn new(table_name: impl Into<String>, view_name: impl Into<String>) -> Self {
        Self {
            table_name: table_name.into(),
            view_name: view_name.into(),
            ..Self::default()
        }
    }

    /// Enable per-partition overrides on `property`.
    pub fn with_partitions<K, V>(
        mut self,
        property: impl Into<String>,
        overrides: impl IntoIterator<Item = (K, V)>,
    ) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.partition_on_property = Some(property.into());
        self.partitions_to_view_map = Some(
            overrides
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        );
        self
    }

    /// The partitioning property, if one is configured and non-empty.
    pub fn partition_property(&self) -> Option<&str> {
        self.partition_on_property
            .as_deref()
            .filter(|p| !p.is_empty())
    }

    /// Map entries with a non-empty partition key. Entries with an empty key
    /// never take part in routing.
    fn keyed_entries(&self) -> impl Iterator<Item = (&str, &str)> {
        self.partitions_to_view_map
            .iter()
            .flatten()
            .filter(|(k, _)| !k.is_empty())
            .map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Returns `true` if this binding routes any traffic to `view_name`,
    /// either as its default view or through a partition override.
    pub fn is_view_referenced(&self, view_name: &str) -> bool {
        if view_name.is_empty() {
            return false;
        }

        if !self.view_name.is_empty() && names_equal(&self.view_name, view_name) {
            return true;
        }

        if self.partition_property().is_none() {
            return false;
        }

        self.keyed_entries()
            .any(|(_, view)| names_equal(view, view_name))
    }

    /// Returns `true` if the default view is empty or some partition override
    /// has a key but no view.
    ///
    /// | key | view | |
    /// |-----|------|-|
    /// | `""` | any | ignored |
    /// | `"X"` | `""` | incomplete |
    /// | `"Y"` | `"v"` | fine |
    pub fn is_any_view_null_or_empty(&self) -> bool {
        if self.view_name.is_empty() {
            return true;
        }

        self.keyed_entries().any(|(_, view)| view.is_empty())
    }

    /// The view serving `partition`. Pass `""` for the table-wide default.
    ///
    /// Overrides only apply when fully specified; anything else falls back to
    /// the default view.
    pub fn get_view_for_partition(&self, partition: &str) -> &str {
        if partition.is_empty() || !self.is_table_partitioned() {
            return self.view_name.as_str();
        }

        match self
            .keyed_entries()
            .find(|(key, _)| names_equal(key, partition))
        {
            Some((_, view)) if !view.is_empty() => view,
            _ => self.view_name.as_str(),
        }
    }

    /// The table-wide default view.
    pub fn default_view(&self) -> &str {
        self.get_view_for_partition("")
    }

    /// Returns `true` if partitioning is enabled and at least one override
    /// maps a non-empty key to a non-empty view.
    pub fn is_table_partitioned(&self) -> bool {
        if self.partition_property().is_none() {
            return false;
        }

        self.keyed_entries().any(|(_, view)| !view.is_empty())
    }

    /// Every distinct non-empty view this binding can route to.
    pub fn referenced_views(&self) -> Vec<&str> {
        let mut views: Vec<&str> = Vec::new();
        let overrides = self
            .partition_property()
            .map(|_| self.keyed_entries().map(|(_, v)| v))
            .into_iter()
            .flatten();

        for view in std::iter::once(self.view_name.as_str()).chain(overrides) {
            if !view.is_empty() && !views.iter().any(|v| names_equal(v, view)) {
                views.push(view);
            }
        }
        views
    }
}
