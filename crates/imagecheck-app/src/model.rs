// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use std::collections::BTreeMap;

/// Column names from the first retained line, in file order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Header(Vec<String>);

impl Header {
    pub fn new(names: Vec<String>) -> Self {
        Self(names)
    }

    pub fn names(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, String> {
        self.0.iter()
    }
}

impl<'a> IntoIterator for &'a Header {
    type Item = &'a String;
    type IntoIter = std::slice::Iter<'a, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// One data line keyed by column name, in header order. Every value is a
/// string.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Row(Vec<(String, String)>);

impl Row {
    /// Zips `values` positionally with `header`. Missing trailing values become
    /// empty strings and extra values are dropped. A repeated column name keeps
    /// its first position and the value of its last occurrence.
    pub fn from_fields(header: &Header, values: Vec<String>) -> Self {
        let mut values = values.into_iter();
        let mut row = Self::default();
        for name in header {
            row.insert(name, values.next().unwrap_or_default());
        }
        row
    }

    fn insert(&mut self, name: &str, value: String) {
        match self.0.iter_mut().find(|(existing, _)| existing == name) {
            Some((_, slot)) => *slot = value,
            None => self.0.push((name.to_owned(), value)),
        }
    }

    /// Value for `column`, or `""` when the row has no such column.
    pub fn get(&self, column: &str) -> &str {
        self.0
            .iter()
            .find(|(name, _)| name == column)
            .map_or("", |(_, value)| value.as_str())
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &str)> + '_ {
        self.0
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Serialize for Row {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (name, value) in &self.0 {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

impl<const N: usize> From<[(&str, &str); N]> for Row {
    fn from(pairs: [(&str, &str); N]) -> Self {
        let mut row = Self::default();
        for (name, value) in pairs {
            row.insert(name, value.to_owned());
        }
        row
    }
}

/// The header and rows produced by one successful parse.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Catalog {
    pub header: Header,
    pub rows: Vec<Row>,
}

/// Single-value constraints keyed by descriptive column.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FilterSet(BTreeMap<String, String>);

impl FilterSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the filter for `column`. An empty value removes it. Returns
    /// whether the set changed.
    pub fn set(&mut self, column: &str, value: &str) -> bool {
        if value.is_empty() {
            return self.remove(column);
        }
        match self.0.get(column) {
            Some(current) if current == value => false,
            _ => {
                self.0.insert(column.to_owned(), value.to_owned());
                true
            }
        }
    }

    pub fn remove(&mut self, column: &str) -> bool {
        self.0.remove(column).is_some()
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }

    pub fn get(&self, column: &str) -> Option<&str> {
        self.0.get(column).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0
            .iter()
            .map(|(column, value)| (column.as_str(), value.as_str()))
    }
}

impl<const N: usize> From<[(&str, &str); N]> for FilterSet {
    fn from(pairs: [(&str, &str); N]) -> Self {
        let mut filters = Self::new();
        for (column, value) in pairs {
            filters.set(column, value);
        }
        filters
    }
}

/// Columns used for grouping, in the order they were selected.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GroupKeys(Vec<String>);

impl GroupKeys {
    pub fn new() -> Self {
        Self::default()
    }

    /// Removes `column` when present, appends it otherwise. Returns whether the
    /// column is active afterwards.
    pub fn toggle(&mut self, column: &str) -> bool {
        if let Some(index) = self.0.iter().position(|key| key == column) {
            self.0.remove(index);
            false
        } else {
            self.0.push(column.to_owned());
            true
        }
    }

    pub fn contains(&self, column: &str) -> bool {
        self.0.iter().any(|key| key == column)
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<const N: usize> From<[&str; N]> for GroupKeys {
    fn from(columns: [&str; N]) -> Self {
        let mut keys = Self::new();
        for column in columns {
            if !keys.contains(column) {
                keys.toggle(column);
            }
        }
        keys
    }
}

/// Outcome of fetching one row's image through the relay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ImageStatus {
    Unchecked,
    Missing,
    Available { content_type: String },
    Broken { reason: String },
}

impl ImageStatus {
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Unchecked => "unchecked",
            Self::Missing => "no image",
            Self::Available { .. } => "ok",
            Self::Broken { .. } => "blocked",
        }
    }

    pub const fn is_broken(&self) -> bool {
        matches!(self, Self::Broken { .. })
    }
}
