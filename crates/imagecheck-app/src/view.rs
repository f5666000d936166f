// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use crate::{AppState, FilterSet, GroupKeys, Header, Row};
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};

/// Label of the single group produced when no group keys are active.
pub const ALL_GROUP_LABEL: &str = "all";

const IMAGE_COLUMN_MARKERS: [&str; 3] = ["image", "url", "link"];

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ColumnClassification {
    pub image_column: Option<String>,
    pub descriptive_columns: Vec<String>,
}

impl ColumnClassification {
    pub fn is_descriptive(&self, column: &str) -> bool {
        self.descriptive_columns.iter().any(|name| name == column)
    }
}

pub fn is_image_column(name: &str) -> bool {
    let lower = name.to_lowercase();
    IMAGE_COLUMN_MARKERS
        .iter()
        .any(|marker| lower.contains(marker))
}

/// Splits the header into the canonical image column (first image-bearing
/// name) and the descriptive columns, both in header order.
pub fn classify(header: &Header) -> ColumnClassification {
    let mut classification = ColumnClassification::default();
    for name in header {
        if is_image_column(name) {
            if classification.image_column.is_none() {
                classification.image_column = Some(name.clone());
            }
        } else {
            classification.descriptive_columns.push(name.clone());
        }
    }
    classification
}

/// The row's image value, or `""` when the catalog has no image column.
pub fn image_url<'a>(row: &'a Row, classification: &ColumnClassification) -> &'a str {
    classification
        .image_column
        .as_deref()
        .map_or("", |column| row.get(column))
}

pub fn apply_filters<'a>(rows: &'a [Row], filters: &FilterSet) -> Vec<&'a Row> {
    rows.iter()
        .filter(|row| {
            filters
                .iter()
                .filter(|(_, value)| !value.is_empty())
                .all(|(column, value)| row.get(column) == value)
        })
        .collect()
}

/// Unique non-empty values of `column`, sorted by UTF-16 code unit so that
/// characters outside the Basic Multilingual Plane sort before U+E000..U+FFFF.
pub fn distinct_values<'a, I>(rows: I, column: &str) -> Vec<String>
where
    I: IntoIterator<Item = &'a Row>,
{
    let mut values = rows
        .into_iter()
        .map(|row| row.get(column))
        .filter(|value| !value.is_empty())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .map(str::to_owned)
        .collect::<Vec<_>>();
    values.sort_by(|a, b| a.encode_utf16().cmp(b.encode_utf16()));
    values
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Group<'a> {
    pub label: String,
    pub rows: Vec<&'a Row>,
}

/// Groups in the order their labels were first seen.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct GroupedView<'a> {
    pub groups: Vec<Group<'a>>,
}

impl<'a> GroupedView<'a> {
    pub fn labels(&self) -> Vec<&str> {
        self.groups.iter().map(|group| group.label.as_str()).collect()
    }

    pub fn get(&self, label: &str) -> Option<&Group<'a>> {
        self.groups.iter().find(|group| group.label == label)
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }
}

pub fn group_label(row: &Row, keys: &GroupKeys) -> String {
    keys.as_slice()
        .iter()
        .map(|key| format!("{key}: {}", row.get(key)))
        .collect::<Vec<_>>()
        .join(" | ")
}

/// Partitions `rows` by their composite label over `keys`, preserving row
/// order inside each group. Without keys every row lands in one
/// [`ALL_GROUP_LABEL`] group.
pub fn group<'a>(rows: &[&'a Row], keys: &GroupKeys) -> GroupedView<'a> {
    if keys.is_empty() {
        return GroupedView {
            groups: vec![Group {
                label: ALL_GROUP_LABEL.to_owned(),
                rows: rows.to_vec(),
            }],
        };
    }

    let mut groups: Vec<Group<'a>> = Vec::new();
    let mut index_by_label: HashMap<String, usize> = HashMap::new();
    for &row in rows {
        let label = group_label(row, keys);
        match index_by_label.get(&label) {
            Some(&index) => groups[index].rows.push(row),
            None => {
                index_by_label.insert(label.clone(), groups.len());
                groups.push(Group {
                    label,
                    rows: vec![row],
                });
            }
        }
    }
    GroupedView { groups }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FilterOptions {
    pub column: String,
    pub selected: Option<String>,
    pub values: Vec<String>,
}

/// Everything the gallery needs, derived from one [`AppState`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ViewModel<'a> {
    pub classification: ColumnClassification,
    pub filtered: Vec<&'a Row>,
    pub grouped: GroupedView<'a>,
    pub filter_options: Vec<FilterOptions>,
    pub total_rows: usize,
    pub active_filter_count: usize,
}

impl<'a> ViewModel<'a> {
    pub fn derive(state: &'a AppState) -> Self {
        let Some(catalog) = state.catalog.as_ref() else {
            return Self::default();
        };

        let classification = classify(&catalog.header);
        let filtered = apply_filters(&catalog.rows, &state.filters);
        let grouped = group(&filtered, &state.group_keys);
        let filter_options = classification
            .descriptive_columns
            .iter()
            .map(|column| FilterOptions {
                column: column.clone(),
                selected: state.filters.get(column).map(str::to_owned),
                values: distinct_values(&catalog.rows, column),
            })
            .collect();
        let active_filter_count = state
            .filters
            .iter()
            .filter(|(_, value)| !value.is_empty())
            .count();

        Self {
            classification,
            filtered,
            grouped,
            filter_options,
            total_rows: catalog.rows.len(),
            active_filter_count,
        }
    }

    pub fn visible_rows(&self) -> usize {
        self.filtered.len()
    }

    pub fn image_url(&self, row: &'a Row) -> &'a str {
        image_url(row, &self.classification)
    }

    pub fn options_for(&self, column: &str) -> Option<&FilterOptions> {
        self.filter_options
            .iter()
            .find(|options| options.column == column)
    }
}
