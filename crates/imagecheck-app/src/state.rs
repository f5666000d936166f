// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use crate::{Catalog, FilterSet, GroupKeys, ParseError, classify, parse_bytes};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Loaded,
    Error,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AppState {
    pub catalog: Option<Catalog>,
    pub source: Option<String>,
    pub filters: FilterSet,
    pub group_keys: GroupKeys,
    pub error: Option<ParseError>,
    pub status_line: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppCommand {
    Load { source: String, bytes: Vec<u8> },
    SetFilter { column: String, value: String },
    ClearFilter(String),
    ClearAllFilters,
    ToggleGroupBy(String),
    DismissError,
    SetStatus(String),
    ClearStatus,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppEvent {
    CatalogLoaded {
        source: String,
        columns: usize,
        rows: usize,
    },
    LoadFailed(ParseError),
    FilterChanged {
        column: String,
        value: Option<String>,
    },
    FiltersCleared,
    GroupingChanged(Vec<String>),
    ErrorDismissed,
    StatusUpdated(String),
    StatusCleared,
}

impl AppState {
    pub fn phase(&self) -> Phase {
        if self.error.is_some() {
            Phase::Error
        } else if self.catalog.is_some() {
            Phase::Loaded
        } else {
            Phase::Idle
        }
    }

    /// Consumes the state and returns its successor along with the events the
    /// command produced.
    pub fn reduce(mut self, command: AppCommand) -> (Self, Vec<AppEvent>) {
        let events = self.dispatch(command);
        (self, events)
    }

    pub fn dispatch(&mut self, command: AppCommand) -> Vec<AppEvent> {
        match command {
            AppCommand::Load { source, bytes } => self.load(source, &bytes),
            AppCommand::SetFilter { column, value } => self.set_filter(&column, &value),
            AppCommand::ClearFilter(column) => {
                if self.filters.remove(&column) {
                    vec![AppEvent::FilterChanged {
                        column,
                        value: None,
                    }]
                } else {
                    Vec::new()
                }
            }
            AppCommand::ClearAllFilters => {
                if self.filters.is_empty() {
                    return Vec::new();
                }
                self.filters.clear();
                vec![AppEvent::FiltersCleared, self.set_status("filters cleared")]
            }
            AppCommand::ToggleGroupBy(column) => self.toggle_group_by(&column),
            AppCommand::DismissError => {
                if self.error.take().is_some() {
                    vec![AppEvent::ErrorDismissed]
                } else {
                    Vec::new()
                }
            }
            AppCommand::SetStatus(message) => vec![self.set_status(&message)],
            AppCommand::ClearStatus => {
                self.status_line = None;
                vec![AppEvent::StatusCleared]
            }
        }
    }

    fn load(&mut self, source: String, bytes: &[u8]) -> Vec<AppEvent> {
        match parse_bytes(bytes) {
            Ok(catalog) => {
                let columns = catalog.header.len();
                let rows = catalog.rows.len();
                tracing::debug!(%source, columns, rows, "catalog loaded");

                self.catalog = Some(catalog);
                self.source = Some(source.clone());
                self.filters.clear();
                self.group_keys.clear();
                self.error = None;
                let status = format!("loaded {rows} rows from {source}");
                vec![
                    AppEvent::CatalogLoaded {
                        source,
                        columns,
                        rows,
                    },
                    self.set_status(&status),
                ]
            }
            Err(error) => {
                // The previous catalog stays on screen under the error banner.
                tracing::warn!(%source, %error, "catalog load failed");
                self.error = Some(error.clone());
                vec![AppEvent::LoadFailed(error)]
            }
        }
    }

    fn set_filter(&mut self, column: &str, value: &str) -> Vec<AppEvent> {
        if !self.is_descriptive(column) {
            tracing::warn!(column, "filter rejected for non-descriptive column");
            return vec![self.set_status(&format!("cannot filter on {column:?}"))];
        }

        if !self.filters.set(column, value) {
            return Vec::new();
        }
        vec![AppEvent::FilterChanged {
            column: column.to_owned(),
            value: self.filters.get(column).map(str::to_owned),
        }]
    }

    fn toggle_group_by(&mut self, column: &str) -> Vec<AppEvent> {
        if !self.is_descriptive(column) {
            tracing::warn!(column, "group-by rejected for non-descriptive column");
            return vec![self.set_status(&format!("cannot group by {column:?}"))];
        }

        self.group_keys.toggle(column);
        vec![AppEvent::GroupingChanged(self.group_keys.as_slice().to_vec())]
    }

    fn is_descriptive(&self, column: &str) -> bool {
        self.catalog
            .as_ref()
            .is_some_and(|catalog| classify(&catalog.header).is_descriptive(column))
    }

    fn set_status(&mut self, message: &str) -> AppEvent {
        self.status_line = Some(message.to_owned());
        AppEvent::StatusUpdated(message.to_owned())
    }
}
