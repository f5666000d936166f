// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, bail};
use imagecheck_app::{AppCommand, AppState, ImageStatus, Row, ViewModel};
use imagecheck_relay::{Client, PLACEHOLDER_SVG, PLACEHOLDER_TEXT};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

/// Non-interactive listing of the grouped view.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListRequest {
    pub filters: Vec<(String, String)>,
    pub group_by: Vec<String>,
    pub probe: bool,
    pub json: bool,
}

#[derive(Debug, Serialize)]
struct Report<'a> {
    source: &'a str,
    total_rows: usize,
    visible_rows: usize,
    image_column: Option<&'a str>,
    descriptive_columns: &'a [String],
    filters: BTreeMap<&'a str, &'a str>,
    group_by: &'a [String],
    groups: Vec<ReportGroup<'a>>,
}

#[derive(Debug, Serialize)]
struct ReportGroup<'a> {
    label: &'a str,
    items: Vec<ReportItem<'a>>,
}

#[derive(Debug, Serialize)]
struct ReportItem<'a> {
    fields: &'a Row,
    image_url: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    relay_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    image: Option<&'a ImageStatus>,
    /// Stand-in markup for an image the relay could not deliver.
    #[serde(skip_serializing_if = "Option::is_none")]
    placeholder: Option<&'static str>,
}

/// Applies `request` to a freshly loaded `state`, rejecting columns the
/// catalog cannot filter or group by.
pub fn apply_request(state: &mut AppState, request: &ListRequest) -> Result<()> {
    if let Some(error) = &state.error {
        bail!("{error}");
    }
    let descriptive = ViewModel::derive(state).classification.descriptive_columns;
    let check = |flag: &str, column: &str| -> Result<()> {
        if descriptive.iter().any(|name| name == column) {
            return Ok(());
        }
        bail!(
            "{flag} {column:?} is not a descriptive column; choose one of: {}",
            descriptive.join(", ")
        )
    };

    for (column, value) in &request.filters {
        check("--filter", column)?;
        state.dispatch(AppCommand::SetFilter {
            column: column.clone(),
            value: value.clone(),
        });
    }
    for column in &request.group_by {
        check("--group-by", column)?;
        if !state.group_keys.contains(column) {
            state.dispatch(AppCommand::ToggleGroupBy(column.clone()));
        }
    }
    Ok(())
}

/// Probes every distinct image of the visible rows.
pub fn probe_visible(state: &AppState, client: &Client) -> BTreeMap<String, ImageStatus> {
    let view = ViewModel::derive(state);
    let urls = view
        .filtered
        .iter()
        .map(|&row| view.image_url(row))
        .filter(|url| !url.trim().is_empty())
        .collect::<BTreeSet<_>>();
    tracing::debug!(count = urls.len(), "probing listed images");
    client.probe_all(urls).into_iter().collect()
}

pub fn render(
    state: &AppState,
    relay_base: Option<&str>,
    statuses: &BTreeMap<String, ImageStatus>,
    json: bool,
) -> Result<String> {
    let view = ViewModel::derive(state);
    if json {
        render_json(state, &view, relay_base, statuses)
    } else {
        Ok(render_text(state, &view, relay_base, statuses))
    }
}

fn render_json(
    state: &AppState,
    view: &ViewModel<'_>,
    relay_base: Option<&str>,
    statuses: &BTreeMap<String, ImageStatus>,
) -> Result<String> {
    let groups = view
        .grouped
        .groups
        .iter()
        .map(|group| ReportGroup {
            label: &group.label,
            items: group
                .rows
                .iter()
                .map(|&row| {
                    let image_url = view.image_url(row);
                    let image = statuses.get(image_url);
                    ReportItem {
                        fields: row,
                        image_url,
                        relay_url: relay_for(relay_base, image_url),
                        image,
                        placeholder: image
                            .filter(|status| status.is_broken())
                            .map(|_| PLACEHOLDER_SVG),
                    }
                })
                .collect(),
        })
        .collect();

    let report = Report {
        source: state.source.as_deref().unwrap_or(""),
        total_rows: view.total_rows,
        visible_rows: view.visible_rows(),
        image_column: view.classification.image_column.as_deref(),
        descriptive_columns: &view.classification.descriptive_columns,
        filters: state.filters.iter().collect(),
        group_by: state.group_keys.as_slice(),
        groups,
    };
    let mut out = serde_json::to_string_pretty(&report).context("encode report as JSON")?;
    out.push('\n');
    Ok(out)
}

fn render_text(
    state: &AppState,
    view: &ViewModel<'_>,
    relay_base: Option<&str>,
    statuses: &BTreeMap<String, ImageStatus>,
) -> String {
    let source = state.source.as_deref().unwrap_or("catalog");
    let mut lines = vec![format!(
        "{source}: {} of {} images, {} active filters",
        view.visible_rows(),
        view.total_rows,
        view.active_filter_count
    )];
    if view.classification.image_column.is_none() {
        lines.push("no image column found".to_owned());
    }

    if view.filtered.is_empty() {
        lines.push("No images match the current filters".to_owned());
        return lines.join("\n") + "\n";
    }

    let grouped = !state.group_keys.is_empty();
    for group in &view.grouped.groups {
        let indent = if grouped {
            lines.push(format!("== {} ({} images) ==", group.label, group.rows.len()));
            "  "
        } else {
            ""
        };
        for &row in &group.rows {
            let summary = view
                .classification
                .descriptive_columns
                .iter()
                .map(|column| format!("{column}: {}", row.get(column)))
                .collect::<Vec<_>>()
                .join(" | ");
            lines.push(format!("{indent}{summary}"));

            let image_url = view.image_url(row);
            if image_url.is_empty() {
                lines.push(format!("{indent}  image: (none)"));
                continue;
            }
            let marker = match statuses.get(image_url) {
                Some(ImageStatus::Available { content_type }) => format!(" [ok {content_type}]"),
                Some(ImageStatus::Broken { reason }) => format!(" [{PLACEHOLDER_TEXT}: {reason}]"),
                _ => String::new(),
            };
            lines.push(format!("{indent}  image: {image_url}{marker}"));
            if let Some(relay) = relay_for(relay_base, image_url) {
                lines.push(format!("{indent}  relay: {relay}"));
            }
        }
    }
    lines.join("\n") + "\n"
}

fn relay_for(relay_base: Option<&str>, image_url: &str) -> Option<String> {
    match relay_base {
        Some(base) if !image_url.is_empty() => Some(imagecheck_relay::relay_url(base, image_url)),
        _ => None,
    }
}
