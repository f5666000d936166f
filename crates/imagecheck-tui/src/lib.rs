// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyModifiers};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use crossterm::{execute, terminal};
use imagecheck_app::{
    AppCommand, AppEvent, AppState, ColumnClassification, ImageStatus, Row, ViewModel,
};
use imagecheck_relay::{PLACEHOLDER_TEXT, relay_url};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::widgets::{Block, Borders, Clear, Paragraph, Wrap};
use std::collections::{BTreeSet, HashMap};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;
use std::time::Duration;

const PAGE_LINES: usize = 10;
const MAX_FILTER_LINES: usize = 8;
const EXPECTED_FORMAT: &str = "Base Model,Product Name,Paint Description,VRM,Image URL\n\
Defender,Defender 110,Silicon Silver,KR25NXP,https://...\n\
Range Rover,RR VELAR,Carpathian Grey,KR25RHY,https://...";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeEvent {
    pub batch_id: u64,
    pub image_url: String,
    pub status: ImageStatus,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InternalEvent {
    ClearStatus { token: u64 },
    Probe(ProbeEvent),
}

pub trait AppRuntime {
    fn read_catalog(&mut self, path: &Path) -> Result<Vec<u8>>;
    /// Relay prefix for image URLs, or `None` when the relay is disabled.
    fn relay_base(&self) -> Option<String>;
    fn probe_image(&mut self, image_url: &str) -> ImageStatus;
    fn spawn_probes(
        &mut self,
        batch_id: u64,
        image_urls: Vec<String>,
        tx: Sender<InternalEvent>,
    ) -> Result<()> {
        for image_url in image_urls {
            let status = self.probe_image(&image_url);
            tx.send(InternalEvent::Probe(ProbeEvent {
                batch_id,
                image_url,
                status,
            }))
            .map_err(|_| anyhow::anyhow!("probe event channel closed"))?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
struct ProbeUiState {
    batch_id: u64,
    pending: usize,
    results: HashMap<String, ImageStatus>,
}

impl ProbeUiState {
    fn reset(&mut self) {
        self.batch_id = self.batch_id.saturating_add(1);
        self.pending = 0;
        self.results.clear();
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
struct ViewData {
    selected_column: usize,
    scroll: usize,
    help_visible: bool,
    prompt: Option<String>,
    current_path: Option<PathBuf>,
    relay_base: Option<String>,
    probes: ProbeUiState,
    status_token: u64,
}

pub fn run_app<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    initial_path: Option<PathBuf>,
) -> Result<()> {
    enable_raw_mode().context("enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, terminal::EnterAlternateScreen).context("enter alternate screen")?;

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("create terminal")?;

    let mut view_data = ViewData {
        relay_base: runtime.relay_base(),
        ..ViewData::default()
    };
    let (internal_tx, internal_rx) = mpsc::channel();

    if let Some(path) = initial_path {
        load_path(state, runtime, &mut view_data, &internal_tx, &path);
    }

    let mut result = Ok(());
    loop {
        process_internal_events(state, &mut view_data, &internal_tx, &internal_rx);

        if let Err(error) = terminal.draw(|frame| render(frame, state, &view_data)) {
            result = Err(error).context("draw frame");
            break;
        }

        let has_event = event::poll(Duration::from_millis(120)).context("poll event")?;
        if has_event
            && let Event::Key(key) = event::read().context("read event")?
            && handle_key_event(state, runtime, &mut view_data, &internal_tx, key)
        {
            break;
        }
    }

    disable_raw_mode().context("disable raw mode")?;
    execute!(io::stdout(), terminal::LeaveAlternateScreen).context("leave alternate screen")?;
    tracing::debug!("gallery closed");
    result
}

fn process_internal_events(
    state: &mut AppState,
    view_data: &mut ViewData,
    tx: &Sender<InternalEvent>,
    rx: &Receiver<InternalEvent>,
) {
    while let Ok(event) = rx.try_recv() {
        match event {
            InternalEvent::ClearStatus { token } if token == view_data.status_token => {
                state.dispatch(AppCommand::ClearStatus);
            }
            InternalEvent::ClearStatus { .. } => {}
            InternalEvent::Probe(event) => handle_probe_event(state, view_data, tx, event),
        }
    }
}

fn handle_probe_event(
    state: &mut AppState,
    view_data: &mut ViewData,
    tx: &Sender<InternalEvent>,
    event: ProbeEvent,
) {
    if event.batch_id != view_data.probes.batch_id {
        return;
    }

    view_data
        .probes
        .results
        .insert(event.image_url, event.status);
    view_data.probes.pending = view_data.probes.pending.saturating_sub(1);
    if view_data.probes.pending == 0 {
        let blocked = view_data
            .probes
            .results
            .values()
            .filter(|status| status.is_broken())
            .count();
        let checked = view_data.probes.results.len();
        emit_status(
            state,
            view_data,
            tx,
            format!("checked {checked} images, {blocked} blocked"),
        );
    }
}

fn schedule_status_clear(internal_tx: &Sender<InternalEvent>, token: u64) {
    let sender = internal_tx.clone();
    thread::spawn(move || {
        thread::sleep(Duration::from_secs(4));
        let _ = sender.send(InternalEvent::ClearStatus { token });
    });
}

fn bump_status_token(view_data: &mut ViewData, internal_tx: &Sender<InternalEvent>) {
    view_data.status_token = view_data.status_token.saturating_add(1);
    schedule_status_clear(internal_tx, view_data.status_token);
}

fn emit_status(
    state: &mut AppState,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    message: impl Into<String>,
) {
    state.dispatch(AppCommand::SetStatus(message.into()));
    bump_status_token(view_data, internal_tx);
}

fn load_path<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    path: &Path,
) {
    let bytes = match runtime.read_catalog(path) {
        Ok(bytes) => bytes,
        Err(error) => {
            tracing::warn!(path = %path.display(), error = %format!("{error:#}"), "read catalog");
            emit_status(state, view_data, internal_tx, format!("read failed: {error:#}"));
            return;
        }
    };

    let events = state.dispatch(AppCommand::Load {
        source: path.display().to_string(),
        bytes,
    });
    if events
        .iter()
        .any(|event| matches!(event, AppEvent::CatalogLoaded { .. }))
    {
        view_data.current_path = Some(path.to_path_buf());
        view_data.selected_column = 0;
        view_data.scroll = 0;
        view_data.probes.reset();
        bump_status_token(view_data, internal_tx);
    }
}

fn handle_key_event<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
) -> bool {
    if key.code == KeyCode::Char('q') && key.modifiers.contains(KeyModifiers::CONTROL) {
        return true;
    }

    if view_data.prompt.is_some() {
        handle_prompt_key(state, runtime, view_data, internal_tx, key);
        return false;
    }

    if view_data.help_visible {
        if key.code == KeyCode::Esc || key.code == KeyCode::Char('?') {
            view_data.help_visible = false;
        }
        return false;
    }

    match key.code {
        KeyCode::Char('q') => return true,
        KeyCode::Char('?') => view_data.help_visible = true,
        KeyCode::Char('o') => {
            let prefill = view_data
                .current_path
                .as_ref()
                .map(|path| path.display().to_string())
                .unwrap_or_default();
            view_data.prompt = Some(prefill);
        }
        KeyCode::Char('r') => match view_data.current_path.clone() {
            Some(path) => load_path(state, runtime, view_data, internal_tx, &path),
            None => emit_status(state, view_data, internal_tx, "no file to reload; press o"),
        },
        KeyCode::Left | KeyCode::Char('h') => move_column(state, view_data, -1),
        KeyCode::Right | KeyCode::Char('l') => move_column(state, view_data, 1),
        KeyCode::Char(']') => cycle_filter(state, view_data, 1),
        KeyCode::Char('[') => cycle_filter(state, view_data, -1),
        KeyCode::Char('x') => {
            if let Some(column) = selected_column(state, view_data) {
                state.dispatch(AppCommand::ClearFilter(column));
            }
        }
        KeyCode::Char('X') => {
            if !state.dispatch(AppCommand::ClearAllFilters).is_empty() {
                bump_status_token(view_data, internal_tx);
            }
        }
        KeyCode::Char('g') => {
            if let Some(column) = selected_column(state, view_data) {
                state.dispatch(AppCommand::ToggleGroupBy(column));
                view_data.scroll = 0;
            }
        }
        KeyCode::Down | KeyCode::Char('j') => scroll_by(state, view_data, 1),
        KeyCode::Up | KeyCode::Char('k') => scroll_by(state, view_data, -1),
        KeyCode::PageDown => scroll_by(state, view_data, PAGE_LINES as isize),
        KeyCode::PageUp => scroll_by(state, view_data, -(PAGE_LINES as isize)),
        KeyCode::Char('p') => start_probes(state, runtime, view_data, internal_tx),
        KeyCode::Esc => {
            if state.error.is_some() {
                state.dispatch(AppCommand::DismissError);
            } else {
                state.dispatch(AppCommand::ClearStatus);
            }
        }
        _ => {}
    }
    false
}

fn handle_prompt_key<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
) {
    let Some(input) = view_data.prompt.as_mut() else {
        return;
    };
    match key.code {
        KeyCode::Esc => view_data.prompt = None,
        KeyCode::Backspace => {
            input.pop();
        }
        KeyCode::Char('u') if key.modifiers.contains(KeyModifiers::CONTROL) => input.clear(),
        KeyCode::Char(ch) => input.push(ch),
        KeyCode::Enter => {
            let raw = input.trim().to_owned();
            view_data.prompt = None;
            if raw.is_empty() {
                emit_status(state, view_data, internal_tx, "no path entered");
                return;
            }
            load_path(state, runtime, view_data, internal_tx, Path::new(&raw));
        }
        _ => {}
    }
}

fn descriptive_columns(state: &AppState) -> Vec<String> {
    ViewModel::derive(state).classification.descriptive_columns
}

fn selected_column(state: &AppState, view_data: &ViewData) -> Option<String> {
    descriptive_columns(state)
        .into_iter()
        .nth(view_data.selected_column)
}

fn move_column(state: &AppState, view_data: &mut ViewData, delta: isize) {
    let len = descriptive_columns(state).len();
    if len == 0 {
        view_data.selected_column = 0;
        return;
    }
    let current = view_data.selected_column.min(len - 1) as isize;
    view_data.selected_column = (current + delta).rem_euclid(len as isize) as usize;
}

/// Steps the selected column's filter through "All" followed by each distinct
/// value.
fn cycle_filter(state: &mut AppState, view_data: &mut ViewData, delta: isize) {
    let (column, value) = {
        let view = ViewModel::derive(state);
        let Some(options) = view.filter_options.get(view_data.selected_column) else {
            return;
        };
        let mut choices = vec![String::new()];
        choices.extend(options.values.iter().cloned());

        let current = options
            .selected
            .as_deref()
            .and_then(|selected| choices.iter().position(|choice| choice == selected))
            .unwrap_or(0) as isize;
        let next = (current + delta).rem_euclid(choices.len() as isize) as usize;
        (options.column.clone(), choices.swap_remove(next))
    };

    state.dispatch(AppCommand::SetFilter { column, value });
    view_data.scroll = 0;
}

fn scroll_by(state: &AppState, view_data: &mut ViewData, delta: isize) {
    let max = render_gallery_lines(state, view_data).len().saturating_sub(1);
    let next = (view_data.scroll as isize + delta).max(0) as usize;
    view_data.scroll = next.min(max);
}

fn start_probes<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
) {
    if view_data.relay_base.is_none() {
        emit_status(
            state,
            view_data,
            internal_tx,
            "relay disabled; set [relay].enabled = true to check images",
        );
        return;
    }

    let image_urls = {
        let view = ViewModel::derive(state);
        view.filtered
            .iter()
            .map(|&row| view.image_url(row))
            .filter(|url| !url.trim().is_empty())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .map(str::to_owned)
            .collect::<Vec<_>>()
    };
    if image_urls.is_empty() {
        emit_status(state, view_data, internal_tx, "no images to check");
        return;
    }

    view_data.probes.reset();
    view_data.probes.pending = image_urls.len();
    let count = image_urls.len();
    let batch_id = view_data.probes.batch_id;
    if let Err(error) = runtime.spawn_probes(batch_id, image_urls, internal_tx.clone()) {
        view_data.probes.pending = 0;
        emit_status(state, view_data, internal_tx, format!("check failed: {error}"));
        return;
    }
    // Synchronous runtimes have already queued every result.
    if view_data.probes.pending > 0 {
        emit_status(state, view_data, internal_tx, format!("checking {count} images"));
    }
}

fn render(frame: &mut ratatui::Frame<'_>, state: &AppState, view_data: &ViewData) {
    let view = ViewModel::derive(state);
    let filter_lines = if state.catalog.is_some() {
        (view.filter_options.len() + 1).min(MAX_FILTER_LINES) as u16 + 2
    } else {
        0
    };
    let error_lines = if state.error.is_some() { 3 } else { 0 };

    let layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Length(filter_lines),
            Constraint::Length(error_lines),
            Constraint::Min(1),
            Constraint::Length(3),
        ])
        .split(frame.area());

    let title = Paragraph::new(title_text(state, &view)).block(
        Block::default()
            .borders(Borders::ALL)
            .title("imagecheck")
            .title_style(
                Style::default()
                    .fg(Color::Cyan)
                    .add_modifier(Modifier::BOLD),
            ),
    );
    frame.render_widget(title, layout[0]);

    if state.catalog.is_some() {
        let scroll = view_data
            .selected_column
            .saturating_sub(MAX_FILTER_LINES.saturating_sub(3)) as u16;
        let filters = Paragraph::new(render_filter_bar_text(state, view_data))
            .scroll((scroll, 0))
            .block(Block::default().borders(Borders::ALL).title("filters"));
        frame.render_widget(filters, layout[1]);
    }

    if let Some(error) = &state.error {
        let banner = Paragraph::new(error.to_string())
            .style(Style::default().fg(Color::Red))
            .block(Block::default().borders(Borders::ALL).title("error (esc dismiss)"));
        frame.render_widget(banner, layout[2]);
    }

    let body = Paragraph::new(render_gallery_lines(state, view_data).join("\n"))
        .wrap(Wrap { trim: false })
        .scroll((view_data.scroll.min(u16::MAX as usize) as u16, 0))
        .block(Block::default().borders(Borders::ALL).title("gallery"));
    frame.render_widget(body, layout[3]);

    let status = Paragraph::new(status_text(state, view_data))
        .style(Style::default().fg(Color::Yellow))
        .block(Block::default().borders(Borders::ALL));
    frame.render_widget(status, layout[4]);

    if let Some(input) = &view_data.prompt {
        let area = centered_rect(70, 20, frame.area());
        frame.render_widget(Clear, area);
        let prompt = Paragraph::new(format!("path: {input}_")).block(
            Block::default()
                .borders(Borders::ALL)
                .title("open catalog (enter load, esc cancel)"),
        );
        frame.render_widget(prompt, area);
    }

    if view_data.help_visible {
        let area = centered_rect(70, 60, frame.area());
        frame.render_widget(Clear, area);
        let help = Paragraph::new(help_overlay_text())
            .block(Block::default().borders(Borders::ALL).title("help"));
        frame.render_widget(help, area);
    }
}

fn title_text(state: &AppState, view: &ViewModel<'_>) -> String {
    if state.catalog.is_none() {
        return "Upload a CSV file to view and group your images".to_owned();
    }
    let source = state.source.as_deref().unwrap_or("catalog");
    let mut title = format!(
        "{source} ({} of {} images)",
        view.visible_rows(),
        view.total_rows
    );
    if view.classification.image_column.is_none() {
        title.push_str(" | no image column");
    }
    title
}

fn render_filter_bar_text(state: &AppState, view_data: &ViewData) -> String {
    let view = ViewModel::derive(state);
    if view.filter_options.is_empty() {
        return "no descriptive columns to filter or group by".to_owned();
    }

    let group_label = if state.group_keys.is_empty() {
        "none".to_owned()
    } else {
        state.group_keys.as_slice().join(", ")
    };
    let mut lines = vec![format!(
        "{} active filters | group by: {group_label}",
        view.active_filter_count
    )];
    for (index, options) in view.filter_options.iter().enumerate() {
        let cursor = if index == view_data.selected_column {
            ">"
        } else {
            " "
        };
        let grouped = if state.group_keys.contains(&options.column) {
            "[g]"
        } else {
            "[ ]"
        };
        let value = options.selected.as_deref().unwrap_or("All");
        lines.push(format!(
            "{cursor} {grouped} {}: {value} ({} values)",
            options.column,
            options.values.len()
        ));
    }
    lines.join("\n")
}

fn render_gallery_lines(state: &AppState, view_data: &ViewData) -> Vec<String> {
    if state.catalog.is_none() {
        let mut lines = vec![
            "Press o to choose a CSV file.".to_owned(),
            "CSV should contain image URLs and grouping columns.".to_owned(),
            String::new(),
            "Expected CSV format:".to_owned(),
        ];
        lines.extend(EXPECTED_FORMAT.lines().map(|line| format!("  {line}")));
        return lines;
    }

    let view = ViewModel::derive(state);
    if view.filtered.is_empty() {
        return vec!["No images match the current filters".to_owned()];
    }

    let grouped = !state.group_keys.is_empty();
    let mut lines = Vec::new();
    let mut index = 0;
    for group in &view.grouped.groups {
        if grouped {
            lines.push(format!("== {} ({} images) ==", group.label, group.rows.len()));
        }
        for &row in &group.rows {
            index += 1;
            lines.push(format!(
                "[{index}] {}",
                card_summary(row, &view.classification)
            ));

            let image_url = view.image_url(row);
            lines.push(format!("    image: {}", image_line(image_url, view_data)));
            if let Some(base) = &view_data.relay_base
                && !image_url.is_empty()
            {
                lines.push(format!("    relay: {}", relay_url(base, image_url)));
            }
        }
        if grouped {
            lines.push(String::new());
        }
    }
    lines
}

fn card_summary(row: &Row, classification: &ColumnClassification) -> String {
    if classification.descriptive_columns.is_empty() {
        return "(no descriptive columns)".to_owned();
    }
    classification
        .descriptive_columns
        .iter()
        .map(|column| format!("{column}: {}", row.get(column)))
        .collect::<Vec<_>>()
        .join(" | ")
}

fn image_line(image_url: &str, view_data: &ViewData) -> String {
    if image_url.is_empty() {
        return "(none)".to_owned();
    }
    match view_data.probes.results.get(image_url) {
        None | Some(ImageStatus::Unchecked) => image_url.to_owned(),
        Some(ImageStatus::Missing) => "(none)".to_owned(),
        Some(ImageStatus::Available { content_type }) => {
            format!("{image_url} [ok {content_type}]")
        }
        Some(ImageStatus::Broken { reason }) => {
            format!("{image_url} [{PLACEHOLDER_TEXT}: {reason}]")
        }
    }
}

fn status_text(state: &AppState, view_data: &ViewData) -> String {
    if view_data.prompt.is_some() || view_data.help_visible {
        return String::new();
    }

    let default = "o open | r reload | h/l column | [/] filter | x/X clear | g group | j/k scroll | p check | ? help | q quit";
    match &state.status_line {
        Some(status) => format!("{status} | {default}"),
        None => default.to_owned(),
    }
}

fn help_overlay_text() -> &'static str {
    "global: ctrl+q or q quit | ? help | esc dismiss error / clear status\n\
file: o open path prompt | r reload current file\n\
columns: h/l or left/right select column\n\
filters: ] next value | [ previous value | x clear column | X clear all\n\
grouping: g toggle group-by on the selected column\n\
gallery: j/k or up/down scroll | pgup/pgdn page\n\
images: p check every visible image through the relay\n\
prompt: type a path | backspace delete | ctrl+u clear | enter load | esc cancel"
}

fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(area);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}

#[cfg(test)]
mod tests {
    use super::{
        AppRuntime, InternalEvent, ProbeEvent, ViewData, handle_key_event, help_overlay_text,
        process_internal_events, render_filter_bar_text, render_gallery_lines, status_text,
        title_text,
    };
    use anyhow::anyhow;
    use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
    use imagecheck_app::{AppState, ImageStatus, ParseError, Phase, ViewModel};
    use imagecheck_relay::PLACEHOLDER_TEXT;
    use imagecheck_testkit::sample_catalog;
    use std::collections::HashMap;
    use std::path::{Path, PathBuf};
    use std::sync::mpsc::{self, Receiver, Sender};

    const SAMPLE_PATH: &str = "/data/sample.csv";

    #[derive(Debug, Default)]
    struct TestRuntime {
        files: HashMap<PathBuf, Vec<u8>>,
        statuses: HashMap<String, ImageStatus>,
        relay_base: Option<String>,
        probe_calls: usize,
    }

    impl TestRuntime {
        fn with_sample() -> Self {
            let mut runtime = Self {
                relay_base: Some("https://relay.test/?".to_owned()),
                ..Self::default()
            };
            runtime.files.insert(
                PathBuf::from(SAMPLE_PATH),
                sample_catalog().as_bytes().to_vec(),
            );
            runtime
        }
    }

    impl AppRuntime for TestRuntime {
        fn read_catalog(&mut self, path: &Path) -> anyhow::Result<Vec<u8>> {
            self.files
                .get(path)
                .cloned()
                .ok_or_else(|| anyhow!("no such file {}", path.display()))
        }

        fn relay_base(&self) -> Option<String> {
            self.relay_base.clone()
        }

        fn probe_image(&mut self, image_url: &str) -> ImageStatus {
            self.probe_calls += 1;
            self.statuses
                .get(image_url)
                .cloned()
                .unwrap_or(ImageStatus::Unchecked)
        }
    }

    struct Harness {
        state: AppState,
        runtime: TestRuntime,
        view_data: ViewData,
        tx: Sender<InternalEvent>,
        rx: Receiver<InternalEvent>,
    }

    impl Harness {
        fn new(runtime: TestRuntime) -> Self {
            let (tx, rx) = mpsc::channel();
            let view_data = ViewData {
                relay_base: runtime.relay_base.clone(),
                ..ViewData::default()
            };
            Self {
                state: AppState::default(),
                runtime,
                view_data,
                tx,
                rx,
            }
        }

        fn loaded() -> Self {
            let mut harness = Self::new(TestRuntime::with_sample());
            harness.open(SAMPLE_PATH);
            harness
        }

        fn press(&mut self, code: KeyCode) -> bool {
            self.press_with(code, KeyModifiers::NONE)
        }

        fn press_with(&mut self, code: KeyCode, modifiers: KeyModifiers) -> bool {
            handle_key_event(
                &mut self.state,
                &mut self.runtime,
                &mut self.view_data,
                &self.tx,
                KeyEvent::new(code, modifiers),
            )
        }

        fn type_text(&mut self, text: &str) {
            for ch in text.chars() {
                self.press(KeyCode::Char(ch));
            }
        }

        fn open(&mut self, path: &str) {
            self.press(KeyCode::Char('o'));
            self.press_with(KeyCode::Char('u'), KeyModifiers::CONTROL);
            self.type_text(path);
            self.press(KeyCode::Enter);
        }

        fn drain(&mut self) {
            process_internal_events(
                &mut self.state,
                &mut self.view_data,
                &self.tx,
                &self.rx,
            );
        }

        fn gallery(&self) -> String {
            render_gallery_lines(&self.state, &self.view_data).join("\n")
        }
    }

    #[test]
    fn idle_gallery_shows_expected_format() {
        let harness = Harness::new(TestRuntime::default());
        let gallery = harness.gallery();
        assert!(gallery.contains("Press o to choose a CSV file."));
        assert!(gallery.contains("Base Model,Product Name,Paint Description,VRM,Image URL"));
    }

    #[test]
    fn open_prompt_loads_catalog() {
        let harness = Harness::loaded();
        assert_eq!(harness.state.phase(), Phase::Loaded);
        assert_eq!(
            harness.view_data.current_path,
            Some(PathBuf::from(SAMPLE_PATH))
        );
        assert_eq!(
            harness.state.status_line.as_deref(),
            Some("loaded 3 rows from /data/sample.csv")
        );

        let view = ViewModel::derive(&harness.state);
        assert_eq!(
            title_text(&harness.state, &view),
            "/data/sample.csv (3 of 3 images)"
        );
    }

    #[test]
    fn prompt_escape_cancels_without_loading() {
        let mut harness = Harness::new(TestRuntime::with_sample());
        harness.press(KeyCode::Char('o'));
        harness.type_text("/nope.csv");
        harness.press(KeyCode::Esc);
        assert!(harness.view_data.prompt.is_none());
        assert_eq!(harness.state.phase(), Phase::Idle);
    }

    #[test]
    fn prompt_swallows_quit_key() {
        let mut harness = Harness::new(TestRuntime::default());
        harness.press(KeyCode::Char('o'));
        assert!(!harness.press(KeyCode::Char('q')));
        assert_eq!(harness.view_data.prompt.as_deref(), Some("q"));
    }

    #[test]
    fn read_failure_reports_status_and_keeps_state() {
        let mut harness = Harness::loaded();
        harness.open("/missing.csv");
        assert_eq!(harness.state.phase(), Phase::Loaded);
        assert!(
            harness
                .state
                .status_line
                .as_deref()
                .is_some_and(|status| status.starts_with("read failed: no such file"))
        );
        assert_eq!(
            harness.view_data.current_path,
            Some(PathBuf::from(SAMPLE_PATH))
        );
    }

    #[test]
    fn empty_reload_shows_error_over_stale_gallery() {
        let mut harness = Harness::loaded();
        harness
            .runtime
            .files
            .insert(PathBuf::from("/empty.csv"), b"\n\n".to_vec());
        harness.open("/empty.csv");

        assert_eq!(harness.state.phase(), Phase::Error);
        assert_eq!(harness.state.error, Some(ParseError::EmptyInput));
        assert!(harness.gallery().contains("KR25NXP"));

        harness.press(KeyCode::Esc);
        assert_eq!(harness.state.phase(), Phase::Loaded);
    }

    #[test]
    fn bracket_keys_cycle_filter_values_through_all() {
        let mut harness = Harness::loaded();
        // Base Model values: Defender, Range Rover.
        harness.press(KeyCode::Char(']'));
        assert_eq!(harness.state.filters.get("Base Model"), Some("Defender"));
        harness.press(KeyCode::Char(']'));
        assert_eq!(harness.state.filters.get("Base Model"), Some("Range Rover"));
        harness.press(KeyCode::Char(']'));
        assert_eq!(harness.state.filters.get("Base Model"), None);
        harness.press(KeyCode::Char('['));
        assert_eq!(harness.state.filters.get("Base Model"), Some("Range Rover"));

        let gallery = harness.gallery();
        assert!(gallery.contains("KR25RHY"));
        assert!(!gallery.contains("KR25NXP"));
    }

    #[test]
    fn column_selection_wraps_and_targets_filter() {
        let mut harness = Harness::loaded();
        harness.press(KeyCode::Left);
        assert_eq!(harness.view_data.selected_column, 3);
        harness.press(KeyCode::Char(']'));
        assert_eq!(harness.state.filters.get("VRM"), Some("KR25ABC"));

        harness.press(KeyCode::Char('x'));
        assert!(harness.state.filters.is_empty());
    }

    #[test]
    fn clear_all_filters_key() {
        let mut harness = Harness::loaded();
        harness.press(KeyCode::Char(']'));
        harness.press(KeyCode::Right);
        harness.press(KeyCode::Char(']'));
        assert_eq!(harness.state.filters.len(), 2);

        harness.press(KeyCode::Char('X'));
        assert!(harness.state.filters.is_empty());
        assert_eq!(harness.state.status_line.as_deref(), Some("filters cleared"));
    }

    #[test]
    fn group_key_adds_group_headers() {
        let mut harness = Harness::loaded();
        harness.press(KeyCode::Char('g'));
        assert!(harness.state.group_keys.contains("Base Model"));

        let gallery = harness.gallery();
        assert!(gallery.contains("== Base Model: Defender (2 images) =="));
        assert!(gallery.contains("== Base Model: Range Rover (1 images) =="));
        let defender = gallery.find("Base Model: Defender (").expect("defender header");
        let rover = gallery.find("Base Model: Range Rover (").expect("rover header");
        assert!(defender < rover);

        let bar = render_filter_bar_text(&harness.state, &harness.view_data);
        assert!(bar.contains("group by: Base Model"));
        assert!(bar.contains("> [g] Base Model: All (2 values)"));
    }

    #[test]
    fn ungrouped_gallery_has_no_headers() {
        let harness = Harness::loaded();
        let gallery = harness.gallery();
        assert!(!gallery.contains("=="));
        assert!(gallery.contains(
            "[1] Base Model: Defender | Product Name: Defender 110 | Paint Description: Silicon Silver | VRM: KR25NXP"
        ));
        assert!(gallery.contains(
            "relay: https://relay.test/?https%3A%2F%2Fimages.example-dealer.com%2Fkr25nxp.jpg"
        ));
    }

    #[test]
    fn filter_with_no_matches_shows_empty_message() {
        let mut harness = Harness::loaded();
        harness.press(KeyCode::Char(']'));
        harness.press(KeyCode::Right);
        harness.press(KeyCode::Right);
        harness.press(KeyCode::Char(']'));
        harness.press(KeyCode::Char(']'));
        assert_eq!(harness.state.filters.get("Base Model"), Some("Defender"));
        assert_eq!(
            harness.state.filters.get("Paint Description"),
            Some("Silicon Silver")
        );
        assert!(!harness.gallery().contains("No images match"));

        // Defender and RR VELAR never appear together.
        harness.press(KeyCode::Left);
        harness.press(KeyCode::Char(']'));
        harness.press(KeyCode::Char(']'));
        harness.press(KeyCode::Char(']'));
        assert_eq!(harness.state.filters.get("Product Name"), Some("RR VELAR"));
        assert_eq!(harness.gallery(), "No images match the current filters");
    }

    #[test]
    fn probe_results_render_status_and_placeholder() {
        let mut runtime = TestRuntime::with_sample();
        runtime.statuses.insert(
            "https://images.example-dealer.com/kr25nxp.jpg".to_owned(),
            ImageStatus::Available {
                content_type: "image/jpeg".to_owned(),
            },
        );
        runtime.statuses.insert(
            "https://images.example-dealer.com/kr25rhy.jpg".to_owned(),
            ImageStatus::Broken {
                reason: "relay returned 403 Forbidden".to_owned(),
            },
        );
        let mut harness = Harness::new(runtime);
        harness.open(SAMPLE_PATH);

        harness.press(KeyCode::Char('p'));
        assert_eq!(harness.runtime.probe_calls, 3);
        harness.drain();

        let gallery = harness.gallery();
        assert!(gallery.contains("kr25nxp.jpg [ok image/jpeg]"));
        assert!(gallery.contains(&format!(
            "kr25rhy.jpg [{PLACEHOLDER_TEXT}: relay returned 403 Forbidden]"
        )));
        assert_eq!(
            harness.state.status_line.as_deref(),
            Some("checked 3 images, 1 blocked")
        );
    }

    #[test]
    fn stale_probe_batches_are_ignored() {
        let mut harness = Harness::loaded();
        let stale = harness.view_data.probes.batch_id.wrapping_sub(1);
        harness
            .tx
            .send(InternalEvent::Probe(ProbeEvent {
                batch_id: stale,
                image_url: "https://images.example-dealer.com/kr25nxp.jpg".to_owned(),
                status: ImageStatus::Broken {
                    reason: "old".to_owned(),
                },
            }))
            .expect("send");
        harness.drain();
        assert!(harness.view_data.probes.results.is_empty());
    }

    #[test]
    fn probe_requires_relay() {
        let mut runtime = TestRuntime::with_sample();
        runtime.relay_base = None;
        let mut harness = Harness::new(runtime);
        harness.open(SAMPLE_PATH);

        harness.press(KeyCode::Char('p'));
        assert_eq!(harness.runtime.probe_calls, 0);
        assert!(
            harness
                .state
                .status_line
                .as_deref()
                .is_some_and(|status| status.starts_with("relay disabled"))
        );
        assert!(!harness.gallery().contains("relay:"));
    }

    #[test]
    fn scroll_is_clamped_to_content() {
        let mut harness = Harness::loaded();
        harness.press(KeyCode::PageDown);
        harness.press(KeyCode::PageDown);
        let max = harness.gallery().lines().count() - 1;
        assert_eq!(harness.view_data.scroll, max);

        harness.press(KeyCode::PageUp);
        harness.press(KeyCode::PageUp);
        assert_eq!(harness.view_data.scroll, 0);
    }

    #[test]
    fn reload_without_file_sets_status() {
        let mut harness = Harness::new(TestRuntime::default());
        harness.press(KeyCode::Char('r'));
        assert_eq!(
            harness.state.status_line.as_deref(),
            Some("no file to reload; press o")
        );
    }

    #[test]
    fn reload_resets_selection() {
        let mut harness = Harness::loaded();
        harness.press(KeyCode::Char(']'));
        harness.press(KeyCode::Char('g'));
        harness.press(KeyCode::Char('r'));
        assert!(harness.state.filters.is_empty());
        assert!(harness.state.group_keys.is_empty());
    }

    #[test]
    fn help_overlay_toggles_and_hides_status() {
        let mut harness = Harness::loaded();
        harness.press(KeyCode::Char('?'));
        assert!(harness.view_data.help_visible);
        assert_eq!(status_text(&harness.state, &harness.view_data), "");

        harness.press(KeyCode::Char(']'));
        assert!(harness.state.filters.is_empty());

        harness.press(KeyCode::Esc);
        assert!(!harness.view_data.help_visible);
        assert!(status_text(&harness.state, &harness.view_data).contains("q quit"));
        assert!(help_overlay_text().contains("g toggle group-by"));
    }

    #[test]
    fn quit_keys() {
        let mut harness = Harness::loaded();
        assert!(harness.press_with(KeyCode::Char('q'), KeyModifiers::CONTROL));
        assert!(harness.press(KeyCode::Char('q')));
    }

    #[test]
    fn catalog_without_image_column_is_labelled() {
        let mut runtime = TestRuntime::default();
        runtime
            .files
            .insert(PathBuf::from("/plain.csv"), b"Name,Note\nA,x\n".to_vec());
        let mut harness = Harness::new(runtime);
        harness.open("/plain.csv");

        let view = ViewModel::derive(&harness.state);
        assert!(title_text(&harness.state, &view).ends_with("| no image column"));
        assert!(harness.gallery().contains("image: (none)"));
    }
}
