// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

mod boundary;
mod view;

pub use boundary::{
    BoundaryState, Boundaries, FALLBACK_BODY, FALLBACK_TITLE, RenderBoundary,
};
pub use view::{
    ChartSeries, ChartView, MapPoint, MapView, MessageView, TableView, build_message_view,
    format_header, map_label, rejection_notice,
};

use anyhow::{Context, Result, anyhow};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyModifiers};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use crossterm::{execute, terminal};
use floatchat_app::{
    Answer, ConversationCommand, ConversationEvent, ConversationState, Message, OutboundRequest,
    RequestId, RequestOutcome, Role, StoreEvent, Strictness,
};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::symbols::Marker;
use ratatui::text::Span;
use ratatui::widgets::canvas::{Canvas, Map, MapResolution};
use ratatui::widgets::{
    Axis, Block, Borders, Cell, Chart, Dataset, GraphType, Paragraph, Row, Table, Wrap,
};
use std::io;
use std::panic;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;
use std::time::Duration;
use tracing::{debug, error};

pub const INPUT_PLACEHOLDER: &str = "e.g., Plot the temperature profile for float 53548 on cycle 97";
pub const THINKING: &str = "Thinking...";
pub const SQL_HEADING: &str = "Generated SQL Query:";

const KEY_HINTS: &str = "enter send | ctrl+up/down focus | ctrl+s sql | esc quit";
const MAP_LABEL_ROWS: usize = 4;

/// Answers questions for the UI. `spawn_ask` must eventually deliver exactly
/// one `InternalEvent::Outcome` for the request, or return an error.
pub trait AppRuntime {
    fn ask(&mut self, question: &str) -> Result<Answer>;

    fn spawn_ask(&mut self, request: &OutboundRequest, tx: Sender<InternalEvent>) -> Result<()> {
        let outcome = match self.ask(&request.question) {
            Ok(answer) => RequestOutcome::Answered(answer),
            Err(error) => RequestOutcome::Failed(format!("{error:#}")),
        };
        tx.send(InternalEvent::Outcome {
            request_id: request.request_id,
            outcome,
        })
        .map_err(|_| anyhow!("answer channel closed"))?;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum InternalEvent {
    ClearStatus {
        token: u64,
    },
    Outcome {
        request_id: RequestId,
        outcome: RequestOutcome,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UiOptions {
    pub show_sql: bool,
    pub strictness: Strictness,
}

impl Default for UiOptions {
    fn default() -> Self {
        Self {
            show_sql: true,
            strictness: Strictness::Lenient,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
struct ViewData {
    /// `None` follows the newest message.
    focus: Option<usize>,
    show_sql: bool,
    strictness: Strictness,
    boundaries: Boundaries,
    status: Option<String>,
    status_token: u64,
}

impl ViewData {
    fn new(options: UiOptions) -> Self {
        Self {
            show_sql: options.show_sql,
            strictness: options.strictness,
            ..Self::default()
        }
    }
}

type PanicHook = Box<dyn Fn(&panic::PanicHookInfo<'_>) + Sync + Send + 'static>;

/// Routes panic reports to `tracing::error!` instead of stderr until dropped,
/// then puts the previous hook back.
pub struct PanicLogGuard {
    previous: Option<PanicHook>,
}

impl PanicLogGuard {
    pub fn install() -> Self {
        let previous = panic::take_hook();
        panic::set_hook(Box::new(|info| error!(%info, "panic")));
        Self {
            previous: Some(previous),
        }
    }
}

impl Drop for PanicLogGuard {
    fn drop(&mut self) {
        // set_hook may not be called while unwinding.
        if thread::panicking() {
            return;
        }
        if let Some(previous) = self.previous.take() {
            panic::set_hook(previous);
        }
    }
}

pub fn run_app<R: AppRuntime>(
    state: &mut ConversationState,
    runtime: &mut R,
    options: UiOptions,
) -> Result<()> {
    enable_raw_mode().context("enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, terminal::EnterAlternateScreen).context("enter alternate screen")?;

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("create terminal")?;

    // Contained render panics must not scribble over the alternate screen.
    let _panics = PanicLogGuard::install();

    let mut view_data = ViewData::new(options);
    let (internal_tx, internal_rx) = mpsc::channel();
    let store_rx = state.store.subscribe();
    sync_boundaries(state, &mut view_data);

    let mut result = Ok(());
    loop {
        process_internal_events(state, &mut view_data, &internal_rx);
        process_store_events(state, &mut view_data, &store_rx);

        if let Err(error) = terminal.draw(|frame| render(frame, state, &view_data)) {
            result = Err(error).context("draw frame");
            break;
        }

        let has_event = match event::poll(Duration::from_millis(120)).context("poll event") {
            Ok(has_event) => has_event,
            Err(error) => {
                result = Err(error);
                break;
            }
        };
        if has_event {
            match event::read().context("read event") {
                Ok(Event::Key(key)) => {
                    if handle_key_event(state, runtime, &mut view_data, &internal_tx, key) {
                        break;
                    }
                }
                Ok(_) => {}
                Err(error) => {
                    result = Err(error);
                    break;
                }
            }
        }
    }

    disable_raw_mode().context("disable raw mode")?;
    execute!(io::stdout(), terminal::LeaveAlternateScreen).context("leave alternate screen")?;
    result
}

fn process_internal_events(
    state: &mut ConversationState,
    view_data: &mut ViewData,
    rx: &Receiver<InternalEvent>,
) {
    while let Ok(event) = rx.try_recv() {
        match event {
            InternalEvent::ClearStatus { token } if token == view_data.status_token => {
                view_data.status = None;
            }
            InternalEvent::ClearStatus { .. } => {}
            InternalEvent::Outcome {
                request_id,
                outcome,
            } => {
                let events = state.dispatch(ConversationCommand::Resolve {
                    request_id,
                    outcome,
                });
                if !events.is_empty() {
                    view_data.focus = None;
                }
            }
        }
    }
}

fn process_store_events(
    state: &ConversationState,
    view_data: &mut ViewData,
    rx: &Receiver<StoreEvent>,
) {
    while let Ok(event) = rx.try_recv() {
        match event {
            StoreEvent::Reset => {
                view_data.boundaries = Boundaries::default();
                view_data.focus = None;
            }
            StoreEvent::Appended { id, index } => {
                debug!(message_id = %id, index, "message appended");
            }
        }
    }
    sync_boundaries(state, view_data);
}

/// Mounts a boundary for every message that does not have one yet.
fn sync_boundaries(state: &ConversationState, view_data: &mut ViewData) {
    let strictness = view_data.strictness;
    for message in state.messages() {
        if !view_data.boundaries.contains(message.id) {
            view_data
                .boundaries
                .mount_with(message.id, || build_message_view(message, strictness));
        }
    }
}

fn schedule_status_clear(internal_tx: &Sender<InternalEvent>, token: u64) {
    let sender = internal_tx.clone();
    thread::spawn(move || {
        thread::sleep(Duration::from_secs(4));
        let _ = sender.send(InternalEvent::ClearStatus { token });
    });
}

fn emit_status(
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    message: impl Into<String>,
) {
    view_data.status = Some(message.into());
    view_data.status_token = view_data.status_token.saturating_add(1);
    schedule_status_clear(internal_tx, view_data.status_token);
}

/// Returns true when the app should quit.
fn handle_key_event<R: AppRuntime>(
    state: &mut ConversationState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
) -> bool {
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    match key.code {
        KeyCode::Esc => return true,
        KeyCode::Char('q' | 'c') if ctrl => return true,
        KeyCode::Char('s') if ctrl => {
            view_data.show_sql = !view_data.show_sql;
            let status = if view_data.show_sql {
                "sql on"
            } else {
                "sql off"
            };
            emit_status(view_data, internal_tx, status);
        }
        KeyCode::Up if ctrl => move_focus(state, view_data, internal_tx, -1),
        KeyCode::Down if ctrl => move_focus(state, view_data, internal_tx, 1),
        KeyCode::Enter => submit_question(state, runtime, view_data, internal_tx),
        KeyCode::Backspace => {
            let mut input = state.input.clone();
            input.pop();
            state.dispatch(ConversationCommand::SetInput(input));
        }
        KeyCode::Char(ch) if key.modifiers.is_empty() || key.modifiers == KeyModifiers::SHIFT => {
            let mut input = state.input.clone();
            input.push(ch);
            state.dispatch(ConversationCommand::SetInput(input));
        }
        _ => {}
    }
    false
}

fn submit_question<R: AppRuntime>(
    state: &mut ConversationState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
) {
    let events = state.dispatch(ConversationCommand::Submit);
    let Some(request) = ConversationEvent::outbound(&events).cloned() else {
        return;
    };
    view_data.focus = None;

    if let Err(error) = runtime.spawn_ask(&request, internal_tx.clone()) {
        let detail = format!("{error:#}");
        emit_status(view_data, internal_tx, format!("request failed to start: {detail}"));
        state.resolve(request.request_id, RequestOutcome::Failed(detail));
    }
}

fn focused_index(state: &ConversationState, view_data: &ViewData) -> Option<usize> {
    let last = state.messages().len().checked_sub(1)?;
    Some(view_data.focus.map_or(last, |index| index.min(last)))
}

fn move_focus(
    state: &ConversationState,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    delta: isize,
) {
    let Some(current) = focused_index(state, view_data) else {
        return;
    };
    let last = state.messages().len().saturating_sub(1);
    let next = current.saturating_add_signed(delta).min(last);
    view_data.focus = if next == last { None } else { Some(next) };
    emit_status(
        view_data,
        internal_tx,
        format!("message {}/{}", next + 1, last + 1),
    );
}

fn render(frame: &mut ratatui::Frame<'_>, state: &ConversationState, view_data: &ViewData) {
    let layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(1),
            Constraint::Length(3),
            Constraint::Length(1),
        ])
        .split(frame.area());

    let header = Paragraph::new(header_text(state, view_data))
        .block(Block::default().title("floatchat").borders(Borders::ALL));
    frame.render_widget(header, layout[0]);

    let body = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(layout[1]);

    let inner_width = usize::from(body[0].width.saturating_sub(2));
    let inner_height = usize::from(body[0].height.saturating_sub(2));
    let transcript = Paragraph::new(
        transcript_lines(state, view_data, inner_width, inner_height).join("\n"),
    )
    .block(
        Block::default()
            .title("conversation")
            .borders(Borders::ALL),
    );
    frame.render_widget(transcript, body[0]);

    render_visuals(frame, body[1], state, view_data);

    let (input, input_style) = input_text(state);
    let input_widget = Paragraph::new(input)
        .style(input_style)
        .block(Block::default().title("ask").borders(Borders::ALL));
    frame.render_widget(input_widget, layout[2]);

    let status = Paragraph::new(status_text(view_data)).style(Style::default().fg(Color::Yellow));
    frame.render_widget(status, layout[3]);
}

fn header_text(state: &ConversationState, view_data: &ViewData) -> String {
    format!(
        "ARGO float explorer | request: {} | sql: {} | messages: {}",
        state.phase().label(),
        if view_data.show_sql { "on" } else { "off" },
        state.messages().len()
    )
}

fn status_text(view_data: &ViewData) -> String {
    view_data
        .status
        .clone()
        .unwrap_or_else(|| KEY_HINTS.to_owned())
}

fn input_text(state: &ConversationState) -> (String, Style) {
    if state.pending_request() {
        return (
            THINKING.to_owned(),
            Style::default()
                .fg(Color::DarkGray)
                .add_modifier(Modifier::ITALIC),
        );
    }
    if state.input.is_empty() {
        return (
            INPUT_PLACEHOLDER.to_owned(),
            Style::default().fg(Color::DarkGray),
        );
    }
    (format!("> {}", state.input), Style::default())
}

const fn role_label(role: Role) -> &'static str {
    match role {
        Role::User => "you",
        Role::Assistant => "floatchat",
    }
}

/// The transcript tail that fits `height`, ending at the focused message.
fn transcript_lines(
    state: &ConversationState,
    view_data: &ViewData,
    width: usize,
    height: usize,
) -> Vec<String> {
    let focused = focused_index(state, view_data);
    let mut lines = Vec::new();
    let mut focus_end = 0;

    for (index, message) in state.messages().iter().enumerate() {
        let marker = if Some(index) == focused { "> " } else { "  " };
        let body = format!(
            "[{}] {}: {}",
            message.clock_label(),
            role_label(message.role),
            message.content
        );
        for (line_index, line) in wrap_text(&body, width.saturating_sub(2)).into_iter().enumerate()
        {
            let prefix = if line_index == 0 { marker } else { "  " };
            lines.push(format!("{prefix}{line}"));
        }

        if view_data.show_sql
            && let Some(sql) = &message.sql
        {
            lines.push(format!("  {SQL_HEADING}"));
            for segment in sql.lines() {
                for line in wrap_text(segment, width.saturating_sub(4)) {
                    lines.push(format!("    {line}"));
                }
            }
        }

        if let Some(summary) = visual_summary(message, view_data) {
            lines.push(format!("  {summary}"));
        }
        lines.push(String::new());

        if Some(index) == focused {
            focus_end = lines.len();
        }
    }

    if state.pending_request() {
        lines.push(format!("  {}: {THINKING}", role_label(Role::Assistant)));
    }

    let end = if view_data.focus.is_none() {
        lines.len()
    } else {
        focus_end
    };
    let start = end.saturating_sub(height);
    lines[start..end].to_vec()
}

fn visual_summary(message: &Message, view_data: &ViewData) -> Option<String> {
    let boundary = view_data.boundaries.get(message.id)?;
    let Some(view) = boundary.view() else {
        return Some("[visuals failed]".to_owned());
    };
    if view.plan.rejected.is_some() {
        return Some("[visuals skipped]".to_owned());
    }
    if view.is_blank() {
        return None;
    }

    let mut parts = Vec::new();
    if let Some(table) = &view.table {
        parts.push(format!("table ({} rows)", table.rows.len()));
    }
    if view.chart.is_some() {
        parts.push("chart".to_owned());
    }
    if view.map.is_some() {
        parts.push("map".to_owned());
    }
    Some(format!("[{}]", parts.join(", ")))
}

/// Greedy word wrap on character counts. Words longer than `width` are split.
fn wrap_text(text: &str, width: usize) -> Vec<String> {
    let width = width.max(1);
    let mut lines = Vec::new();
    for raw in text.split('\n') {
        let mut current = String::new();
        let mut current_len = 0;
        for word in raw.split_whitespace() {
            let mut word = word.chars().collect::<Vec<_>>();
            while word.len() > width {
                if current_len > 0 {
                    lines.push(std::mem::take(&mut current));
                    current_len = 0;
                }
                let rest = word.split_off(width);
                lines.push(word.into_iter().collect());
                word = rest;
            }
            if word.is_empty() {
                continue;
            }
            let needed = if current_len == 0 {
                word.len()
            } else {
                current_len + 1 + word.len()
            };
            if needed > width {
                lines.push(std::mem::take(&mut current));
                current_len = 0;
            }
            if current_len > 0 {
                current.push(' ');
                current_len += 1;
            }
            current.extend(word.iter());
            current_len += word.len();
        }
        lines.push(current);
    }
    lines
}

fn render_visuals(
    frame: &mut ratatui::Frame<'_>,
    area: Rect,
    state: &ConversationState,
    view_data: &ViewData,
) {
    let block = Block::default().title("visuals").borders(Borders::ALL);
    let boundary = focused_index(state, view_data)
        .and_then(|index| state.messages().get(index))
        .and_then(|message| view_data.boundaries.get(message.id));

    let Some(boundary) = boundary else {
        frame.render_widget(Paragraph::new(idle_visuals_text()).block(block), area);
        return;
    };

    let view = match boundary.state() {
        BoundaryState::Failed { fault } => {
            let fallback = Paragraph::new(fallback_text(fault))
                .style(Style::default().fg(Color::LightRed))
                .wrap(Wrap { trim: false })
                .block(block);
            frame.render_widget(fallback, area);
            return;
        }
        BoundaryState::Rendered(view) => view,
    };

    if let Some(mismatch) = &view.plan.rejected {
        frame.render_widget(Paragraph::new(rejection_notice(mismatch)).block(block), area);
        return;
    }
    if view.is_blank() {
        frame.render_widget(Paragraph::new(idle_visuals_text()).block(block), area);
        return;
    }

    let panes = [view.table.is_some(), view.chart.is_some(), view.map.is_some()]
        .into_iter()
        .filter(|present| *present)
        .count() as u32;
    let areas = Layout::default()
        .direction(Direction::Vertical)
        .constraints(vec![Constraint::Ratio(1, panes); panes as usize])
        .split(area);
    let mut slots = areas.iter().copied();

    if let Some(table) = &view.table
        && let Some(slot) = slots.next()
    {
        render_table_view(frame, slot, table);
    }
    if let Some(chart) = &view.chart
        && let Some(slot) = slots.next()
    {
        render_chart_view(frame, slot, chart);
    }
    if let Some(map) = &view.map
        && let Some(slot) = slots.next()
    {
        render_map_view(frame, slot, map);
    }
}

fn idle_visuals_text() -> &'static str {
    "Ask about floats, profiles, or positions to see a table, chart, or map here."
}

fn fallback_text(fault: &str) -> String {
    format!("{FALLBACK_TITLE}\n{FALLBACK_BODY}\n\n{fault}")
}

fn render_table_view(frame: &mut ratatui::Frame<'_>, area: Rect, table: &TableView) {
    let widths = vec![Constraint::Min(8); table.headers.len().max(1)];
    let header = Row::new(table.headers.iter().map(|label| {
        Cell::from(label.as_str()).style(
            Style::default()
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
        )
    }));
    let rows = table
        .rows
        .iter()
        .map(|cells| Row::new(cells.iter().map(|cell| Cell::from(cell.as_str()))));

    let widget = Table::new(rows, widths)
        .header(header)
        .column_spacing(1)
        .block(
            Block::default()
                .title(format!("{} rows", table.rows.len()))
                .borders(Borders::ALL),
        );
    frame.render_widget(widget, area);
}

fn series_color(field: &str) -> Color {
    if field == floatchat_app::SALINITY_FIELD {
        Color::Cyan
    } else {
        Color::LightRed
    }
}

/// Pressure is plotted negated so deeper samples sit lower.
fn plotted_points(chart: &ChartView) -> Vec<Vec<(f64, f64)>> {
    let sign = if chart.y_descending { -1.0 } else { 1.0 };
    chart
        .series
        .iter()
        .map(|line| {
            line.points
                .iter()
                .map(|(value, pressure)| (*value, sign * pressure))
                .collect()
        })
        .collect()
}

fn chart_y_bounds(chart: &ChartView) -> [f64; 2] {
    let [shallow, deep] = chart.pressure_bounds;
    let [low, high] = if chart.y_descending {
        [-deep, -shallow]
    } else {
        [shallow, deep]
    };
    if (high - low).abs() < f64::EPSILON {
        [low - 1.0, high + 1.0]
    } else {
        [low, high]
    }
}

fn render_chart_view(frame: &mut ratatui::Frame<'_>, area: Rect, chart: &ChartView) {
    let plotted = plotted_points(chart);
    let datasets = chart
        .series
        .iter()
        .zip(plotted.iter())
        .map(|(line, points)| {
            Dataset::default()
                .name(line.field)
                .marker(Marker::Braille)
                .graph_type(GraphType::Line)
                .style(Style::default().fg(series_color(line.field)))
                .data(points)
        })
        .collect::<Vec<_>>();

    let [x_low, x_high] = chart.x_bounds;
    let [shallow, deep] = chart.pressure_bounds;
    let y_labels = if chart.y_descending {
        vec![format!("{deep:.0}"), format!("{shallow:.0}")]
    } else {
        vec![format!("{shallow:.0}"), format!("{deep:.0}")]
    };

    let widget = Chart::new(datasets)
        .block(
            Block::default()
                .title(chart.title.as_str())
                .borders(Borders::ALL),
        )
        .x_axis(
            Axis::default()
                .title(chart.x_label())
                .bounds(chart.x_bounds)
                .labels(vec![
                    format!("{x_low:.1}"),
                    format!("{:.1}", (x_low + x_high) / 2.0),
                    format!("{x_high:.1}"),
                ]),
        )
        .y_axis(
            Axis::default()
                .title("pressure (dbar)")
                .bounds(chart_y_bounds(chart))
                .labels(y_labels),
        );
    frame.render_widget(widget, area);
}

fn map_label_lines(map: &MapView) -> Vec<String> {
    let mut lines = map
        .points
        .iter()
        .take(MAP_LABEL_ROWS)
        .map(|point| point.label.clone())
        .collect::<Vec<_>>();
    let hidden = map.points.len().saturating_sub(MAP_LABEL_ROWS);
    if hidden > 0 {
        lines.push(format!("... and {hidden} more"));
    }
    lines
}

fn render_map_view(frame: &mut ratatui::Frame<'_>, area: Rect, map: &MapView) {
    let labels = map_label_lines(map);
    let parts = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(4),
            Constraint::Length(labels.len() as u16),
        ])
        .split(area);

    let (lon_bounds, lat_bounds) = map.bounds();
    let canvas = Canvas::default()
        .block(
            Block::default()
                .title(format!(
                    "map centered {:.3}, {:.3}",
                    map.center.lat, map.center.lon
                ))
                .borders(Borders::ALL),
        )
        .marker(Marker::Braille)
        .x_bounds(lon_bounds)
        .y_bounds(lat_bounds)
        .paint(|ctx| {
            ctx.draw(&Map {
                color: Color::DarkGray,
                resolution: MapResolution::High,
            });
            ctx.layer();
            for point in &map.points {
                ctx.print(
                    point.lon,
                    point.lat,
                    Span::styled("●", Style::default().fg(Color::LightRed)),
                );
            }
        });
    frame.render_widget(canvas, parts[0]);
    frame.render_widget(Paragraph::new(labels.join("\n")), parts[1]);
}
