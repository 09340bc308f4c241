use chrono::{Local, NaiveDate};
use curbside_core::{
    coordinator::PollState,
    display::{DeviceInfo, SensorState, sensor_states},
    model::{StreetDirection, StreetSuffix, WasteStream},
};
use ratatui::{
    prelude::*,
    widgets::{Block, Borders, Cell, Paragraph, Row, Table, TableState, Wrap},
};

use crate::app::{App, InstanceRow, Screen};

pub(crate) fn draw(frame: &mut Frame<'_>, app: &App) {
    let area = frame.area();

    // Outer layout: title, main content, status line
    let layout_chunks = Layout::default()
        .direction(Direction::Vertical)
        .margin(1)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(0),
            Constraint::Length(3),
        ])
        .split(area);

    let chunks = layout_chunks.as_ref();
    let [header_area, content_area, status_area] = chunks else {
        return;
    };

    let header = Paragraph::new(format!(
        "curbside – Milwaukee garbage and recycling pickups · polling every {}h",
        app.registry.update_interval().as_secs() / 3600
    ))
    .block(Block::default().borders(Borders::ALL).title("Curbside"));
    frame.render_widget(header, *header_area);

    match app.screen {
        Screen::Dashboard => draw_dashboard(frame, app, *content_area),
        Screen::AddAddress => draw_add_address(frame, app, *content_area),
    }

    let nav_hint = match app.screen {
        Screen::Dashboard => {
            "↑/↓ move · a add address · r refresh · d remove · q/Esc/Ctrl-C quit"
        }
        Screen::AddAddress => "Type the address · Enter add · Esc back · Ctrl-C quit",
    };

    let status_text = if app.is_loading {
        format!("Loading… · {nav_hint}")
    } else if let Some(msg) = &app.error_message {
        format!("{msg} · {nav_hint}")
    } else {
        nav_hint.to_owned()
    };

    let status_style = if app.error_message.is_some() {
        Style::default().fg(Color::Red)
    } else if app.is_loading {
        Style::default().fg(Color::Yellow)
    } else {
        Style::default()
    };

    let status = Paragraph::new(status_text)
        .block(Block::default().borders(Borders::ALL).title("Status"))
        .style(status_style)
        .wrap(Wrap { trim: true });

    frame.render_widget(status, *status_area);
}

fn draw_dashboard(frame: &mut Frame<'_>, app: &App, area: Rect) {
    let rows = app.rows();
    let title = "Addresses (↑/↓ select, a add)";

    if rows.is_empty() {
        let paragraph = Paragraph::new(
            "No addresses configured yet. Press 'a' to add one, e.g. 2100 N Main ST.",
        )
        .block(Block::default().borders(Borders::ALL).title(title))
        .wrap(Wrap { trim: true });
        frame.render_widget(paragraph, area);
        return;
    }

    let today = App::today();
    let table_rows = rows
        .iter()
        .flat_map(|row| instance_rows(row, today))
        .collect::<Vec<_>>();

    let column_widths = [
        Constraint::Min(24),
        Constraint::Length(18),
        Constraint::Length(16),
        Constraint::Length(13),
        Constraint::Length(18),
        Constraint::Length(22),
    ];

    let table = Table::new(table_rows, column_widths)
        .header(
            Row::new(vec!["Address", "Sensor", "Date", "Status", "Icon", "State"])
                .style(Style::default().add_modifier(Modifier::BOLD)),
        )
        .block(Block::default().borders(Borders::ALL).title(title))
        .row_highlight_style(
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        )
        .column_spacing(1);

    // each instance spans one row per stream
    let mut state = TableState::default();
    state.select(Some(app.list_index * WasteStream::ALL.len()));
    frame.render_stateful_widget(table, area, &mut state);
}

fn instance_rows(row: &InstanceRow, today: NaiveDate) -> Vec<Row<'static>> {
    let device = DeviceInfo::for_entry(&row.entry);
    let state = state_label(row);
    sensor_states(&row.entry, &row.snapshot, today)
        .into_iter()
        .enumerate()
        .map(|(idx, sensor)| {
            let address = if idx == 0 {
                device.name.clone()
            } else {
                String::new()
            };
            sensor_row(address, &sensor, state.clone())
        })
        .collect()
}

fn sensor_row(address: String, sensor: &SensorState, state: String) -> Row<'static> {
    let date = sensor
        .pickup
        .date
        .map_or_else(|| "unknown".to_owned(), |date| date.format("%a %b %-d, %Y").to_string());
    let status = sensor.pickup.human_status.clone().unwrap_or_default();

    let mut style = Style::default().fg(stream_color(sensor.pickup.stream));
    if !sensor.available {
        style = style.fg(Color::DarkGray);
    } else if sensor.pickup.days_until == Some(0) {
        style = style.add_modifier(Modifier::BOLD);
    }

    Row::new(vec![
        Cell::from(address),
        Cell::from(sensor.name),
        Cell::from(date),
        Cell::from(status),
        Cell::from(sensor.pickup.icon),
        Cell::from(state),
    ])
    .style(style)
}

fn state_label(row: &InstanceRow) -> String {
    if row.state == PollState::Fetching {
        return "fetching…".to_owned();
    }
    if !row.snapshot.last_update_success {
        return row
            .snapshot
            .last_error
            .as_ref()
            .map_or_else(|| "unavailable".to_owned(), |err| format!("unavailable: {err}"));
    }
    row.snapshot.last_success_at.map_or_else(
        || "ok".to_owned(),
        |at| format!("ok {}", at.with_timezone(&Local).format("%H:%M")),
    )
}

fn stream_color(stream: WasteStream) -> Color {
    match stream {
        WasteStream::Garbage => Color::Gray,
        WasteStream::Recycling => Color::Blue,
    }
}

fn draw_add_address(frame: &mut Frame<'_>, app: &App, area: Rect) {
    let layout_chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // input
            Constraint::Min(0),    // codes
        ])
        .split(area);

    let chunks = layout_chunks.as_ref();
    let [input_area, help_area] = chunks else {
        return;
    };

    let input = Paragraph::new(app.address_input.as_str())
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title("House number, optional direction, street name, suffix (Enter)"),
        )
        .wrap(Wrap { trim: true });
    frame.render_widget(input, *input_area);

    let mut lines = Vec::new();
    if let Some(err) = &app.form_error {
        lines.push(Line::styled(err.clone(), Style::default().fg(Color::Red)));
        lines.push(Line::default());
    }
    lines.push(Line::from(format!(
        "Directions: {}",
        StreetDirection::ALL.map(StreetDirection::code).join(" ")
    )));
    lines.push(Line::from(format!(
        "Suffixes:   {}",
        StreetSuffix::ALL.map(StreetSuffix::code).join(" ")
    )));
    lines.push(Line::default());
    lines.push(Line::from("Example: 2100 N Main ST"));

    let help = Paragraph::new(lines)
        .block(Block::default().borders(Borders::ALL).title("Codes"))
        .wrap(Wrap { trim: true });
    frame.render_widget(help, *help_area);
}
