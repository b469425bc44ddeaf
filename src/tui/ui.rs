use dspy_archive::chat::{ROLE_ASSISTANT, ROLE_USER};
use ratatui::{
    Frame,
    layout::{Constraint, Direction, Layout, Margin, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Scrollbar, ScrollbarOrientation, ScrollbarState, Wrap},
};
use unicode_width::UnicodeWidthStr;

use crate::tui::app::App;

const SPINNER_FRAMES: [&str; 8] = ["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧"];

const INPUT_HEIGHT: u16 = 3;

const HELP: &str = " Enter: send | Ctrl+S: save notebook | Esc: quit ";

/// Rows inside the history pane's borders for a terminal of `height` rows
pub fn history_viewport_height(height: u16) -> usize {
    height.saturating_sub(INPUT_HEIGHT + 2) as usize
}

/// Draw the UI
pub fn draw(f: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(1), Constraint::Length(INPUT_HEIGHT)])
        .split(f.area());

    render_messages(f, app, chunks[0]);
    render_input(f, app, chunks[1]);
}

fn role_label(role: &str) -> (&str, Style) {
    match role {
        ROLE_USER => (
            "You",
            Style::default().fg(Color::Green).add_modifier(Modifier::BOLD),
        ),
        ROLE_ASSISTANT => (
            "Model",
            Style::default().fg(Color::Blue).add_modifier(Modifier::BOLD),
        ),
        _ => (
            "Notice",
            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
        ),
    }
}

fn render_messages(f: &mut Frame, app: &App, area: Rect) {
    let messages_block = Block::default().borders(Borders::ALL).title(Span::styled(
        "Module Chat",
        Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
    ));

    let mut lines: Vec<Line> = Vec::new();
    let rendered = &app.transcript.rendered;

    for (i, (role, text)) in rendered.iter().enumerate() {
        let (label, style) = role_label(role);
        lines.push(Line::from(Span::styled(format!("{}: ", label), style)));
        lines.extend(text.lines.iter().cloned());

        if i + 1 < rendered.len() {
            lines.push(Line::from(Span::styled(
                "─".repeat(area.width.saturating_sub(2) as usize),
                Style::default().fg(Color::DarkGray),
            )));
        }
    }

    if app.is_loading {
        lines.push(Line::from(Span::styled(
            format!("{} Waiting for the endpoint...", SPINNER_FRAMES[app.spinner_frame]),
            Style::default().fg(Color::Blue).add_modifier(Modifier::BOLD),
        )));
    }

    let total_height = lines.len();
    let position = app.scroll_offset();

    let messages = Paragraph::new(lines)
        .block(messages_block)
        .wrap(Wrap { trim: false })
        .scroll((position.min(u16::MAX as usize) as u16, 0));

    let scrollbar = Scrollbar::new(ScrollbarOrientation::VerticalRight)
        .begin_symbol(Some("↑"))
        .end_symbol(Some("↓"));
    let mut scrollbar_state = ScrollbarState::default()
        .content_length(total_height)
        .position(position);

    f.render_widget(messages, area);
    f.render_stateful_widget(
        scrollbar,
        area.inner(Margin {
            vertical: 1,
            horizontal: 0,
        }),
        &mut scrollbar_state,
    );
}

fn render_input(f: &mut Frame, app: &App, area: Rect) {
    let input_block = Block::default()
        .borders(Borders::ALL)
        .title(Span::styled(
            "Describe a module",
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        ))
        .title_bottom(Line::from(Span::styled(
            HELP,
            Style::default().fg(Color::DarkGray),
        )));

    let inner_area = input_block.inner(area);
    let input = Paragraph::new(app.input.text.as_str()).block(input_block);
    f.render_widget(input, area);

    let cursor_x = app.input.before_cursor().width() as u16;
    f.set_cursor_position((
        inner_area.x + cursor_x.min(inner_area.width.saturating_sub(1)),
        inner_area.y,
    ));
}
