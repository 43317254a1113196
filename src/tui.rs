//! Terminal User Interface (TUI) rendering and management.
//!
//! This module handles initializing the terminal in raw mode, restoring it on exit,
//! and drawing the menu surface using `ratatui`.

use std::io::{self, Stdout};

use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen, SetTitle,
};
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span, Text};
use ratatui::widgets::{
    Block, BorderType, Borders, Clear, List, ListItem, ListState, Paragraph, Wrap,
};
use ratatui::Terminal;

use crate::app::{App, InputMode, Row, StatusLevel};
use crate::menu::GroupState;
use crate::reload::{Coordinator, ReloadState};
use crate::surface::MenuSurface;

/// Type alias for the specific terminal backend used.
pub type TuiTerminal = Terminal<CrosstermBackend<Stdout>>;

const DEFAULT_HELP: &str =
    "Up/Down select | Enter open/run | Left fold | a add | o config | q quit | ? help";

/// Initializes the terminal for TUI mode.
///
/// Enables raw mode, enters the alternate screen, and creates a `ratatui` Terminal instance.
pub fn init_terminal() -> io::Result<TuiTerminal> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    Terminal::new(backend)
}

/// Restores the terminal to its original state.
pub fn restore_terminal(mut terminal: TuiTerminal) -> io::Result<()> {
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    Ok(())
}

/// Draws the menu surface and the coordinator's state to the terminal.
pub fn draw(
    app: &mut App,
    surface: &MenuSurface,
    coordinator: &Coordinator,
    terminal: &mut TuiTerminal,
) -> io::Result<()> {
    execute!(terminal.backend_mut(), SetTitle(window_title(surface)))?;
    app.clamp_selection(surface);
    let rows = app.rows(surface);

    terminal.draw(|frame| {
        let area = frame.size();
        let vertical = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Min(1), Constraint::Length(4)])
            .split(area);
        let main = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(40), Constraint::Percentage(60)])
            .split(vertical[0]);

        let border_style = Style::default().fg(Color::DarkGray);
        let items: Vec<ListItem> = rows
            .iter()
            .enumerate()
            .map(|(idx, row)| ListItem::new(row_line(row, idx == app.selected)))
            .collect();
        let list = List::new(items).block(
            Block::default()
                .title(menu_title(surface))
                .borders(Borders::ALL)
                .border_type(BorderType::Rounded)
                .border_style(border_style),
        );
        let mut state = ListState::default();
        if !rows.is_empty() {
            state.select(Some(app.selected.min(rows.len() - 1)));
        }
        frame.render_stateful_widget(list, main[0], &mut state);

        let details = Paragraph::new(details_text(rows.get(app.selected), coordinator))
            .block(
                Block::default()
                    .title("Details")
                    .borders(Borders::ALL)
                    .border_type(BorderType::Rounded)
                    .border_style(border_style),
            )
            .wrap(Wrap { trim: false });
        frame.render_widget(details, main[1]);

        let prompting = app.input_mode != InputMode::Normal;
        let second_line = match app.input_mode {
            InputMode::AddPath => Line::from(format!(
                "Makefile path: {}| (Enter next, Esc cancel)",
                app.input_line()
            )),
            InputMode::AddLabel => Line::from(format!(
                "Label (blank uses directory name): {}| (Enter add, Esc cancel)",
                app.input_line()
            )),
            InputMode::Normal => match app.status_message() {
                Some((text, StatusLevel::Warning)) => {
                    Line::from(Span::styled(text.to_string(), Style::default().fg(Color::Yellow)))
                }
                Some((text, StatusLevel::Info)) => Line::from(text.to_string()),
                None => Line::from(Span::styled(
                    DEFAULT_HELP,
                    Style::default().fg(Color::DarkGray),
                )),
            },
        };
        let status = Paragraph::new(Text::from(vec![reload_line(coordinator), second_line])).block(
            Block::default()
                .borders(Borders::ALL)
                .border_type(BorderType::Rounded)
                .border_style(if prompting {
                    Style::default().fg(Color::Green)
                } else {
                    border_style
                }),
        );
        frame.render_widget(status, vertical[1]);

        if app.show_help {
            let popup_area = centered_rect(60, 60, area);
            let help_text = [
                "Navigation:",
                "  Up/Down, j/k   Select item",
                "  Right, l       Open group",
                "  Left, h        Fold group",
                "",
                "Actions:",
                "  Enter, Space   Open group or run target",
                "  a              Add a Makefile",
                "  o              Open config in editor",
                "",
                "General:",
                "  ?              Toggle this help",
                "  q              Quit",
            ]
            .join("\n");
            let help_block = Paragraph::new(help_text)
                .block(
                    Block::default()
                        .title("Help")
                        .borders(Borders::ALL)
                        .border_type(BorderType::Rounded),
                )
                .style(Style::default().bg(Color::DarkGray).fg(Color::White));
            frame.render_widget(Clear, popup_area);
            frame.render_widget(help_block, popup_area);
        }
    })?;
    Ok(())
}

fn row_line(row: &Row, selected: bool) -> Line<'static> {
    let indent = "  ".repeat(usize::from(row.depth));
    if row.separator {
        return Line::from(Span::styled(
            format!("{}────────", indent),
            Style::default().fg(Color::DarkGray),
        ));
    }
    let marker = if selected { "▶ " } else { "  " };
    let fold = match (row.expandable, row.expanded) {
        (true, true) => "▼ ",
        (true, false) => "▸ ",
        _ => "",
    };
    let mut style = if row.enabled {
        Style::default()
    } else {
        Style::default().fg(Color::DarkGray).add_modifier(Modifier::DIM)
    };
    if selected {
        style = style.add_modifier(Modifier::BOLD);
    }
    Line::from(vec![
        Span::styled(marker, Style::default().fg(Color::Cyan)),
        Span::raw(indent),
        Span::styled(format!("{}{}", fold, row.title), style),
    ])
}

fn details_text(row: Option<&Row>, coordinator: &Coordinator) -> Text<'static> {
    let mut lines = Vec::new();
    if let Some(row) = row.filter(|row| !row.separator) {
        lines.push(Line::from(Span::styled(
            row.title.clone(),
            Style::default().add_modifier(Modifier::BOLD),
        )));
        if !row.tooltip.is_empty() {
            lines.push(Line::from(row.tooltip.clone()));
        }
        let group = coordinator.menu().groups().iter().find(|group| group.id == row.id);
        if let Some(group) = group {
            let summary = match &group.state {
                GroupState::Targets(1) => "1 target".to_string(),
                GroupState::Targets(count) => format!("{} targets", count),
                GroupState::Empty => "no targets".to_string(),
                GroupState::Error(err) => format!("error: {}", err),
            };
            lines.push(Line::from(summary));
        }
        lines.push(Line::default());
    }
    lines.push(Line::from(Span::styled(
        format!("config: {}", coordinator.store().path().display()),
        Style::default().fg(Color::DarkGray),
    )));
    Text::from(lines)
}

fn reload_line(coordinator: &Coordinator) -> Line<'static> {
    if let Some(err) = coordinator.last_error() {
        return Line::from(Span::styled(
            format!("config error: {} (fix the file to reload)", err),
            Style::default().fg(Color::Red),
        ));
    }
    let state = match coordinator.state() {
        ReloadState::Reloading => "reloading",
        ReloadState::Idle => "idle",
    };
    let watching = if coordinator.is_watching() {
        "watching for changes"
    } else {
        "live reload unavailable"
    };
    Line::from(format!(
        "{} · {} · {} reloads",
        state,
        watching,
        coordinator.rebuilds()
    ))
}

fn menu_title(surface: &MenuSurface) -> String {
    if surface.title().is_empty() {
        surface.tooltip().to_string()
    } else {
        surface.title().to_string()
    }
}

fn window_title(surface: &MenuSurface) -> String {
    let title = menu_title(surface);
    if title.is_empty() {
        "make-tray".to_string()
    } else {
        title
    }
}

fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(r);

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
    use super::*;
    use crate::menu::{ItemId, MenuBackend};

    fn row(enabled: bool) -> Row {
        Row {
            id: ItemId(1),
            depth: 1,
            title: "build".to_string(),
            tooltip: String::new(),
            enabled,
            separator: false,
            expandable: false,
            expanded: false,
        }
    }

    fn text_of(line: &Line) -> String {
        line.spans.iter().map(|span| span.content.as_ref()).collect()
    }

    #[test]
    fn disabled_rows_are_dimmed() {
        let line = row_line(&row(false), false);
        assert!(line.spans[2].style.add_modifier.contains(Modifier::DIM));
        let line = row_line(&row(true), false);
        assert!(!line.spans[2].style.add_modifier.contains(Modifier::DIM));
    }

    #[test]
    fn selected_row_is_marked() {
        assert!(text_of(&row_line(&row(true), true)).starts_with("▶ "));
    }

    #[test]
    fn window_title_falls_back_to_tooltip() {
        let mut surface = MenuSurface::new();
        assert_eq!(window_title(&surface), "make-tray");
        surface.set_tooltip("MakeTray");
        assert_eq!(window_title(&surface), "MakeTray");
        surface.set_title("MT");
        assert_eq!(window_title(&surface), "MT");
    }
}
