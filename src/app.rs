//! Application state and UI logic.
//!
//! This module holds the `App` struct, which tracks the cursor over the menu
//! surface, expanded groups, the add-entry prompt and the status line. It
//! translates key events into `AppAction`s; it never mutates the menu itself.

use std::collections::HashSet;
use std::time::{Duration, Instant};

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use crate::menu::ItemId;
use crate::surface::MenuSurface;

/// Modes of user input interaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    /// Menu navigation.
    Normal,
    /// Typing the path of a Makefile to add.
    AddPath,
    /// Typing the optional label for the Makefile being added.
    AddLabel,
}

/// Actions resulting from user interaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppAction {
    /// No action required.
    None,
    /// Exit the application.
    Quit,
    /// An enabled leaf was activated.
    Click(ItemId),
    /// Open the configuration file in an editor.
    OpenConfig,
    /// The add-entry prompt was completed.
    SubmitEntry { path: String, label: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusLevel {
    Info,
    Warning,
}

/// One visible line of the menu.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    pub id: ItemId,
    pub depth: u16,
    pub title: String,
    pub tooltip: String,
    pub enabled: bool,
    pub separator: bool,
    pub expandable: bool,
    pub expanded: bool,
}

#[derive(Debug, Clone)]
struct StatusMessage {
    text: String,
    at: Instant,
    ttl: Option<Duration>,
    level: StatusLevel,
}

/// The main application state container.
#[derive(Debug)]
pub struct App {
    /// Index of the selected row.
    pub selected: usize,
    /// Current input mode.
    pub input_mode: InputMode,
    /// Buffer for the add-entry prompt.
    pub input: String,
    /// Flag indicating if the application should exit.
    pub should_quit: bool,
    /// Whether to show the help overlay.
    pub show_help: bool,
    expanded: HashSet<ItemId>,
    pending_path: Option<String>,
    status_message: Option<StatusMessage>,
}

impl Default for App {
    fn default() -> Self {
        Self::new()
    }
}

impl App {
    pub fn new() -> Self {
        Self {
            selected: 0,
            input_mode: InputMode::Normal,
            input: String::new(),
            should_quit: false,
            show_help: false,
            expanded: HashSet::new(),
            pending_path: None,
            status_message: None,
        }
    }

    /// Flattens the visible part of the surface into rows.
    pub fn rows(&self, surface: &MenuSurface) -> Vec<Row> {
        let mut rows = Vec::new();
        for item in surface.visible_roots() {
            let children = surface.visible_children(item.id);
            let expanded = self.expanded.contains(&item.id);
            rows.push(Row {
                id: item.id,
                depth: 0,
                title: item.title.clone(),
                tooltip: item.tooltip.clone(),
                enabled: item.enabled,
                separator: item.separator,
                expandable: !children.is_empty(),
                expanded,
            });
            if expanded {
                rows.extend(children.into_iter().map(|child| Row {
                    id: child.id,
                    depth: 1,
                    title: child.title.clone(),
                    tooltip: child.tooltip.clone(),
                    enabled: child.enabled,
                    separator: child.separator,
                    expandable: false,
                    expanded: false,
                }));
            }
        }
        rows
    }

    /// Keeps the cursor on an existing, non-separator row after the menu changed.
    pub fn clamp_selection(&mut self, surface: &MenuSurface) {
        let live: HashSet<ItemId> = surface.visible_roots().map(|item| item.id).collect();
        self.expanded.retain(|id| live.contains(id));
        let rows = self.rows(surface);
        if rows.is_empty() {
            self.selected = 0;
            return;
        }
        self.selected = self.selected.min(rows.len() - 1);
        if rows.get(self.selected).is_some_and(|row| row.separator) {
            self.selected = next_selectable(&rows, self.selected, false)
                .or_else(|| next_selectable(&rows, self.selected, true))
                .unwrap_or(0);
        }
    }

    pub fn handle_key(&mut self, key: KeyEvent, surface: &MenuSurface) -> AppAction {
        match self.input_mode {
            InputMode::Normal => self.handle_normal_input(key, surface),
            InputMode::AddPath | InputMode::AddLabel => self.handle_prompt_input(key),
        }
    }

    fn handle_normal_input(&mut self, key: KeyEvent, surface: &MenuSurface) -> AppAction {
        let rows = self.rows(surface);
        match key.code {
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                self.should_quit = true;
                AppAction::Quit
            }
            KeyCode::Char('q') => {
                self.should_quit = true;
                AppAction::Quit
            }
            KeyCode::Up | KeyCode::Char('k') => {
                if let Some(idx) = next_selectable(&rows, self.selected, true) {
                    self.selected = idx;
                }
                AppAction::None
            }
            KeyCode::Down | KeyCode::Char('j') => {
                if let Some(idx) = next_selectable(&rows, self.selected, false) {
                    self.selected = idx;
                }
                AppAction::None
            }
            KeyCode::Right | KeyCode::Char('l') => {
                if let Some(row) = rows.get(self.selected) {
                    if row.expandable {
                        self.expanded.insert(row.id);
                    }
                }
                AppAction::None
            }
            KeyCode::Left | KeyCode::Char('h') => {
                self.collapse_at(&rows);
                AppAction::None
            }
            KeyCode::Enter | KeyCode::Char(' ') => self.activate(&rows),
            KeyCode::Char('a') => {
                self.begin_add_entry();
                AppAction::None
            }
            KeyCode::Char('o') => AppAction::OpenConfig,
            KeyCode::Char('?') => {
                self.show_help = !self.show_help;
                AppAction::None
            }
            KeyCode::Esc => {
                self.show_help = false;
                AppAction::None
            }
            _ => AppAction::None,
        }
    }

    fn activate(&mut self, rows: &[Row]) -> AppAction {
        let Some(row) = rows.get(self.selected) else {
            return AppAction::None;
        };
        if row.expandable {
            if !self.expanded.remove(&row.id) {
                self.expanded.insert(row.id);
            }
            return AppAction::None;
        }
        if row.enabled && !row.separator {
            return AppAction::Click(row.id);
        }
        AppAction::None
    }

    fn collapse_at(&mut self, rows: &[Row]) {
        let Some(row) = rows.get(self.selected) else {
            return;
        };
        if row.depth == 0 {
            self.expanded.remove(&row.id);
            return;
        }
        // jump to the owning group and fold it
        if let Some(parent_idx) = rows[..self.selected].iter().rposition(|r| r.depth == 0) {
            self.expanded.remove(&rows[parent_idx].id);
            self.selected = parent_idx;
        }
    }

    /// Opens the add-entry prompt.
    pub fn begin_add_entry(&mut self) {
        self.input_mode = InputMode::AddPath;
        self.input.clear();
        self.pending_path = None;
        self.show_help = false;
    }

    fn handle_prompt_input(&mut self, key: KeyEvent) -> AppAction {
        match key.code {
            KeyCode::Esc => {
                self.cancel_prompt();
                AppAction::None
            }
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                self.cancel_prompt();
                AppAction::None
            }
            KeyCode::Enter => self.submit_prompt(),
            KeyCode::Backspace => {
                self.input.pop();
                AppAction::None
            }
            KeyCode::Char(c) => {
                self.input.push(c);
                AppAction::None
            }
            _ => AppAction::None,
        }
    }

    fn submit_prompt(&mut self) -> AppAction {
        let value = self.input.trim().to_string();
        self.input.clear();
        match self.input_mode {
            InputMode::AddPath => {
                if value.is_empty() {
                    self.cancel_prompt();
                } else {
                    self.pending_path = Some(value);
                    self.input_mode = InputMode::AddLabel;
                }
                AppAction::None
            }
            InputMode::AddLabel => {
                self.input_mode = InputMode::Normal;
                match self.pending_path.take() {
                    Some(path) => AppAction::SubmitEntry { path, label: value },
                    None => AppAction::None,
                }
            }
            InputMode::Normal => AppAction::None,
        }
    }

    fn cancel_prompt(&mut self) {
        self.input_mode = InputMode::Normal;
        self.input.clear();
        self.pending_path = None;
    }

    pub fn input_line(&self) -> &str {
        &self.input
    }

    pub fn set_status_message(&mut self, message: impl Into<String>) {
        self.set_status_message_with_level(
            message,
            StatusLevel::Info,
            Some(Duration::from_secs(4)),
        );
    }

    pub fn set_status_warning_for(&mut self, message: impl Into<String>, ttl: Duration) {
        self.set_status_message_with_level(message, StatusLevel::Warning, Some(ttl));
    }

    pub fn set_status_warning_persistent(&mut self, message: impl Into<String>) {
        self.set_status_message_with_level(message, StatusLevel::Warning, None);
    }

    fn set_status_message_with_level(
        &mut self,
        message: impl Into<String>,
        level: StatusLevel,
        ttl: Option<Duration>,
    ) {
        self.status_message = Some(StatusMessage {
            text: message.into(),
            at: Instant::now(),
            ttl,
            level,
        });
    }

    pub fn status_message(&self) -> Option<(&str, StatusLevel)> {
        let message = self.status_message.as_ref()?;
        if let Some(ttl) = message.ttl {
            if message.at.elapsed() > ttl {
                return None;
            }
        }
        Some((message.text.as_str(), message.level))
    }
}

fn next_selectable(rows: &[Row], from: usize, backwards: bool) -> Option<usize> {
    if backwards {
        (0..from.min(rows.len())).rev().find(|&idx| !rows[idx].separator)
    } else {
        (from + 1..rows.len()).find(|&idx| !rows[idx].separator)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::menu::MenuBackend;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn type_text(app: &mut App, surface: &MenuSurface, text: &str) {
        for c in text.chars() {
            app.handle_key(key(KeyCode::Char(c)), surface);
        }
    }

    struct Menu {
        surface: MenuSurface,
        group: ItemId,
        leaf: ItemId,
        disabled: ItemId,
        exit: ItemId,
    }

    fn sample_menu() -> Menu {
        let mut surface = MenuSurface::new();
        let group = surface.add_item("api", "/srv/api/Makefile");
        let leaf = surface.add_sub_item(group, "build", "make -f /srv/api/Makefile build");
        let broken = surface.add_item("web", "/srv/web/Makefile");
        let disabled = surface.add_sub_item(broken, "(error)", "parse error");
        surface.disable(disabled);
        surface.add_separator();
        let settings = surface.add_item("Settings", "");
        let exit = surface.add_sub_item(settings, "Exit", "");
        Menu {
            surface,
            group,
            leaf,
            disabled,
            exit,
        }
    }

    #[test]
    fn enter_expands_groups_then_clicks_leaves() {
        let menu = sample_menu();
        let mut app = App::new();

        assert_eq!(app.handle_key(key(KeyCode::Enter), &menu.surface), AppAction::None);
        assert_eq!(app.rows(&menu.surface)[1].id, menu.leaf);

        app.handle_key(key(KeyCode::Down), &menu.surface);
        assert_eq!(
            app.handle_key(key(KeyCode::Enter), &menu.surface),
            AppAction::Click(menu.leaf)
        );
    }

    #[test]
    fn disabled_placeholders_do_not_click() {
        let menu = sample_menu();
        let mut app = App::new();
        app.handle_key(key(KeyCode::Down), &menu.surface);
        app.handle_key(key(KeyCode::Right), &menu.surface);
        app.handle_key(key(KeyCode::Down), &menu.surface);

        let rows = app.rows(&menu.surface);
        assert_eq!(rows[app.selected].id, menu.disabled);
        assert_eq!(app.handle_key(key(KeyCode::Enter), &menu.surface), AppAction::None);
    }

    #[test]
    fn navigation_skips_separators() {
        let menu = sample_menu();
        let mut app = App::new();
        app.handle_key(key(KeyCode::Down), &menu.surface);
        app.handle_key(key(KeyCode::Down), &menu.surface);

        let rows = app.rows(&menu.surface);
        assert_eq!(rows[app.selected].title, "Settings");

        app.handle_key(key(KeyCode::Enter), &menu.surface);
        app.handle_key(key(KeyCode::Down), &menu.surface);
        assert_eq!(
            app.handle_key(key(KeyCode::Enter), &menu.surface),
            AppAction::Click(menu.exit)
        );
    }

    #[test]
    fn left_on_a_leaf_folds_its_group() {
        let menu = sample_menu();
        let mut app = App::new();
        app.handle_key(key(KeyCode::Right), &menu.surface);
        app.handle_key(key(KeyCode::Down), &menu.surface);
        app.handle_key(key(KeyCode::Left), &menu.surface);

        assert_eq!(app.selected, 0);
        assert_eq!(app.rows(&menu.surface).len(), 4);
        assert!(!app.rows(&menu.surface)[0].expanded);
        assert_eq!(app.rows(&menu.surface)[0].id, menu.group);
    }

    #[test]
    fn add_prompt_collects_path_then_label() {
        let menu = sample_menu();
        let mut app = App::new();
        app.handle_key(key(KeyCode::Char('a')), &menu.surface);
        assert_eq!(app.input_mode, InputMode::AddPath);

        type_text(&mut app, &menu.surface, "~/proj/Makefile");
        app.handle_key(key(KeyCode::Enter), &menu.surface);
        assert_eq!(app.input_mode, InputMode::AddLabel);

        type_text(&mut app, &menu.surface, "Proj");
        let action = app.handle_key(key(KeyCode::Enter), &menu.surface);
        assert_eq!(
            action,
            AppAction::SubmitEntry {
                path: "~/proj/Makefile".to_string(),
                label: "Proj".to_string(),
            }
        );
        assert_eq!(app.input_mode, InputMode::Normal);
    }

    #[test]
    fn empty_label_is_allowed() {
        let menu = sample_menu();
        let mut app = App::new();
        app.begin_add_entry();
        type_text(&mut app, &menu.surface, "/srv/x/Makefile");
        app.handle_key(key(KeyCode::Enter), &menu.surface);
        let action = app.handle_key(key(KeyCode::Enter), &menu.surface);
        assert_eq!(
            action,
            AppAction::SubmitEntry {
                path: "/srv/x/Makefile".to_string(),
                label: String::new(),
            }
        );
    }

    #[test]
    fn cancelling_the_prompt_is_a_no_op() {
        let menu = sample_menu();
        let mut app = App::new();
        app.begin_add_entry();
        type_text(&mut app, &menu.surface, "/srv/x/Makefile");
        app.handle_key(key(KeyCode::Enter), &menu.surface);
        assert_eq!(app.handle_key(key(KeyCode::Esc), &menu.surface), AppAction::None);
        assert_eq!(app.input_mode, InputMode::Normal);

        app.begin_add_entry();
        assert_eq!(app.handle_key(key(KeyCode::Enter), &menu.surface), AppAction::None);
        assert_eq!(app.input_mode, InputMode::Normal);
    }

    #[test]
    fn clamp_selection_moves_off_removed_rows() {
        let mut menu = sample_menu();
        let mut app = App::new();
        app.selected = 10;
        app.expanded.insert(menu.group);
        menu.surface.remove(menu.group);

        app.clamp_selection(&menu.surface);
        let rows = app.rows(&menu.surface);
        assert!(app.selected < rows.len());
        assert!(!rows[app.selected].separator);
        assert!(app.expanded.is_empty());
    }

    #[test]
    fn status_messages_expire() {
        let mut app = App::new();
        app.set_status_warning_for("gone", Duration::from_millis(0));
        std::thread::sleep(Duration::from_millis(5));
        assert!(app.status_message().is_none());

        app.set_status_warning_persistent("stays");
        assert_eq!(app.status_message(), Some(("stays", StatusLevel::Warning)));
    }
}
