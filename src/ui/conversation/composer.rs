use crate::events::Subject;
use crate::ui::conversation::commands::{CommandEntry, ParsedCommand, command_entries, parse_slash_command};
use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Widget},
};
use std::cell::{Cell, RefCell};

/// Result returned when the user interacts with the composer
#[derive(Debug, PartialEq)]
pub enum ComposerResult {
    Submitted(String),
    Command(ParsedCommand),
    None,
}

/// Whether Enter may submit right now
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubmitPolicy {
    /// False while a question is pending; Enter then keeps the text
    pub enabled: bool,
    /// True when an image is attached, so an empty question is still a submission
    pub allow_empty: bool,
}

/// State for the text area within the composer. `cursor` is a byte offset on a char boundary.
#[derive(Debug, Clone, Default)]
pub struct TextAreaState {
    pub content: String,
    pub cursor: usize,
}

/// Question composer with slash-command palette
pub struct ChatComposer {
    state: RefCell<TextAreaState>,
    subject: Subject,
    command_entries: Vec<CommandEntry>,
    filtered_commands: RefCell<Vec<CommandEntry>>,
    show_command_palette: Cell<bool>,
    selected_command: Cell<Option<usize>>,
}

impl ChatComposer {
    pub fn new(subject: Subject) -> Self {
        Self {
            state: RefCell::new(TextAreaState::default()),
            subject,
            command_entries: command_entries(),
            filtered_commands: RefCell::new(Vec::new()),
            show_command_palette: Cell::new(false),
            selected_command: Cell::new(None),
        }
    }

    /// Handle key input
    pub fn handle_key(&self, key: KeyEvent, policy: SubmitPolicy) -> ComposerResult {
        if key.kind != KeyEventKind::Press {
            return ComposerResult::None;
        }

        let mut guard = self.state.borrow_mut();
        let state = &mut *guard;

        match key.code {
            KeyCode::Enter => {
                if key.modifiers.contains(KeyModifiers::SHIFT) {
                    Self::insert_char(state, '\n');
                } else if let Some(command) = parse_slash_command(&state.content) {
                    state.content.clear();
                    state.cursor = 0;
                    self.close_command_palette();
                    return ComposerResult::Command(command);
                } else if self.show_command_palette.get() {
                    if self.apply_selected_command(state) {
                        return ComposerResult::None;
                    }
                } else if policy.enabled && (policy.allow_empty || !state.content.trim().is_empty()) {
                    let content = std::mem::take(&mut state.content);
                    state.cursor = 0;
                    self.close_command_palette();
                    return ComposerResult::Submitted(content);
                }
            }
            KeyCode::Up => {
                if self.show_command_palette.get() {
                    self.move_command_selection(-1);
                }
            }
            KeyCode::Down => {
                if self.show_command_palette.get() {
                    self.move_command_selection(1);
                }
            }
            KeyCode::Esc => {
                if self.show_command_palette.get() {
                    self.close_command_palette();
                }
            }
            KeyCode::Tab => {
                if self.show_command_palette.get() {
                    self.apply_selected_command(state);
                }
            }
            KeyCode::Char(c) => {
                if key.modifiers.contains(KeyModifiers::CONTROL) {
                    return ComposerResult::None;
                }

                Self::insert_char(state, c);

                if self.show_command_palette.get() {
                    if state.content.starts_with('/') && !c.is_whitespace() {
                        self.refresh_command_palette(state);
                    } else {
                        self.close_command_palette();
                    }
                } else if state.content == "/" {
                    self.open_command_palette(state);
                }
            }
            KeyCode::Backspace => {
                if Self::backspace(state) && self.show_command_palette.get() {
                    if state.content.starts_with('/') {
                        self.refresh_command_palette(state);
                    } else {
                        self.close_command_palette();
                    }
                }
            }
            KeyCode::Delete => {
                if Self::delete(state) && self.show_command_palette.get() {
                    self.refresh_command_palette(state);
                }
            }
            KeyCode::Left => {
                if let Some((idx, _)) = state.content[..state.cursor].char_indices().next_back() {
                    state.cursor = idx;
                }
            }
            KeyCode::Right => {
                if let Some(c) = state.content[state.cursor..].chars().next() {
                    state.cursor += c.len_utf8();
                }
            }
            KeyCode::Home => {
                state.cursor = 0;
            }
            KeyCode::End => {
                state.cursor = state.content.len();
            }
            _ => {}
        }

        ComposerResult::None
    }

    /// Insert text at the cursor (used for bracketed paste)
    pub fn insert_str(&self, text: &str) {
        let mut state = self.state.borrow_mut();
        let at = state.cursor;
        state.content.insert_str(at, text);
        state.cursor += text.len();
    }

    fn insert_char(state: &mut TextAreaState, c: char) {
        let at = state.cursor;
        state.content.insert(at, c);
        state.cursor += c.len_utf8();
    }

    /// Delete character before cursor
    fn backspace(state: &mut TextAreaState) -> bool {
        let previous = state.content[..state.cursor].char_indices().next_back();
        match previous {
            Some((idx, _)) => {
                state.content.remove(idx);
                state.cursor = idx;
                true
            }
            None => false,
        }
    }

    /// Delete character at cursor
    fn delete(state: &mut TextAreaState) -> bool {
        if state.cursor < state.content.len() {
            let at = state.cursor;
            state.content.remove(at);
            true
        } else {
            false
        }
    }

    fn open_command_palette(&self, state: &TextAreaState) {
        self.show_command_palette.set(true);
        self.selected_command.set(Some(0));
        self.refresh_command_palette(state);
    }

    fn close_command_palette(&self) {
        self.show_command_palette.set(false);
        self.filtered_commands.borrow_mut().clear();
        self.selected_command.set(None);
    }

    fn refresh_command_palette(&self, state: &TextAreaState) {
        let query = state.content.trim_start_matches('/').to_lowercase();
        let mut filtered = self.filtered_commands.borrow_mut();
        filtered.clear();

        for entry in &self.command_entries {
            if query.is_empty() || entry.keyword.starts_with(&query) {
                filtered.push(*entry);
            }
        }

        if filtered.is_empty() {
            self.selected_command.set(None);
        } else {
            let index = self.selected_command.get().unwrap_or(0);
            self.selected_command.set(Some(index.min(filtered.len() - 1)));
        }
    }

    fn move_command_selection(&self, delta: isize) {
        let filtered = self.filtered_commands.borrow();
        if filtered.is_empty() {
            self.selected_command.set(None);
            return;
        }

        let len = filtered.len() as isize;
        let current = self.selected_command.get().unwrap_or(0) as isize;
        let next = (current + delta).rem_euclid(len);
        self.selected_command.set(Some(next as usize));
    }

    fn apply_selected_command(&self, state: &mut TextAreaState) -> bool {
        let entry = {
            let filtered = self.filtered_commands.borrow();
            match self.selected_command.get().and_then(|i| filtered.get(i)) {
                Some(entry) => *entry,
                None => return false,
            }
        };

        state.content = format!("/{} ", entry.keyword);
        state.cursor = state.content.len();
        self.close_command_palette();
        true
    }

    pub fn set_subject(&mut self, subject: Subject) {
        self.subject = subject;
    }

    pub fn content(&self) -> String {
        self.state.borrow().content.clone()
    }

    pub fn is_palette_open(&self) -> bool {
        self.show_command_palette.get()
    }
}

impl Widget for &ChatComposer {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let state = self.state.borrow();

        let block = Block::default()
            .borders(Borders::ALL)
            .title(format!("✏️  {} 질문 (Enter 전송, Shift+Enter 줄바꿈)", self.subject.display_name()))
            .style(Style::default().fg(Color::Green));

        let inner_area = block.inner(area);
        block.render(area, buf);

        if state.content.is_empty() {
            let placeholder_line = Line::from(vec![Span::styled(
                self.subject.placeholder(),
                Style::default().fg(Color::DarkGray),
            )]);
            buf.set_line(inner_area.x, inner_area.y, &placeholder_line, inner_area.width);
        } else {
            let cursor = state.cursor.min(state.content.len());
            let mut content = state.content.clone();
            content.insert(cursor, '▌');

            // Scroll just far enough that the cursor's row is the last visible one.
            let lines: Vec<&str> = content.split('\n').collect();
            let height = inner_area.height as usize;
            let cursor_row = state.content[..cursor].matches('\n').count();
            let start = (cursor_row + 1).saturating_sub(height);
            for (i, line_text) in lines[start..].iter().take(height).enumerate() {
                let line = Line::from(vec![Span::raw(*line_text)]);
                buf.set_line(inner_area.x, inner_area.y + i as u16, &line, inner_area.width);
            }
        }

        if self.show_command_palette.get() {
            let filtered = self.filtered_commands.borrow();
            let palette_height = (filtered.len().min(5) + 2) as u16;
            let palette_area = Rect {
                x: area.x,
                y: area.y.saturating_sub(palette_height),
                width: area.width,
                height: palette_height.min(area.y),
            };
            if palette_area.height < 3 {
                return;
            }

            let block = Block::default()
                .borders(Borders::ALL)
                .title("Commands")
                .style(Style::default().fg(Color::Blue));
            let inner = block.inner(palette_area);
            block.render(palette_area, buf);

            let selected = self.selected_command.get();
            for (index, entry) in filtered.iter().enumerate() {
                if index >= inner.height as usize {
                    break;
                }

                let style = if selected == Some(index) {
                    Style::default().fg(Color::Black).bg(Color::Cyan).add_modifier(Modifier::BOLD)
                } else {
                    Style::default().fg(Color::White)
                };

                let line = Line::from(vec![
                    Span::styled(format!("/{}", entry.keyword), style),
                    Span::styled(" — ", Style::default().fg(Color::DarkGray)),
                    Span::styled(entry.description, Style::default().fg(Color::Gray)),
                ]);

                buf.set_line(inner.x, inner.y + index as u16, &line, inner.width);
            }
        }
    }
}
