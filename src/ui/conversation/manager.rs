use std::path::PathBuf;

use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use ratatui::{
    buffer::Buffer,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Tabs, Widget, Wrap},
};
use tokio::sync::mpsc;

use crate::error::RelayError;
use crate::events::Subject;
use crate::image::ImageAttachment;
use crate::session::{ChatSession, SubmitOutcome};
use crate::ui::conversation::commands::{ParsedCommand, SlashCommand, get_help_text};
use crate::ui::conversation::composer::{ChatComposer, ComposerResult, SubmitPolicy};
use crate::ui::conversation::history::{ChatHistory, HistoryView};

/// Shown in the status line while an image is attached
pub const IMAGE_ATTACHED_NOTE: &str = "이미지 첨부됨 — 전송 시 함께 분석합니다.";

const KEY_HINTS: &str = "Tab 과목 전환 · PgUp/PgDn 스크롤 · /help 도움말 · Ctrl+C 종료";
const PAGE_LINES: usize = 10;

/// Result of one relay call, delivered back to the event loop
pub type SolveResult = Result<String, RelayError>;

/// Actions that can be requested by the chat manager
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatAction {
    None,
    Exit,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Notice {
    text: String,
    is_error: bool,
}

/// Owns the chat session and its widgets; the event loop feeds it keys,
/// ticks and finished relay calls.
pub struct ChatManager {
    session: ChatSession,
    composer: ChatComposer,
    history: ChatHistory,
    results_tx: mpsc::UnboundedSender<SolveResult>,
    backend: String,
    notice: Option<Notice>,
    show_help: bool,
}

impl ChatManager {
    /// `backend` names where questions go (model id or relay URL) for the header.
    pub fn new(
        session: ChatSession,
        backend: impl Into<String>,
        results_tx: mpsc::UnboundedSender<SolveResult>,
    ) -> Self {
        let subject = session.subject();
        Self {
            session,
            composer: ChatComposer::new(subject),
            history: ChatHistory::new(),
            results_tx,
            backend: backend.into(),
            notice: None,
            show_help: false,
        }
    }

    pub fn session(&self) -> &ChatSession {
        &self.session
    }

    pub fn is_help_open(&self) -> bool {
        self.show_help
    }

    /// Handle key input
    pub fn handle_key(&mut self, key: KeyEvent) -> ChatAction {
        if key.kind != KeyEventKind::Press {
            return ChatAction::None;
        }
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            return ChatAction::Exit;
        }
        if self.show_help {
            self.show_help = false;
            return ChatAction::None;
        }

        match key.code {
            KeyCode::Tab if !self.composer.is_palette_open() => {
                self.set_subject(self.session.subject().next());
                return ChatAction::None;
            }
            KeyCode::BackTab => {
                self.set_subject(self.session.subject().previous());
                return ChatAction::None;
            }
            KeyCode::PageUp => {
                self.history.scroll_up(PAGE_LINES);
                return ChatAction::None;
            }
            KeyCode::PageDown => {
                self.history.scroll_down(PAGE_LINES);
                return ChatAction::None;
            }
            _ => {}
        }

        let policy = SubmitPolicy {
            enabled: !self.session.pending(),
            allow_empty: self.session.image().is_some(),
        };
        match self.composer.handle_key(key, policy) {
            ComposerResult::Submitted(question) => {
                self.submit(question);
                ChatAction::None
            }
            ComposerResult::Command(command) => self.handle_slash_command(command),
            ComposerResult::None => ChatAction::None,
        }
    }

    /// Bracketed paste goes straight into the composer
    pub fn handle_paste(&mut self, text: &str) {
        if !self.show_help {
            self.composer.insert_str(text);
        }
    }

    pub fn on_tick(&mut self) {
        self.history.on_tick();
    }

    /// Record the answer (or failure) of the call started by the last submission.
    pub fn complete(&mut self, result: SolveResult) {
        let detail = result.as_ref().err().map(ToString::to_string);
        let outcome = self.session.complete(result);
        self.history.scroll_to_bottom();

        self.notice = match (outcome, detail) {
            (SubmitOutcome::Failed, Some(detail)) => Some(Notice { text: detail, is_error: true }),
            _ => None,
        };
    }

    fn submit(&mut self, question: String) {
        self.session.set_question(question);
        match self.session.begin_submit() {
            Ok(pending) => {
                self.notice = None;
                self.history.scroll_to_bottom();

                let solver = self.session.solver();
                let results_tx = self.results_tx.clone();
                tokio::spawn(async move {
                    let result = solver.solve(pending.request).await;
                    // The loop is gone when the app is shutting down.
                    let _ = results_tx.send(result);
                });
            }
            Err(SubmitOutcome::Busy) => self.notify_error("이전 질문의 답변을 기다리는 중입니다."),
            Err(_) => {}
        }
    }

    fn set_subject(&mut self, subject: Subject) {
        self.session.set_subject(subject);
        self.composer.set_subject(subject);
    }

    /// Handle slash commands
    fn handle_slash_command(&mut self, command: ParsedCommand) -> ChatAction {
        if self.session.pending() && !command.command.available_while_pending() {
            self.notify_error(format!("/{} 명령은 답변을 기다리는 동안 쓸 수 없습니다.", command.command.command()));
            return ChatAction::None;
        }

        match command.command {
            SlashCommand::Subject => match (command.argument(), command.subject_target()) {
                (None, _) => self.set_subject(self.session.subject().next()),
                (Some(_), Some(subject)) => self.set_subject(subject),
                (Some(arg), None) => self.notify_error(format!("알 수 없는 과목: {arg} (math, chem, bio)")),
            },
            SlashCommand::Image => match command.argument() {
                Some(path) => self.attach_image(path),
                None => self.notify_error("사용법: /image <파일 경로>"),
            },
            SlashCommand::Detach => {
                if self.session.image().is_some() {
                    self.session.clear_image();
                    self.notify("첨부한 이미지를 제거했습니다.");
                }
            }
            SlashCommand::Help => self.show_help = true,
            SlashCommand::Bye => return ChatAction::Exit,
        }
        ChatAction::None
    }

    fn attach_image(&mut self, raw_path: &str) {
        let path = expand_home(raw_path);
        match ImageAttachment::from_path(&path) {
            Ok(image) => {
                tracing::info!(file = %image.file_name(), mime = image.mime_type(), "image attached");
                self.session.attach_image(image);
                self.notice = None;
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "could not attach image");
                self.notify_error(e.to_string());
            }
        }
    }

    fn notify(&mut self, text: impl Into<String>) {
        self.notice = Some(Notice { text: text.into(), is_error: false });
    }

    fn notify_error(&mut self, text: impl Into<String>) {
        self.notice = Some(Notice { text: text.into(), is_error: true });
    }

    fn status_line(&self) -> Line<'static> {
        if let Some(notice) = &self.notice {
            let color = if notice.is_error { Color::Red } else { Color::Green };
            return Line::from(Span::styled(notice.text.clone(), Style::default().fg(color)));
        }
        if let Some(image) = self.session.image() {
            return Line::from(vec![
                Span::styled("📎 ", Style::default().fg(Color::Yellow)),
                Span::styled(IMAGE_ATTACHED_NOTE, Style::default().fg(Color::Yellow)),
                Span::styled(format!(" ({})", image.file_name()), Style::default().fg(Color::DarkGray)),
            ]);
        }
        Line::from(Span::styled(KEY_HINTS, Style::default().fg(Color::DarkGray)))
    }
}

impl Widget for &ChatManager {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3), // Subject tabs
                Constraint::Min(5),    // History
                Constraint::Length(1), // Status
                Constraint::Length(5), // Composer
            ])
            .split(area);

        let titles: Vec<String> = Subject::all()
            .into_iter()
            .map(|s| format!(" {} ", s.display_name()))
            .collect();
        Tabs::new(titles)
            .select(self.session.subject().index())
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .title(format!(" solvr · {} ", self.backend)),
            )
            .highlight_style(Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD))
            .render(chunks[0], buf);

        HistoryView {
            history: &self.history,
            turns: self.session.transcript(),
            pending: self.session.pending(),
        }
        .render(chunks[1], buf);

        buf.set_line(chunks[2].x + 1, chunks[2].y, &self.status_line(), chunks[2].width.saturating_sub(1));

        self.composer.render(chunks[3], buf);

        if self.show_help {
            let popup = centered(area, 64, 14);
            Clear.render(popup, buf);
            Paragraph::new(get_help_text())
                .wrap(Wrap { trim: false })
                .block(
                    Block::default()
                        .borders(Borders::ALL)
                        .title(" 도움말 (아무 키나 누르면 닫힘) "),
                )
                .render(popup, buf);
        }
    }
}

fn centered(area: Rect, width: u16, height: u16) -> Rect {
    let width = width.min(area.width);
    let height = height.min(area.height);
    Rect {
        x: area.x + (area.width - width) / 2,
        y: area.y + (area.height - height) / 2,
        width,
        height,
    }
}

/// `~/x` becomes `<home>/x`; everything else is taken as given.
fn expand_home(raw: &str) -> PathBuf {
    let trimmed = raw.trim();
    match trimmed.strip_prefix("~/") {
        Some(rest) => dirs::home_dir()
            .map(|home| home.join(rest))
            .unwrap_or_else(|| PathBuf::from(trimmed)),
        None => PathBuf::from(trimmed),
    }
}
