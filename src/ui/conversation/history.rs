//! Transcript view with segmented math rendering

use std::cell::Cell;

use chrono::Local;
use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Scrollbar, ScrollbarOrientation, ScrollbarState, StatefulWidget, Widget},
};

use crate::events::{ChatTurn, TurnRole};
use crate::ui::text::render_lines;

/// Shown while the transcript is empty
pub const EMPTY_HINT: &str = "질문을 입력하고 Enter를 눌러 시작하세요. (Shift+Enter 줄바꿈)";
/// Shown under the last turn while an answer is awaited
pub const PENDING_INDICATOR: &str = "분석 중...";

const SPINNER: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];
const CONTENT_INDENT: &str = "  ";

/// Scroll and animation state for the transcript. Scrolling is counted in
/// lines from the bottom, so new turns stay in view unless the user scrolled up.
#[derive(Debug, Default)]
pub struct ChatHistory {
    scroll_from_bottom: usize,
    max_scroll: Cell<usize>,
    tick: usize,
}

/// Borrowed transcript data for one frame
pub struct HistoryView<'a> {
    pub history: &'a ChatHistory,
    pub turns: &'a [ChatTurn],
    pub pending: bool,
}

impl ChatHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn scroll_up(&mut self, lines: usize) {
        self.scroll_from_bottom = (self.scroll_from_bottom + lines).min(self.max_scroll.get());
    }

    pub fn scroll_down(&mut self, lines: usize) {
        self.scroll_from_bottom = self.scroll_from_bottom.saturating_sub(lines);
    }

    pub fn scroll_to_bottom(&mut self) {
        self.scroll_from_bottom = 0;
    }

    pub fn scroll_offset(&self) -> usize {
        self.scroll_from_bottom
    }

    /// Advance the pending spinner
    pub fn on_tick(&mut self) {
        self.tick = self.tick.wrapping_add(1);
    }

    /// Every display line for `turns` at `width` columns, oldest first.
    pub fn lines(&self, turns: &[ChatTurn], pending: bool, width: usize) -> Vec<Line<'static>> {
        let mut lines = Vec::new();
        for turn in turns {
            lines.extend(render_turn(turn, width));
            lines.push(Line::default());
        }

        if pending {
            let frame = SPINNER[self.tick % SPINNER.len()];
            lines.push(Line::from(vec![
                Span::styled(format!("{frame} "), Style::default().fg(Color::Yellow)),
                Span::styled(PENDING_INDICATOR, Style::default().fg(Color::Gray).add_modifier(Modifier::ITALIC)),
            ]));
        }
        lines
    }
}

impl Widget for HistoryView<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let block = Block::default().borders(Borders::ALL).title(" 풀이 기록 ");
        let inner = block.inner(area);
        block.render(area, buf);

        if self.turns.is_empty() && !self.pending {
            let hint = Line::from(Span::styled(EMPTY_HINT, Style::default().fg(Color::DarkGray)));
            buf.set_line(inner.x + 1, inner.y, &hint, inner.width.saturating_sub(1));
            return;
        }

        let width = inner.width.saturating_sub(1) as usize;
        let all_lines = self.history.lines(self.turns, self.pending, width);
        let height = inner.height as usize;
        let total = all_lines.len();

        let max_scroll = total.saturating_sub(height);
        self.history.max_scroll.set(max_scroll);
        let offset = self.history.scroll_from_bottom.min(max_scroll);
        let start = max_scroll - offset;

        for (i, line) in all_lines.iter().skip(start).take(height).enumerate() {
            buf.set_line(inner.x, inner.y + i as u16, line, inner.width);
        }

        if max_scroll > 0 {
            let mut state = ScrollbarState::new(max_scroll).position(start);
            Scrollbar::default()
                .orientation(ScrollbarOrientation::VerticalRight)
                .begin_symbol(Some("↑"))
                .end_symbol(Some("↓"))
                .render(inner, buf, &mut state);
        }
    }
}

fn render_turn(turn: &ChatTurn, width: usize) -> Vec<Line<'static>> {
    let (icon, label, style) = match turn.role() {
        TurnRole::User => ("👤", "질문", Style::default().fg(Color::Blue)),
        TurnRole::Bot => ("🤖", "풀이", Style::default().fg(Color::White)),
    };
    let time = turn.timestamp().with_timezone(&Local).format("%H:%M:%S");

    let mut lines = vec![Line::from(Span::styled(
        format!("{icon} {label} {time}"),
        Style::default().fg(Color::DarkGray),
    ))];

    let body_width = width.saturating_sub(CONTENT_INDENT.len());
    for mut line in render_lines(turn.content(), style, body_width) {
        line.spans.insert(0, Span::raw(CONTENT_INDENT));
        lines.push(line);
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plain(lines: &[Line]) -> Vec<String> {
        lines
            .iter()
            .map(|l| l.spans.iter().map(|s| s.content.as_ref()).collect())
            .collect()
    }

    fn render(history: &ChatHistory, turns: &[ChatTurn], pending: bool, height: u16) -> Buffer {
        let area = Rect::new(0, 0, 40, height);
        let mut buf = Buffer::empty(area);
        HistoryView { history, turns, pending }.render(area, &mut buf);
        buf
    }

    fn buffer_text(buf: &Buffer) -> String {
        buf.content().iter().map(|c| c.symbol()).collect()
    }

    #[test]
    fn each_turn_has_a_header_and_indented_body() {
        let history = ChatHistory::new();
        let turns = vec![ChatTurn::user("2+2=?"), ChatTurn::bot(r"답은 \(4\)")];
        let lines = plain(&history.lines(&turns, false, 40));

        assert!(lines[0].contains("질문"));
        assert_eq!(lines[1], "  2+2=?");
        assert_eq!(lines[2], "");
        assert!(lines[3].contains("풀이"));
        assert_eq!(lines[4], "  답은 4");
    }

    #[test]
    fn pending_adds_the_indicator() {
        let history = ChatHistory::new();
        let turns = vec![ChatTurn::user("q")];
        let lines = plain(&history.lines(&turns, true, 40));
        assert!(lines.last().unwrap().ends_with(PENDING_INDICATOR));

        let idle = plain(&history.lines(&turns, false, 40));
        assert!(!idle.iter().any(|l| l.contains(PENDING_INDICATOR)));
    }

    #[test]
    fn empty_transcript_shows_the_hint() {
        let history = ChatHistory::new();
        let buf = render(&history, &[], false, 6);
        assert!(buffer_text(&buf).contains("Enter"));
    }

    #[test]
    fn scrolling_is_clamped_to_the_content() {
        let mut history = ChatHistory::new();
        let turns: Vec<ChatTurn> = (0..10).map(|i| ChatTurn::user(format!("q{i}"))).collect();
        render(&history, &turns, false, 8);

        history.scroll_up(1_000);
        let max = history.scroll_offset();
        assert!(max > 0 && max < 1_000);

        history.scroll_down(max + 5);
        assert_eq!(history.scroll_offset(), 0);
    }
}
