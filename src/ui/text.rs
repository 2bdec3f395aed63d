//! Segmented message text turned into terminal lines.

use ratatui::{
    style::{Color, Modifier, Style},
    text::{Line, Span},
};
use unicode_width::UnicodeWidthChar;

use crate::segment::{SegmentKind, segment};

const BLOCK_INDENT: &str = "    ";

type Run = (String, Style);

pub fn inline_math_style() -> Style {
    Style::default().fg(Color::Cyan).add_modifier(Modifier::ITALIC)
}

pub fn block_math_style() -> Style {
    Style::default().fg(Color::Magenta).add_modifier(Modifier::BOLD)
}

/// Lay out `content` for a column `width` cells wide.
///
/// Plain text keeps `base`, inline math is a styled span inside its line and
/// block math gets indented lines of its own. Lines wrap per character cell,
/// so wide (CJK) characters count twice.
pub fn render_lines(content: &str, base: Style, width: usize) -> Vec<Line<'static>> {
    logical_lines(content, base)
        .into_iter()
        .flat_map(|runs| wrap(runs, width))
        .collect()
}

/// One-line-per-row text for a plain terminal: `$...$` around inline math and
/// `$$ ... $$` rows around block math.
pub fn marked_text(content: &str) -> String {
    let mut out = String::new();
    let mut after_block = false;
    for seg in segment(content) {
        match seg.kind {
            SegmentKind::Plain if after_block => {
                out.push_str(seg.value.strip_prefix('\n').unwrap_or(&seg.value));
            }
            SegmentKind::Plain => out.push_str(&seg.value),
            SegmentKind::InlineMath => {
                out.push('$');
                out.push_str(seg.value.trim());
                out.push('$');
            }
            SegmentKind::BlockMath => {
                if !out.is_empty() && !out.ends_with('\n') {
                    out.push('\n');
                }
                out.push_str("$$ ");
                out.push_str(seg.value.trim());
                out.push_str(" $$");
                out.push('\n');
            }
        }
        after_block = seg.kind == SegmentKind::BlockMath;
    }
    out
}

fn logical_lines(content: &str, base: Style) -> Vec<Vec<Run>> {
    let mut lines: Vec<Vec<Run>> = vec![Vec::new()];
    let mut after_block = false;

    for seg in segment(content) {
        match seg.kind {
            SegmentKind::Plain => {
                let text: &str = if after_block {
                    seg.value.strip_prefix('\n').unwrap_or(&seg.value)
                } else {
                    &seg.value
                };
                for (i, part) in text.split('\n').enumerate() {
                    if i > 0 {
                        lines.push(Vec::new());
                    }
                    push_run(&mut lines, part, base);
                }
            }
            SegmentKind::InlineMath => {
                // An empty span still leaves a styled run behind.
                if let Some(line) = lines.last_mut() {
                    line.push((seg.value.replace('\n', " "), inline_math_style()));
                }
            }
            SegmentKind::BlockMath => {
                if lines.last().is_some_and(Vec::is_empty) {
                    lines.pop();
                }

                let body = seg.value.trim();
                let rows: Vec<&str> = if body.is_empty() { vec![""] } else { body.lines().collect() };
                for row in rows {
                    lines.push(vec![(format!("{BLOCK_INDENT}{}", row.trim()), block_math_style())]);
                }
                lines.push(Vec::new());
            }
        }
        after_block = seg.kind == SegmentKind::BlockMath;
    }

    if lines.len() > 1 && lines.last().is_some_and(Vec::is_empty) {
        lines.pop();
    }
    lines
}

fn push_run(lines: &mut [Vec<Run>], text: &str, style: Style) {
    if text.is_empty() {
        return;
    }
    if let Some(line) = lines.last_mut() {
        line.push((text.to_string(), style));
    }
}

fn wrap(runs: Vec<Run>, width: usize) -> Vec<Line<'static>> {
    if width == 0 {
        return vec![Line::from(
            runs.into_iter()
                .map(|(text, style)| Span::styled(text, style))
                .collect::<Vec<_>>(),
        )];
    }

    let mut out = Vec::new();
    let mut current: Vec<Span<'static>> = Vec::new();
    let mut used = 0;

    for (text, style) in runs {
        if text.is_empty() {
            current.push(Span::styled(text, style));
            continue;
        }
        let mut chunk = String::new();
        for ch in text.chars() {
            let w = ch.width().unwrap_or(0);
            if used > 0 && used + w > width {
                if !chunk.is_empty() {
                    current.push(Span::styled(std::mem::take(&mut chunk), style));
                }
                out.push(Line::from(std::mem::take(&mut current)));
                used = 0;
            }
            chunk.push(ch);
            used += w;
        }
        if !chunk.is_empty() {
            current.push(Span::styled(chunk, style));
        }
    }
    out.push(Line::from(current));
    out
}
