//! Splits message text into plain text, inline math and block math.
//!
//! Two passes: block spans `\[ ... \]` are cut out first (they may span lines),
//! then every remaining stretch is scanned for single-line inline spans
//! `\( ... \)`. Both matches are non-greedy, so adjacent spans never merge.
//!
//! Malformed input never fails: an opener without a closer is ordinary text,
//! and inline delimiters inside a block span are left to the block's value.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::prompts::{BLOCK_MATH_DELIMITERS, INLINE_MATH_DELIMITERS};

static BLOCK_MATH: Lazy<Regex> = Lazy::new(|| {
    let (open, close) = BLOCK_MATH_DELIMITERS;
    Regex::new(&span_pattern("(?s)", open, close)).expect("block math pattern compiles")
});

// Without `s`, `.` stops at a newline, so inline spans stay on one line.
static INLINE_MATH: Lazy<Regex> = Lazy::new(|| {
    let (open, close) = INLINE_MATH_DELIMITERS;
    Regex::new(&span_pattern("", open, close)).expect("inline math pattern compiles")
});

fn span_pattern(flags: &str, open: &str, close: &str) -> String {
    format!("{flags}{}(.*?){}", regex::escape(open), regex::escape(close))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentKind {
    Plain,
    InlineMath,
    BlockMath,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextSegment {
    pub kind: SegmentKind,
    pub value: String,
}

impl TextSegment {
    pub fn plain(value: impl Into<String>) -> Self {
        Self {
            kind: SegmentKind::Plain,
            value: value.into(),
        }
    }

    pub fn inline_math(value: impl Into<String>) -> Self {
        Self {
            kind: SegmentKind::InlineMath,
            value: value.into(),
        }
    }

    pub fn block_math(value: impl Into<String>) -> Self {
        Self {
            kind: SegmentKind::BlockMath,
            value: value.into(),
        }
    }
}

/// Segment `content` in source order. Pure: same input, same output.
pub fn segment(content: &str) -> Vec<TextSegment> {
    let mut segments = Vec::new();
    for piece in split_on(&BLOCK_MATH, content, TextSegment::block_math) {
        match piece {
            Piece::Match(block) => segments.push(block),
            Piece::Rest(text) => {
                for inner in split_on(&INLINE_MATH, text, TextSegment::inline_math) {
                    match inner {
                        Piece::Match(inline) => segments.push(inline),
                        Piece::Rest(plain) => segments.push(TextSegment::plain(plain)),
                    }
                }
            }
        }
    }
    segments
}

enum Piece<'a> {
    Match(TextSegment),
    Rest(&'a str),
}

/// Cut `text` at every match of `pattern`, keeping unmatched stretches as borrowed slices.
fn split_on<'a>(
    pattern: &Regex,
    text: &'a str,
    make: fn(String) -> TextSegment,
) -> Vec<Piece<'a>> {
    let mut pieces = Vec::new();
    let mut last = 0;

    for caps in pattern.captures_iter(text) {
        let (Some(whole), Some(inner)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        if whole.start() > last {
            pieces.push(Piece::Rest(&text[last..whole.start()]));
        }
        pieces.push(Piece::Match(make(inner.as_str().to_string())));
        last = whole.end();
    }

    if last < text.len() {
        pieces.push(Piece::Rest(&text[last..]));
    }
    pieces
}
