use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumIter, EnumString, IntoEnumIterator, IntoStaticStr};

/// Subject selector that picks the instruction addendum for a question
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    Serialize,
    Deserialize,
    EnumString,
    EnumIter,
    AsRefStr,
    IntoStaticStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Subject {
    /// 수학
    #[default]
    Math,
    /// 화학
    Chem,
    /// 생명과학
    Bio,
}

impl Subject {
    /// Parse a wire tag. Unknown tags are `None`, which means "base instruction only".
    pub fn from_tag(tag: &str) -> Option<Subject> {
        tag.trim().to_lowercase().parse().ok()
    }

    /// Tag sent over the relay boundary (`math`, `chem`, `bio`).
    pub fn tag(self) -> &'static str {
        self.into()
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Subject::Math => "수학",
            Subject::Chem => "화학",
            Subject::Bio => "생명",
        }
    }

    /// Example question shown in an empty composer.
    pub fn placeholder(&self) -> &'static str {
        match self {
            Subject::Math => "예) \\(x^2-5x+6=0\\) 풀어줘",
            Subject::Chem => "예) 0.5M HCl 100 mL와 0.5M NaOH 80 mL 혼합 시 pH?",
            Subject::Bio => "예) A형 아버지(IAi), B형 어머니(IBi) 자녀 혈액형 확률?",
        }
    }

    pub fn all() -> Vec<Subject> {
        Subject::iter().collect()
    }

    /// Position in tab order.
    pub fn index(&self) -> usize {
        Subject::iter().position(|s| s == *self).unwrap_or(0)
    }

    pub fn next(&self) -> Subject {
        let all = Subject::all();
        all[(self.index() + 1) % all.len()]
    }

    pub fn previous(&self) -> Subject {
        let all = Subject::all();
        all[(self.index() + all.len() - 1) % all.len()]
    }
}

impl std::fmt::Display for Subject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.tag())
    }
}

/// Who authored a transcript turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    User,
    Bot,
}

/// One message in the chat transcript. Immutable once appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatTurn {
    role: TurnRole,
    content: String,
    timestamp: DateTime<Utc>,
}

impl ChatTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(TurnRole::User, content)
    }

    pub fn bot(content: impl Into<String>) -> Self {
        Self::new(TurnRole::Bot, content)
    }

    fn new(role: TurnRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn role(&self) -> TurnRole {
        self.role
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subject_tags_round_trip() {
        for subject in Subject::all() {
            assert_eq!(Subject::from_tag(subject.tag()), Some(subject));
        }
        assert_eq!(Subject::from_tag(" CHEM "), Some(Subject::Chem));
    }

    #[test]
    fn unknown_subject_tag_is_none() {
        assert_eq!(Subject::from_tag("physics"), None);
        assert_eq!(Subject::from_tag(""), None);
    }

    #[test]
    fn math_is_the_default_subject() {
        assert_eq!(Subject::default(), Subject::Math);
        assert_eq!(Subject::default().index(), 0);
    }

    #[test]
    fn subject_cycles_in_tab_order() {
        assert_eq!(Subject::Math.next(), Subject::Chem);
        assert_eq!(Subject::Bio.next(), Subject::Math);
        assert_eq!(Subject::Math.previous(), Subject::Bio);
    }

    #[test]
    fn subject_serializes_lowercase() {
        let json = serde_json::to_string(&Subject::Bio).unwrap();
        assert_eq!(json, "\"bio\"");
    }
}
