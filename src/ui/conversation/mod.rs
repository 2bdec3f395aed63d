//! Conversation UI components for the chat screen

pub mod commands;
pub mod composer;
pub mod history;
pub mod manager;

pub use commands::{ParsedCommand, SlashCommand, get_help_text};
pub use composer::ChatComposer;
pub use history::ChatHistory;
pub use manager::{ChatAction, ChatManager, SolveResult};
