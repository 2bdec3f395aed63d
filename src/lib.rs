//! Subject-aware exam problem solving over a chat-completions API: a relay
//! that composes the prompt, a chat session with a single pending slot, and a
//! splitter that marks LaTeX math in answers for rendering.

pub mod app;
pub mod client;
pub mod config;
pub mod error;
pub mod events;
pub mod image;
pub mod llm;
pub mod prompts;
pub mod relay;
pub mod segment;
pub mod server;
pub mod session;
pub mod tui;
pub mod ui;

pub use error::{ImageError, RelayError};
pub use events::{ChatTurn, Subject, TurnRole};
pub use relay::{Relay, SolveRequest, SolveResponse, Solver};
pub use segment::{SegmentKind, TextSegment, segment};
pub use session::{ChatSession, SubmitOutcome};
