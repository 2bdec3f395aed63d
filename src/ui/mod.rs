pub mod conversation;
pub mod text;
