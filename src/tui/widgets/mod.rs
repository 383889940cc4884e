//! TUI widgets for db-ask.

pub mod chat;
pub mod header;
pub mod input;
pub mod sidebar;
