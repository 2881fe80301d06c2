/// Single source of truth for the message-command prefix.
pub const COMMAND_PREFIX: char = '!';
/// Pure parser helpers for code-block message arguments.
pub mod parse;
/// Pagination primitives and the reaction-driven paginator interface.
pub mod pagination;
