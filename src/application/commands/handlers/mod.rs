//! Command Handlers 实现
//!
//! 所有 CommandHandler 的具体实现

mod submission_handlers;

pub use submission_handlers::*;
