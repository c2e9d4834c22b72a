//! 应用层 - 命令（写操作）
//!
//! CQRS 命令侧：处理所有写操作

mod submission_commands;

pub mod handlers;

pub use submission_commands::*;
