//! Side-effecting parts of the harness: processes, servers, files.

pub mod config;
pub mod consumer;
pub mod debug_dump;
pub mod process;
pub mod server;
pub mod stream;
pub mod tool;
pub mod transition_tool;
