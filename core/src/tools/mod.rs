//! Tool system and built-in tools

pub mod base;
pub mod builtin;
pub mod facts;
pub mod registry;

pub use base::{Tool, ToolCall, ToolResult};
pub use facts::{FactClient, FactKind};
pub use registry::ToolRegistry;
