//! Tool-facing data types.
//!
//! The content blocks, tool result and tool definition exchanged with the
//! agent. These serialize with the field names agents expect
//! (`mimeType`, `inputSchema`, `structuredContent`).

/// Content payload types.
mod content;
/// Tool definition and result types.
mod tools;

pub use content::*;
pub use tools::*;
