#![warn(missing_docs)]

//! # scriptroom
//!
//! Run scripts on behalf of a conversational agent and stream the results.
//!
//! ## Overview
//!
//! A [`ScriptSession`] owns one persistent Rhai runtime. Each call to
//! [`ScriptSession::run_script`] splits the submitted script into top-level
//! units, echoes the script to the stream as its own fenced block, runs the
//! units one at a time, and for every finished unit:
//!
//! - streams a human view (output and values in a code fence, figures as
//!   inline images) to an [`AppendSink`] through the [`MarkdownStreamer`];
//! - adds a model view to a [`Transcript`], which becomes the returned
//!   [`ToolResult`](schema::ToolResult).
//!
//! The first unit that fails ends the script. Its error is shown inline and
//! summarized in the tool result, and images are left out of the model view.
//!
//! ## Example
//!
//! ```no_run
//! use scriptroom::{ChannelSink, ScriptSession, SessionConfig};
//!
//! # async fn example() -> scriptroom::Result<()> {
//! let mut session = ScriptSession::new(SessionConfig::default())?;
//! let (sink, mut rx) = ChannelSink::new(16);
//! tokio::spawn(async move {
//!     while let Some(chunk) = rx.recv().await {
//!         print!("{chunk}");
//!     }
//! });
//! let result = session.run_script("let x = 20;\nx * 2", sink).await?;
//! assert_eq!(result.text(), Some("40\n"));
//! # Ok(())
//! # }
//! ```

/// Session configuration.
mod config;
/// Error types and Result alias.
mod error;
/// Result projection and transcript.
mod projector;
/// The `run_script` tool operation.
mod session;
/// Append sinks for streamed output.
mod sink;
/// Markdown streaming state machine.
mod streamer;

/// Tool-facing schema types.
pub mod schema;
pub mod testutils;

pub use config::SessionConfig;
pub use error::{Error, Result};
pub use projector::{InlineImage, PLOT_CLASS, Projection, ResultFragment, Transcript, error_text, project};
pub use session::ScriptSession;
pub use sink::{AppendSink, ChannelSink, NullSink};
pub use streamer::{DEFAULT_FENCE_LEN, MIN_FENCE_LEN, MarkdownStreamer, Newlines, StreamText};

pub use scriptroom_rhai;
