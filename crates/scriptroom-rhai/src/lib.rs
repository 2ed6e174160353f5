#![warn(missing_docs)]

//! Statement-level Rhai execution for scriptroom.
//!
//! A script is split into top-level units, and each unit runs against a
//! session's persistent bindings with its `print`/`debug` output and any
//! figure it shows captured into a [`UnitResult`]. Execution is fail-fast:
//! the first failing unit ends the batch.

mod capture;
mod config;
mod engine;
mod error;
mod executor;
mod plot;
mod splitter;

pub use capture::{CaptureGuard, CaptureHarness, Captured};
pub use config::ScriptConfig;
pub use error::{ScriptError, ScriptErrorInfo, ScriptResult, format_error};
pub use executor::{ExecutionEngine, Run, SessionState, UnitResult};
pub use plot::{Figure, PlotArtifact};
pub use splitter::{ExecutionUnit, UnitKind, Units, split_units};
