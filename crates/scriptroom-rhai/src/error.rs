use std::{fmt, sync::Arc};

use rhai::{EvalAltResult, ParseError, Position};
use serde::{Deserialize, Serialize};

/// Serializable error details for a failed unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScriptErrorInfo {
    /// Short error category: `syntax`, `runtime` or `plot`.
    pub error_type: String,
    /// Human-readable error message.
    pub message: String,
    /// Location in the script, when available.
    pub location: Option<String>,
}

/// Result type for script-side operations.
pub type ScriptResult<T> = Result<T, ScriptError>;

/// Errors raised while translating or executing script text.
///
/// These never escape the engine: they are stored on the unit result that
/// produced them.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ScriptError {
    /// The script, or one of its units, failed to parse.
    #[error("Syntax error: {0}")]
    Syntax(ParseError),
    /// A unit raised while running.
    #[error("Runtime error: {0}")]
    Runtime(Arc<EvalAltResult>),
    /// A figure could not be rendered.
    #[error("Plot error: {0}")]
    Plot(String),
}

impl ScriptError {
    /// Whether this is a whole-script parse failure.
    pub fn is_syntax(&self) -> bool {
        matches!(self, Self::Syntax(_))
    }

    /// The message a user should see, without category prefix or position.
    ///
    /// For `throw "x"` this is just `x`.
    pub fn message(&self) -> String {
        match self {
            Self::Syntax(err) => err.err_type().to_string(),
            Self::Runtime(err) => runtime_message(err),
            Self::Plot(msg) => msg.clone(),
        }
    }

    /// Line number the error points at, if known.
    pub fn line(&self) -> Option<usize> {
        match self {
            Self::Syntax(err) => err.position().line(),
            Self::Runtime(err) => err.position().line(),
            Self::Plot(_) => None,
        }
    }

    /// Convert to a structured, serializable form.
    pub fn info(&self) -> ScriptErrorInfo {
        format_error(self)
    }
}

impl From<Box<EvalAltResult>> for ScriptError {
    fn from(err: Box<EvalAltResult>) -> Self {
        match plot_failure(&err) {
            Some(message) => Self::Plot(message),
            None => Self::Runtime(Arc::from(err)),
        }
    }
}

/// Find a figure failure, looking through calls made from script functions.
fn plot_failure(err: &EvalAltResult) -> Option<String> {
    match err {
        EvalAltResult::ErrorRuntime(value, _) => value
            .read_lock::<PlotFailure>()
            .map(|failure| failure.0.clone()),
        EvalAltResult::ErrorInFunctionCall(_, _, inner, _) => plot_failure(inner),
        _ => None,
    }
}

/// Payload thrown by the plotting functions so the engine can tell figure
/// failures apart from script exceptions.
#[derive(Debug, Clone)]
pub(crate) struct PlotFailure(pub(crate) String);

impl fmt::Display for PlotFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Convert a script error to a structured, serializable form.
pub fn format_error(err: &ScriptError) -> ScriptErrorInfo {
    let error_type = match err {
        ScriptError::Syntax(_) => "syntax",
        ScriptError::Runtime(_) => "runtime",
        ScriptError::Plot(_) => "plot",
    };
    ScriptErrorInfo {
        error_type: error_type.to_string(),
        message: err.message(),
        location: err.line().map(|line| format!("line {line}")),
    }
}

fn runtime_message(err: &EvalAltResult) -> String {
    match err {
        EvalAltResult::ErrorRuntime(value, _) => {
            if value.is_unit() {
                "Runtime error".to_string()
            } else {
                value.to_string()
            }
        }
        other => strip_position(&other.to_string(), other.position()),
    }
}

/// Rhai appends ` (line N, position M)` to its messages; the location is
/// reported separately.
fn strip_position(message: &str, pos: Position) -> String {
    if pos.is_none() {
        return message.to_string();
    }
    match message.rfind(" (line ") {
        Some(idx) if message.ends_with(')') => message[..idx].to_string(),
        _ => message.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use rhai::Engine;

    use super::*;

    #[test]
    fn test_thrown_string_message() {
        let engine = Engine::new();
        let err = engine.eval::<()>(r#"throw "x""#).unwrap_err();
        let err = ScriptError::from(err);

        assert!(!err.is_syntax());
        assert_eq!(err.message(), "x");
        assert_eq!(err.line(), Some(1));

        let info = err.info();
        assert_eq!(info.error_type, "runtime");
        assert_eq!(info.location.as_deref(), Some("line 1"));
    }

    #[test]
    fn test_syntax_error_info() {
        let engine = Engine::new();
        let err = engine.compile("let = 1;").unwrap_err();
        let err = ScriptError::Syntax(err);

        assert!(err.is_syntax());
        let info = format_error(&err);
        assert_eq!(info.error_type, "syntax");
        assert_eq!(info.location.as_deref(), Some("line 1"));
        assert!(!info.message.contains("(line"));
    }

    #[test]
    fn test_plot_failure_is_recognized() {
        let err: Box<EvalAltResult> = Box::new(EvalAltResult::ErrorRuntime(
            rhai::Dynamic::from(PlotFailure("bad size".into())),
            Position::NONE,
        ));
        let err = ScriptError::from(err);
        assert!(matches!(err, ScriptError::Plot(ref m) if m == "bad size"));
        assert_eq!(err.to_string(), "Plot error: bad size");
    }

    #[test]
    fn test_strip_position() {
        assert_eq!(
            strip_position("Variable not found: y (line 2, position 1)", Position::new(2, 1)),
            "Variable not found: y"
        );
        assert_eq!(strip_position("no position", Position::NONE), "no position");
    }
}
