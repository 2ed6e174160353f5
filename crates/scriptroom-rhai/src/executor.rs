use std::{collections::HashSet, ops::Range};

use rhai::{AST, Dynamic, Engine, ParseError, Scope, Variant};
use serde_json::Value;
use tracing::{debug, info};

use crate::{
    capture::CaptureHarness,
    config::ScriptConfig,
    engine::build_engine,
    error::{ScriptError, ScriptResult},
    plot::{Figure, PlotArtifact},
    splitter::{ExecutionUnit, UnitKind, Units, split_units},
};

/// Bindings that persist across submissions in one session.
///
/// Variables live in a Rhai [`Scope`]; `fn` definitions live in a
/// functions-only [`AST`] that is merged into every unit before it runs.
pub struct SessionState {
    scope: Scope<'static>,
    library: AST,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            scope: Scope::new(),
            library: AST::empty(),
        }
    }
}

impl SessionState {
    /// Names of all variables currently bound.
    pub fn variable_names(&self) -> Vec<String> {
        self.scope
            .iter()
            .map(|(name, _, _)| name.to_string())
            .collect()
    }

    /// Read a variable, if bound and of type `T`.
    pub fn get_value<T: Variant + Clone>(&self, name: &str) -> Option<T> {
        self.scope.get_value(name)
    }

    /// Names of all functions defined so far.
    pub fn function_names(&self) -> Vec<String> {
        self.library
            .iter_functions()
            .map(|f| f.name.to_string())
            .collect()
    }

    /// Drop bindings shadowed by a later `let` of the same name, keeping
    /// one entry per name in first-bound order.
    fn collapse_shadowed(&mut self) {
        let mut seen = HashSet::new();
        if self.scope.iter_raw().all(|(name, _, _)| seen.insert(name.to_string())) {
            return;
        }

        let entries: Vec<(String, bool, Dynamic)> = self
            .scope
            .iter_raw()
            .map(|(name, constant, value)| (name.to_string(), constant, value.clone()))
            .collect();
        seen.clear();
        let mut kept: Vec<_> = entries
            .into_iter()
            .rev()
            .filter(|(name, _, _)| seen.insert(name.clone()))
            .collect();
        kept.reverse();

        let mut scope = Scope::new();
        for (name, constant, value) in kept {
            if constant {
                scope.push_constant_dynamic(name, value);
            } else {
                scope.push_dynamic(name, value);
            }
        }
        self.scope = scope;
    }
}

/// The result of running one unit.
#[derive(Debug, Clone)]
pub struct UnitResult {
    /// Source of the unit; empty for a whole-script syntax fault.
    pub source: String,
    /// Byte range of the unit within the submitted script.
    pub span: Option<Range<usize>>,
    /// Captured `print`/`debug` output.
    pub output: String,
    /// Debug rendering of an expression unit's value.
    pub return_value: Option<String>,
    /// The same value as JSON, when it has a JSON form.
    pub return_json: Option<Value>,
    /// The first figure shown by the unit.
    pub plot: Option<PlotArtifact>,
    /// Set when the unit failed; no later unit in the batch runs.
    pub error: Option<ScriptError>,
}

impl UnitResult {
    fn syntax_fault(err: ParseError) -> Self {
        Self {
            source: String::new(),
            span: None,
            output: String::new(),
            return_value: None,
            return_json: None,
            plot: None,
            error: Some(ScriptError::Syntax(err)),
        }
    }

    /// Whether the unit succeeded.
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Runs scripts unit by unit against one session's persistent bindings.
pub struct ExecutionEngine {
    engine: Engine,
    harness: CaptureHarness,
    state: SessionState,
    config: ScriptConfig,
}

impl ExecutionEngine {
    /// Create an engine with a fresh session.
    pub fn new(config: ScriptConfig) -> Self {
        let harness = CaptureHarness::new(config.default_size);
        let engine = build_engine(&config, &harness);
        Self {
            engine,
            harness,
            state: SessionState::default(),
            config,
        }
    }

    /// The configuration this engine was built with.
    pub fn config(&self) -> &ScriptConfig {
        &self.config
    }

    /// The session's persistent bindings.
    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Forget every binding and function.
    pub fn reset(&mut self) {
        self.state = SessionState::default();
    }

    /// Run a script, yielding one result per unit as each unit finishes.
    ///
    /// A unit only runs when the previous result has been pulled from the
    /// iterator. The first failing unit is the last one yielded. A script
    /// that does not parse yields a single result carrying the syntax error,
    /// and nothing runs.
    pub fn run<'a>(&'a mut self, script: &'a str) -> Run<'a> {
        let pending = match self.engine.compile_with_scope(&self.state.scope, script) {
            Ok(_) => Pending::Units(split_units(script)),
            Err(err) => {
                info!(error = %err, "script failed to parse");
                Pending::Fault(Some(err))
            }
        };
        Run {
            engine: self,
            pending,
            executed: 0,
            halted: false,
        }
    }

    /// Run a script to completion and collect its results.
    pub fn run_all(&mut self, script: &str) -> Vec<UnitResult> {
        self.run(script).collect()
    }

    /// Run a single unit with its output and figures captured.
    ///
    /// Errors are stored on the result; they never propagate.
    pub fn run_unit(&mut self, unit: &ExecutionUnit) -> UnitResult {
        debug!(line = unit.line, kind = ?unit.kind, "running unit");
        let harness = self.harness.clone();
        let guard = harness.begin();
        let outcome = self.execute(unit);
        let captured = guard.finish();

        let (value, error) = match outcome {
            Ok(value) => (value, None),
            Err(err) => {
                debug!(line = unit.line, error = %err, "unit failed");
                (None, Some(err))
            }
        };
        let return_json = value
            .as_ref()
            .and_then(|v| rhai::serde::from_dynamic::<Value>(v).ok());

        UnitResult {
            source: unit.source.clone(),
            span: Some(unit.span.clone()),
            output: captured.output,
            return_value: value.as_ref().map(render_value),
            return_json,
            plot: captured.plot,
            error,
        }
    }

    fn execute(&mut self, unit: &ExecutionUnit) -> ScriptResult<Option<Dynamic>> {
        let compiled = self
            .engine
            .compile_with_scope(&self.state.scope, &unit.source)
            .map_err(ScriptError::Syntax)?;
        let ast = self.state.library.merge(&compiled);

        let value = self
            .engine
            .eval_ast_with_scope::<Dynamic>(&mut self.state.scope, &ast);
        self.state.collapse_shadowed();
        let value = value?;

        self.state.library.combine(compiled.clone_functions_only());

        Ok(match unit.kind {
            UnitKind::Expression if !value.is_unit() => Some(value),
            _ => None,
        })
    }
}

/// Debug rendering of a value, the analogue of a `repr`.
fn render_value(value: &Dynamic) -> String {
    match value.read_lock::<Figure>() {
        Some(fig) => fig.to_string(),
        None => format!("{value:?}"),
    }
}

enum Pending<'a> {
    Fault(Option<ParseError>),
    Units(Units<'a>),
}

/// Lazy sequence of unit results for one script. See [`ExecutionEngine::run`].
pub struct Run<'a> {
    engine: &'a mut ExecutionEngine,
    pending: Pending<'a>,
    executed: usize,
    halted: bool,
}

impl Run<'_> {
    /// Units run so far.
    pub fn executed(&self) -> usize {
        self.executed
    }
}

impl Iterator for Run<'_> {
    type Item = UnitResult;

    fn next(&mut self) -> Option<UnitResult> {
        if self.halted {
            return None;
        }
        let result = match &mut self.pending {
            Pending::Fault(err) => err.take().map(UnitResult::syntax_fault),
            Pending::Units(units) => {
                let unit = units.next()?;
                self.executed += 1;
                Some(self.engine.run_unit(&unit))
            }
        };
        if result.as_ref().is_none_or(|r| r.error.is_some()) {
            self.halted = true;
            info!(executed = self.executed, "script halted");
        }
        result
    }
}
