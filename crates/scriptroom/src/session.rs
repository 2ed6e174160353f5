use scriptroom_rhai::{ExecutionEngine, UnitResult};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::{
    config::SessionConfig,
    error::{Error, Result},
    projector::{ResultFragment, Transcript, project},
    schema::{RunScriptParams, Tool, ToolResult, run_script_tool},
    sink::AppendSink,
    streamer::{MarkdownStreamer, Newlines, closes_fence},
};

/// Info string on the fence around the echoed script.
const SOURCE_LANG: &str = "rhai";

/// One conversation's script runtime.
///
/// Bindings made by one `run_script` call are visible to the next. Separate
/// sessions share nothing.
pub struct ScriptSession {
    engine: ExecutionEngine,
    config: SessionConfig,
}

impl ScriptSession {
    /// Create a session, validating the configuration.
    pub fn new(config: SessionConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            engine: ExecutionEngine::new(config.script.clone()),
            config,
        })
    }

    /// The session configuration.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// The underlying execution engine.
    pub fn engine(&self) -> &ExecutionEngine {
        &self.engine
    }

    /// Forget all bindings.
    pub fn reset(&mut self) {
        self.engine.reset();
    }

    /// Definition of the tool this session serves.
    pub fn tool(&self) -> Tool {
        run_script_tool()
    }

    /// Handle a tool call with raw JSON arguments.
    pub async fn call<S: AppendSink>(&mut self, arguments: Value, sink: S) -> Result<ToolResult> {
        let params: RunScriptParams = serde_json::from_value(arguments)?;
        self.run_script(&params.code, sink).await
    }

    /// Run a script, streaming the human view to `sink` as each unit
    /// finishes, and return the model view.
    ///
    /// The stream starts with the script itself in a fenced block of its
    /// own. The model view never repeats the script.
    ///
    /// Script failures are reported in the returned [`ToolResult`]. An `Err`
    /// means the sink failed, in which case units after the failure are not
    /// run.
    pub async fn run_script<S: AppendSink>(&mut self, code: &str, sink: S) -> Result<ToolResult> {
        let mut streamer = MarkdownStreamer::with_fence_len(sink, self.config.fence_len)?;
        let mut transcript = Transcript::new();
        let mut units = 0;

        let mut outcome = echo_source(&mut streamer, code).await;
        if outcome.is_ok() {
            for result in self.engine.run(code) {
                units += 1;
                let projection = project(&result);
                if let Err(err) = emit(&mut streamer, &result, &projection.human).await {
                    outcome = Err(err);
                    break;
                }
                transcript.record(&result, projection.model);
            }
        }

        let closed = streamer.close().await;
        if let Err(err) = outcome {
            warn!(error = %err, units, "sink failed, script abandoned");
            if let Err(close_err) = closed {
                debug!(error = %close_err, "could not close fence");
            }
            return Err(err);
        }
        closed?;

        let result = transcript.finish();
        info!(
            units,
            error = result.error_summary.as_deref(),
            "script finished"
        );
        Ok(result)
    }
}

/// Stream the submitted script as a fenced block. Blank scripts are skipped.
async fn echo_source<S: AppendSink>(streamer: &mut MarkdownStreamer<S>, code: &str) -> Result<()> {
    let source = code.trim_end();
    if source.trim_start().is_empty() {
        return Ok(());
    }
    let fence = streamer.fence().to_string();
    let source = defuse_fences(source, &fence);
    streamer
        .md(format!("{fence}{SOURCE_LANG}\n{source}\n{fence}\n"), Newlines::BEFORE)
        .await
}

/// Stream one unit's human fragments.
async fn emit<S: AppendSink>(
    streamer: &mut MarkdownStreamer<S>,
    result: &UnitResult,
    fragments: &[ResultFragment],
) -> Result<()> {
    for fragment in fragments {
        match fragment {
            ResultFragment::CodeText(text) => {
                let text = defuse_fences(text, streamer.fence());
                streamer.code(text, Newlines::NONE).await?;
            }
            ResultFragment::ProseText(text) => {
                streamer.md(text, Newlines::BEFORE).await?;
            }
            ResultFragment::ImageInline(image) => {
                debug!(source = %result.source, bytes = image.data.len(), "streaming plot");
                streamer
                    .md(format!("\n{}\n", image.markup()), Newlines::BOTH)
                    .await?;
            }
        }
    }
    Ok(())
}

/// Indent lines that would otherwise close the fence. Four spaces turn such
/// a line into indented text, which never closes a fence.
fn defuse_fences(text: &str, fence: &str) -> String {
    if !text.lines().any(|line| closes_fence(line, fence)) {
        return text.to_string();
    }
    warn!("text contains the fence token, indenting it");
    text.split_inclusive('\n')
        .map(|line| {
            if closes_fence(line, fence) {
                format!("    {line}")
            } else {
                line.to_string()
            }
        })
        .collect()
}

impl std::fmt::Debug for ScriptSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptSession")
            .field("config", &self.config)
            .field("variables", &self.engine.state().variable_names())
            .finish()
    }
}

impl TryFrom<SessionConfig> for ScriptSession {
    type Error = Error;

    fn try_from(config: SessionConfig) -> Result<Self> {
        Self::new(config)
    }
}
