//! Projection of unit results into human and model views.
//!
//! Every [`UnitResult`] becomes two fragment lists: one for the streamed
//! markup a person reads, one for the transcript handed back to the agent.
//! The [`Transcript`] accumulates the model side across a script and applies
//! coalescing and image redaction when it is finished.

use scriptroom_rhai::{PlotArtifact, ScriptError, ScriptErrorInfo, UnitResult};
use serde::Serialize;

use crate::schema::{ContentBlock, ImageContent, PNG_MIME_TYPE, ToolResult};

/// CSS class marking images produced by scripts.
pub const PLOT_CLASS: &str = "result-plot";

/// An image carried inline in the output.
#[derive(Debug, Clone, PartialEq)]
pub struct InlineImage {
    /// MIME type of `data`.
    pub mime_type: String,
    /// Encoded image bytes.
    pub data: Vec<u8>,
    /// Pixel size to advertise, or `None` to let the client size it.
    pub size: Option<(u32, u32)>,
}

impl InlineImage {
    /// Build from a rendered figure. Default-size figures carry no size hint.
    pub fn from_plot(plot: &PlotArtifact) -> Self {
        Self {
            mime_type: PNG_MIME_TYPE.to_string(),
            data: plot.png.clone(),
            size: (!plot.is_default_size).then_some(plot.size_pixels),
        }
    }

    /// The base64 content block for this image.
    pub fn content(&self) -> ImageContent {
        ImageContent::from_bytes(&self.data, self.mime_type.as_str())
    }

    /// HTML `img` element embedding the image.
    pub fn markup(&self) -> String {
        let mut tag = format!(
            "<img src=\"{}\" class=\"{PLOT_CLASS}\" alt=\"Plot\"",
            self.content().data_uri()
        );
        if let Some((width, height)) = self.size {
            tag.push_str(&format!(" width=\"{width}\" height=\"{height}\""));
        }
        tag.push('>');
        tag
    }
}

/// One piece of projected output.
#[derive(Debug, Clone, PartialEq)]
pub enum ResultFragment {
    /// Plain text, rendered as markdown.
    ProseText(String),
    /// Text rendered inside a code fence.
    CodeText(String),
    /// An inline image.
    ImageInline(InlineImage),
}

impl ResultFragment {
    /// The text of a prose or code fragment.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::ProseText(text) | Self::CodeText(text) => Some(text),
            Self::ImageInline(_) => None,
        }
    }

    fn into_content(self) -> ContentBlock {
        match self {
            Self::ProseText(text) | Self::CodeText(text) => ContentBlock::text(text),
            Self::ImageInline(image) => ContentBlock::Image(image.content()),
        }
    }
}

/// The two views of one unit result.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Projection {
    /// Fragments for the streamed markup.
    pub human: Vec<ResultFragment>,
    /// Fragments for the agent's transcript.
    pub model: Vec<ResultFragment>,
}

/// Text shown for a failed unit, without the `Error: ` prefix.
pub fn error_text(err: &ScriptError) -> String {
    let message = err.message();
    match err.line() {
        // Units are compiled on their own, so only whole-script parse
        // failures have a line that means anything to the user.
        Some(line) if err.is_syntax() => format!("{message} (line {line})"),
        _ => message,
    }
}

/// Project a unit result into its human and model fragments.
pub fn project(result: &UnitResult) -> Projection {
    let mut projection = Projection::default();
    let repr = result.return_value.as_ref().map(|v| format!("{v}\n"));
    let error = result
        .error
        .as_ref()
        .map(|err| format!("Error: {}\n", error_text(err)));

    let mut prose = String::new();
    for text in [Some(&result.output), repr.as_ref(), error.as_ref()]
        .into_iter()
        .flatten()
        .filter(|text| !text.is_empty())
    {
        projection.human.push(ResultFragment::CodeText(text.clone()));
        prose.push_str(text);
        if !text.ends_with('\n') {
            prose.push('\n');
        }
    }
    if !prose.is_empty() {
        projection.model.push(ResultFragment::ProseText(prose));
    }

    if let Some(plot) = &result.plot {
        let image = ResultFragment::ImageInline(InlineImage::from_plot(plot));
        projection.human.push(image.clone());
        projection.model.push(image);
    }
    projection
}

/// Per-unit record in the structured transcript.
#[derive(Debug, Clone, Serialize)]
struct UnitRecord {
    source: String,
    output: String,
    return_value: Option<String>,
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<ScriptErrorInfo>,
}

/// The model-facing transcript of one script.
#[derive(Debug, Clone, Default)]
pub struct Transcript {
    fragments: Vec<ResultFragment>,
    records: Vec<UnitRecord>,
    error: Option<String>,
}

impl Transcript {
    /// Create an empty transcript.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a fragment, merging it into a preceding text fragment.
    pub fn push(&mut self, fragment: ResultFragment) {
        push_coalesced(&mut self.fragments, fragment);
    }

    /// Add a unit's model fragments and its structured record.
    pub fn record(&mut self, result: &UnitResult, model: Vec<ResultFragment>) {
        for fragment in model {
            self.push(fragment);
        }
        if self.error.is_none() {
            self.error = result.error.as_ref().map(error_text);
        }
        self.records.push(UnitRecord {
            source: result.source.clone(),
            output: result.output.clone(),
            return_value: result.return_value.clone(),
            success: result.is_success(),
            error: result.error.as_ref().map(ScriptError::info),
        });
    }

    /// Fragments so far, coalesced but not yet redacted.
    pub fn fragments(&self) -> &[ResultFragment] {
        &self.fragments
    }

    /// Whether any recorded unit failed.
    pub fn has_error(&self) -> bool {
        self.error.is_some()
    }

    /// Build the tool result.
    ///
    /// When any unit failed, every image is removed and the text around it
    /// merged.
    pub fn finish(self) -> ToolResult {
        let redact = self.error.is_some();
        let mut fragments = Vec::with_capacity(self.fragments.len());
        for fragment in self.fragments {
            if redact && matches!(fragment, ResultFragment::ImageInline(_)) {
                continue;
            }
            push_coalesced(&mut fragments, fragment);
        }

        let mut result = ToolResult::new();
        result.content = fragments
            .into_iter()
            .map(ResultFragment::into_content)
            .collect();
        result.error_summary = self.error;
        result.structured_content = serde_json::to_value(&self.records).ok();
        result
    }
}

fn push_coalesced(fragments: &mut Vec<ResultFragment>, fragment: ResultFragment) {
    match (fragments.last_mut(), fragment) {
        (Some(ResultFragment::ProseText(last)), ResultFragment::ProseText(text))
        | (Some(ResultFragment::CodeText(last)), ResultFragment::CodeText(text)) => {
            last.push_str(&text);
        }
        (_, fragment) => fragments.push(fragment),
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use scriptroom_rhai::{ExecutionEngine, ScriptConfig};

    use super::*;

    fn run(script: &str) -> Vec<UnitResult> {
        ExecutionEngine::new(ScriptConfig::default()).run_all(script)
    }

    fn transcript(script: &str) -> ToolResult {
        let mut transcript = Transcript::new();
        for result in run(script) {
            let projection = project(&result);
            transcript.record(&result, projection.model);
        }
        transcript.finish()
    }

    #[test]
    fn test_expression_projection() {
        let results = run("1+1");
        let projection = project(&results[0]);
        assert_eq!(
            projection.human,
            vec![ResultFragment::CodeText("2\n".into())]
        );
        assert_eq!(
            projection.model,
            vec![ResultFragment::ProseText("2\n".into())]
        );
    }

    #[test]
    fn test_statement_without_output_projects_nothing() {
        let results = run("let a = 1;");
        assert_eq!(project(&results[0]), Projection::default());
    }

    #[test]
    fn test_output_value_and_error_order() {
        let results = run("print(\"out\"); 5; throw \"boom\";");
        let human: Vec<_> = results
            .iter()
            .flat_map(|r| project(r).human)
            .collect();
        assert_eq!(
            human,
            vec![
                ResultFragment::CodeText("out\n".into()),
                ResultFragment::CodeText("5\n".into()),
                ResultFragment::CodeText("Error: boom\n".into()),
            ]
        );
    }

    #[test]
    fn test_single_text_for_simple_script() {
        let result = transcript("1+1");
        assert_eq!(result.content, vec![ContentBlock::text("2\n")]);
        assert!(!result.is_error());
    }

    #[test]
    fn test_adjacent_text_is_coalesced() {
        let result = transcript("print(\"a\");\nprint(\"b\");\n3");
        assert_eq!(result.content, vec![ContentBlock::text("a\nb\n3\n")]);
    }

    #[test]
    fn test_error_summary_and_records() {
        let result = transcript("let x = 1;\nthrow \"x\";\nprint(\"after\");");
        assert_eq!(result.error_summary.as_deref(), Some("x"));
        assert_eq!(result.all_text(), "Error: x\n");
        assert!(!result.all_text().contains("after"));

        let records = result.structured_content.unwrap();
        let records = records.as_array().unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0]["source"], "let x = 1");
        assert_eq!(records[0]["success"], true);
        assert!(records[0].get("error").is_none());
        assert_eq!(records[1]["success"], false);
        assert_eq!(records[1]["error"]["error_type"], "runtime");
    }

    #[test]
    fn test_images_kept_without_error() {
        let result = transcript("let f = figure();\nf.bar([1, 2]);\nf.show();\n1");
        assert_eq!(result.images().count(), 1);
        assert_eq!(result.content.len(), 2);
        assert!(result.content[0].is_image());
        assert_eq!(result.content[1], ContentBlock::text("1\n"));
    }

    #[test]
    fn test_images_redacted_on_error() {
        let result =
            transcript("print(\"a\");\nlet f = figure();\nf.show();\nprint(\"b\");\nthrow \"no\";");
        assert_eq!(result.images().count(), 0);
        // Text on both sides of the removed image is merged.
        assert_eq!(result.content, vec![ContentBlock::text("a\nb\nError: no\n")]);
    }

    #[test]
    fn test_syntax_error_text_has_line() {
        let results = run("let a = 1;\nlet = ;");
        let text = error_text(results[0].error.as_ref().unwrap());
        assert!(text.ends_with("(line 2)"), "{text}");
    }

    #[test]
    fn test_image_markup() {
        let mut image = InlineImage {
            mime_type: PNG_MIME_TYPE.to_string(),
            data: b"png".to_vec(),
            size: None,
        };
        assert_eq!(
            image.markup(),
            "<img src=\"data:image/png;base64,cG5n\" class=\"result-plot\" alt=\"Plot\">"
        );

        image.size = Some((400, 300));
        assert_eq!(
            image.markup(),
            "<img src=\"data:image/png;base64,cG5n\" class=\"result-plot\" alt=\"Plot\" width=\"400\" height=\"300\">"
        );
    }

    #[test]
    fn test_custom_size_plot_has_size_hint() {
        let results = run("let f = figure(4, 3);\nf.show();");
        let image = InlineImage::from_plot(results[1].plot.as_ref().unwrap());
        assert_eq!(image.size, Some((400, 300)));
    }
}
