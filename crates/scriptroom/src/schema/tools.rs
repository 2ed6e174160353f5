use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::*;

/// The result of one `run_script` call, as handed back to the agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    /// Transcript content: merged text blocks and, absent errors, images.
    pub content: Vec<ContentBlock>,
    #[serde(rename = "errorSummary", skip_serializing_if = "Option::is_none")]
    /// Message of the error that halted the script, if any.
    pub error_summary: Option<String>,
    #[serde(rename = "structuredContent", skip_serializing_if = "Option::is_none")]
    /// Per-unit records, if any.
    pub structured_content: Option<Value>,
}

impl ToolResult {
    /// Create an empty tool result.
    pub fn new() -> Self {
        Self {
            content: Vec::new(),
            error_summary: None,
            structured_content: None,
        }
    }

    /// Append a content item to the result.
    pub fn with_content(mut self, content: ContentBlock) -> Self {
        self.content.push(content);
        self
    }

    /// Append a text content item to the result.
    pub fn with_text_content(mut self, text: impl Into<String>) -> Self {
        self.content.push(ContentBlock::text(text));
        self
    }

    /// Record the error that halted the script.
    pub fn with_error_summary(mut self, summary: impl Into<String>) -> Self {
        self.error_summary = Some(summary.into());
        self
    }

    /// Whether the script failed.
    pub fn is_error(&self) -> bool {
        self.error_summary.is_some()
    }

    /// Get the first text content block, if any.
    pub fn text(&self) -> Option<&str> {
        self.content.iter().find_map(ContentBlock::as_text)
    }

    /// Get all text content concatenated together.
    ///
    /// Multiple text blocks are joined with newlines. Returns an empty
    /// string if there are no text content blocks.
    pub fn all_text(&self) -> String {
        self.content
            .iter()
            .filter_map(ContentBlock::as_text)
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Image blocks in order.
    pub fn images(&self) -> impl Iterator<Item = &ImageContent> {
        self.content.iter().filter_map(|block| match block {
            ContentBlock::Image(image) => Some(image),
            ContentBlock::Text(_) => None,
        })
    }
}

impl Default for ToolResult {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema)]
/// Executes Rhai code in the current session. Variables and functions
/// persist between calls. Use `print` for output and `show(fig)` to display
/// a figure.
pub struct RunScriptParams {
    /// The script to run. Top-level statements run one at a time and
    /// execution stops at the first error.
    pub code: String,
}

/// Definition for a tool the agent can call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tool {
    /// Tool name.
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    /// Optional tool description.
    pub description: Option<String>,
    #[serde(rename = "inputSchema")]
    /// JSON Schema describing tool input.
    pub input_schema: ToolSchema,
}

impl Tool {
    /// Create a new tool with the provided name and input schema.
    pub fn new(name: impl Into<String>, input_schema: ToolSchema) -> Self {
        Self {
            name: name.into(),
            description: None,
            input_schema,
        }
    }

    /// Create a tool from a schemars JsonSchema type.
    ///
    /// If the schema has a description at the root level, it will be used as
    /// the tool's description.
    pub fn from_schema<T: schemars::JsonSchema>(name: impl Into<String>) -> Self {
        let schema = ToolSchema::from_json_schema::<T>();
        let description = schema.description().map(|s| s.to_string());

        let mut tool = Self::new(name, schema);
        tool.description = description;
        tool
    }
}

/// A JSON Schema object defining the input of a tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ToolSchema(pub Value);

impl ToolSchema {
    /// Derive a schema from a schemars JsonSchema type.
    pub fn from_json_schema<T: schemars::JsonSchema>() -> Self {
        let schema = schemars::schema_for!(T);
        Self(schema.as_value().clone())
    }

    /// Get the schema description if present.
    pub fn description(&self) -> Option<&str> {
        self.0.get("description").and_then(|v| v.as_str())
    }

    /// Get the properties map if present.
    pub fn properties(&self) -> Option<&Map<String, Value>> {
        self.0.get("properties").and_then(|v| v.as_object())
    }

    /// Names of the required properties.
    pub fn required(&self) -> Vec<&str> {
        self.0
            .get("required")
            .and_then(|v| v.as_array())
            .map(|items| items.iter().filter_map(|v| v.as_str()).collect())
            .unwrap_or_default()
    }
}

/// The `run_script` tool definition.
pub fn run_script_tool() -> Tool {
    Tool::from_schema::<RunScriptParams>("run_script")
}
