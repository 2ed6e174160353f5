//! Incremental markdown output with code fencing.
//!
//! [`MarkdownStreamer`] is a two-state machine (prose or code) that writes
//! to an [`AppendSink`]. Consecutive code fragments share one fence, switching
//! back to prose closes it, and the optional leading/trailing newlines are
//! only inserted when the stream does not already have one at that point.

use tracing::trace;

use crate::{
    error::{Error, Result},
    sink::AppendSink,
};

/// Fence length used unless configured otherwise.
pub const DEFAULT_FENCE_LEN: usize = 6;
/// Shortest accepted fence; anything shorter could close a user's own fence.
pub const MIN_FENCE_LEN: usize = 4;

/// Whether `line` would close a fence made of `fence`: up to three spaces of
/// indent, then at least as many back-ticks.
pub(crate) fn closes_fence(line: &str, fence: &str) -> bool {
    let trimmed = line.trim_start_matches(' ');
    line.len() - trimmed.len() <= 3 && trimmed.starts_with(fence)
}

/// Text handed to the streamer: one string, or lines to be joined with `\n`.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamText {
    /// A single piece of text, possibly multi-line.
    Text(String),
    /// Individual lines, none of which may contain a newline.
    Lines(Vec<String>),
}

impl StreamText {
    /// Validate and flatten. `None` means there is nothing to send.
    fn into_text(self) -> Result<Option<String>> {
        match self {
            Self::Text(text) if text.is_empty() => Ok(None),
            Self::Text(text) => Ok(Some(text)),
            Self::Lines(lines) => {
                if let Some(n) = lines.iter().position(|l| l.contains('\n')) {
                    return Err(Error::invalid_fragment(format!(
                        "line {} contains a newline",
                        n + 1
                    )));
                }
                if lines.iter().all(String::is_empty) {
                    return Ok(None);
                }
                Ok(Some(lines.join("\n")))
            }
        }
    }
}

impl From<String> for StreamText {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<&str> for StreamText {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl From<&String> for StreamText {
    fn from(text: &String) -> Self {
        Self::Text(text.clone())
    }
}

impl From<Vec<String>> for StreamText {
    fn from(lines: Vec<String>) -> Self {
        Self::Lines(lines)
    }
}

impl From<Vec<&str>> for StreamText {
    fn from(lines: Vec<&str>) -> Self {
        Self::Lines(lines.into_iter().map(str::to_string).collect())
    }
}

impl<const N: usize> From<[&str; N]> for StreamText {
    fn from(lines: [&str; N]) -> Self {
        Self::Lines(lines.into_iter().map(str::to_string).collect())
    }
}

/// Newline guarantees requested around a fragment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Newlines {
    /// The fragment must start on a fresh line.
    pub before: bool,
    /// The stream must end with a newline after the fragment.
    pub after: bool,
}

impl Newlines {
    /// No guarantees.
    pub const NONE: Self = Self {
        before: false,
        after: false,
    };
    /// Start on a fresh line.
    pub const BEFORE: Self = Self {
        before: true,
        after: false,
    };
    /// End with a newline.
    pub const AFTER: Self = Self {
        before: false,
        after: true,
    };
    /// Both.
    pub const BOTH: Self = Self {
        before: true,
        after: true,
    };
}

/// Streams prose and code fragments as well-formed markdown.
#[derive(Debug)]
pub struct MarkdownStreamer<S> {
    sink: S,
    fence: String,
    in_code_block: bool,
    last_ends_with_newline: bool,
}

impl<S: AppendSink> MarkdownStreamer<S> {
    /// Create a streamer using the default fence.
    pub fn new(sink: S) -> Self {
        Self {
            sink,
            fence: "`".repeat(DEFAULT_FENCE_LEN),
            in_code_block: false,
            last_ends_with_newline: true,
        }
    }

    /// Create a streamer whose fence is `fence_len` back-ticks.
    pub fn with_fence_len(sink: S, fence_len: usize) -> Result<Self> {
        if fence_len < MIN_FENCE_LEN {
            return Err(Error::InvalidConfiguration(format!(
                "fence length must be at least {MIN_FENCE_LEN}, got {fence_len}"
            )));
        }
        Ok(Self {
            fence: "`".repeat(fence_len),
            ..Self::new(sink)
        })
    }

    /// The fence token.
    pub fn fence(&self) -> &str {
        &self.fence
    }

    /// Whether a code fence is currently open.
    pub fn in_code_block(&self) -> bool {
        self.in_code_block
    }

    /// The underlying sink.
    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Consume the streamer, returning the sink. An open fence is left open.
    pub fn into_sink(self) -> S {
        self.sink
    }

    /// Emit prose, closing any open code fence first.
    pub async fn md(&mut self, text: impl Into<StreamText>, newlines: Newlines) -> Result<()> {
        let Some(text) = text.into().into_text()? else {
            return Ok(());
        };
        if self.in_code_block {
            self.close_code_block().await?;
        }
        self.send(text, newlines).await
    }

    /// Emit code, opening a fence if one is not already open.
    ///
    /// Text containing a line that would close the fence (the fence token
    /// after at most three spaces) is rejected before anything is sent.
    pub async fn code(&mut self, text: impl Into<StreamText>, newlines: Newlines) -> Result<()> {
        let Some(text) = text.into().into_text()? else {
            return Ok(());
        };
        if let Some(n) = text.lines().position(|l| closes_fence(l, &self.fence)) {
            return Err(Error::FenceCollision {
                fence: self.fence.clone(),
                line: n + 1,
            });
        }
        if !self.in_code_block {
            let open = format!("\n{}\n", self.fence);
            self.send(open, Newlines::BEFORE).await?;
            self.in_code_block = true;
        }
        self.send(text, newlines).await
    }

    /// Close an open code fence. Does nothing otherwise.
    pub async fn close(&mut self) -> Result<()> {
        if self.in_code_block {
            self.close_code_block().await?;
        }
        Ok(())
    }

    async fn close_code_block(&mut self) -> Result<()> {
        let close = format!("{}\n", self.fence);
        self.send(close, Newlines::BEFORE).await?;
        self.in_code_block = false;
        Ok(())
    }

    async fn send(&mut self, text: String, newlines: Newlines) -> Result<()> {
        if newlines.before && !self.last_ends_with_newline && !text.starts_with('\n') {
            self.append("\n".to_string()).await?;
        }
        self.append(text).await?;
        if newlines.after && !self.last_ends_with_newline {
            self.append("\n".to_string()).await?;
        }
        Ok(())
    }

    async fn append(&mut self, chunk: String) -> Result<()> {
        trace!(len = chunk.len(), "append");
        let ends_with_newline = chunk.ends_with('\n');
        self.sink.append(chunk).await?;
        self.last_ends_with_newline = ends_with_newline;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::testutils::CollectingSink;

    fn streamer() -> (MarkdownStreamer<CollectingSink>, CollectingSink) {
        let sink = CollectingSink::new();
        (MarkdownStreamer::new(sink.clone()), sink)
    }

    #[tokio::test]
    async fn test_md_accepts_lines() {
        let (mut ms, sink) = streamer();
        ms.md(["Line 1", "Line 2", "Line 3"], Newlines::NONE)
            .await
            .unwrap();
        assert_eq!(sink.joined(), "Line 1\nLine 2\nLine 3");
    }

    #[tokio::test]
    async fn test_code_accepts_lines() {
        let (mut ms, sink) = streamer();
        ms.code(["fn hello() {", "    print(\"Hello\")", "}"], Newlines::NONE)
            .await
            .unwrap();
        assert_eq!(
            sink.joined(),
            "\n``````\nfn hello() {\n    print(\"Hello\")\n}"
        );
    }

    #[tokio::test]
    async fn test_empty_input_is_no_op() {
        let (mut ms, sink) = streamer();
        ms.md("", Newlines::BOTH).await.unwrap();
        ms.code("", Newlines::BOTH).await.unwrap();
        ms.md(["", ""], Newlines::NONE).await.unwrap();
        ms.code(["", "", ""], Newlines::NONE).await.unwrap();

        assert!(sink.chunks().is_empty());
        assert!(!ms.in_code_block());
    }

    #[tokio::test]
    async fn test_whitespace_is_emitted() {
        let (mut ms, sink) = streamer();
        ms.md(" ", Newlines::NONE).await.unwrap();
        assert_eq!(sink.joined(), " ");
    }

    #[tokio::test]
    async fn test_md_outputs_text() {
        let (mut ms, sink) = streamer();
        ms.md("Hello, world!", Newlines::NONE).await.unwrap();
        assert_eq!(sink.joined(), "Hello, world!");
    }

    #[tokio::test]
    async fn test_code_opens_fence() {
        let (mut ms, sink) = streamer();
        ms.code("print(\"hello\")", Newlines::NONE).await.unwrap();
        assert_eq!(sink.joined(), "\n``````\nprint(\"hello\")");
        assert!(ms.in_code_block());
    }

    #[tokio::test]
    async fn test_consecutive_code_shares_fence() {
        let (mut ms, sink) = streamer();
        ms.code("line 1", Newlines::NONE).await.unwrap();
        ms.code("line 2", Newlines::NONE).await.unwrap();
        assert_eq!(sink.joined(), "\n``````\nline 1line 2");
    }

    #[tokio::test]
    async fn test_md_closes_fence() {
        let (mut ms, sink) = streamer();
        ms.code("code", Newlines::NONE).await.unwrap();
        ms.md("text", Newlines::NONE).await.unwrap();
        assert_eq!(sink.joined(), "\n``````\ncode\n``````\ntext");
    }

    #[tokio::test]
    async fn test_close() {
        let (mut ms, sink) = streamer();
        ms.code("code", Newlines::NONE).await.unwrap();
        ms.close().await.unwrap();
        assert_eq!(sink.joined(), "\n``````\ncode\n``````\n");

        ms.close().await.unwrap();
        assert_eq!(sink.joined(), "\n``````\ncode\n``````\n");
        assert!(!ms.in_code_block());
    }

    #[tokio::test]
    async fn test_close_without_code_is_silent() {
        let (mut ms, sink) = streamer();
        ms.md("text", Newlines::NONE).await.unwrap();
        ms.close().await.unwrap();
        assert_eq!(sink.joined(), "text");
    }

    #[tokio::test]
    async fn test_newline_before() {
        let (mut ms, sink) = streamer();
        ms.md("a", Newlines::NONE).await.unwrap();
        ms.md("b", Newlines::BEFORE).await.unwrap();
        assert_eq!(sink.joined(), "a\nb");
    }

    #[tokio::test]
    async fn test_newline_before_not_duplicated() {
        let (mut ms, sink) = streamer();
        ms.md("text", Newlines::NONE).await.unwrap();
        ms.md("\nmore text", Newlines::BEFORE).await.unwrap();
        assert_eq!(sink.joined(), "text\nmore text");
    }

    #[tokio::test]
    async fn test_newline_before_at_start() {
        let (mut ms, sink) = streamer();
        ms.md("first", Newlines::BEFORE).await.unwrap();
        assert_eq!(sink.joined(), "first");
    }

    #[tokio::test]
    async fn test_newline_after() {
        let (mut ms, sink) = streamer();
        ms.md("text", Newlines::AFTER).await.unwrap();
        assert_eq!(sink.joined(), "text\n");
    }

    #[tokio::test]
    async fn test_newline_after_not_duplicated() {
        let (mut ms, sink) = streamer();
        ms.md("text\n", Newlines::AFTER).await.unwrap();
        assert_eq!(sink.joined(), "text\n");
        assert_eq!(sink.chunks(), vec!["text\n"]);
    }

    #[tokio::test]
    async fn test_chained_calls() {
        let (mut ms, sink) = streamer();
        ms.md("text", Newlines::NONE).await.unwrap();
        ms.code("code", Newlines::NONE).await.unwrap();
        ms.md("more text", Newlines::NONE).await.unwrap();
        assert_eq!(sink.joined(), "text\n``````\ncode\n``````\nmore text");
    }

    #[tokio::test]
    async fn test_fence_after_newline_terminated_code() {
        let (mut ms, sink) = streamer();
        ms.code("2\n", Newlines::NONE).await.unwrap();
        ms.close().await.unwrap();
        assert_eq!(sink.joined(), "\n``````\n2\n``````\n");
    }

    #[tokio::test]
    async fn test_line_with_newline_is_rejected() {
        let (mut ms, sink) = streamer();
        let err = ms
            .md(vec!["ok".to_string(), "bad\nline".to_string()], Newlines::NONE)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidFragment { .. }));
        assert!(err.is_input_fault());
        assert!(sink.chunks().is_empty());
    }

    #[tokio::test]
    async fn test_fence_collision_leaves_state() {
        let (mut ms, sink) = streamer();
        ms.code("x", Newlines::NONE).await.unwrap();
        let before = sink.joined();

        let err = ms
            .code("fine\n``````\nescaped", Newlines::NONE)
            .await
            .unwrap_err();
        assert_eq!(
            err,
            Error::FenceCollision {
                fence: "``````".to_string(),
                line: 2,
            }
        );
        assert_eq!(sink.joined(), before);
        assert!(ms.in_code_block());

        // Shorter fences inside code are fine.
        ms.code("\n```\nnested\n```", Newlines::NONE).await.unwrap();
    }

    #[tokio::test]
    async fn test_indented_fence_collides() {
        let (mut ms, sink) = streamer();
        let err = ms
            .code("ok\n   ``````\nmore", Newlines::NONE)
            .await
            .unwrap_err();
        assert_eq!(
            err,
            Error::FenceCollision {
                fence: "``````".to_string(),
                line: 2,
            }
        );
        assert!(sink.chunks().is_empty());

        // Four spaces make an indented code line, which cannot close a fence.
        ms.code("ok\n    ``````", Newlines::NONE).await.unwrap();
    }

    #[test]
    fn test_closes_fence() {
        let fence = "``````";
        assert!(closes_fence("``````", fence));
        assert!(closes_fence("```````x", fence));
        assert!(closes_fence(" ``````", fence));
        assert!(closes_fence("   ``````", fence));
        assert!(!closes_fence("    ``````", fence));
        assert!(!closes_fence("`````", fence));
        assert!(!closes_fence("x``````", fence));
    }

    #[tokio::test]
    async fn test_custom_fence_len() {
        let sink = CollectingSink::new();
        let mut ms = MarkdownStreamer::with_fence_len(sink.clone(), 4).unwrap();
        ms.code("c", Newlines::NONE).await.unwrap();
        ms.close().await.unwrap();
        assert_eq!(sink.joined(), "\n````\nc\n````\n");

        let err = MarkdownStreamer::with_fence_len(CollectingSink::new(), 3).unwrap_err();
        assert!(matches!(err, Error::InvalidConfiguration(_)));
    }
}
