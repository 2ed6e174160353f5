//! Fencing properties of the markdown streamer over arbitrary text.

use pretty_assertions::assert_eq;
use scriptroom::{MarkdownStreamer, Newlines, testutils::CollectingSink};

const SAMPLES: &[&str] = &[
    "x",
    "2\n",
    "multi\nline\ntext",
    "  indented",
    "```\nshort fence inside\n```",
    "\nleading newline",
];

#[tokio::test]
async fn test_code_then_close_wraps_text_verbatim() {
    for text in SAMPLES {
        let sink = CollectingSink::new();
        let mut ms = MarkdownStreamer::new(sink.clone());
        ms.code(*text, Newlines::NONE).await.unwrap();
        ms.close().await.unwrap();

        let out = sink.joined();
        let open = "\n``````\n";
        assert!(out.starts_with(open), "{out:?}");
        assert!(out.ends_with("``````\n"), "{out:?}");
        let body = &out[open.len()..out.len() - "``````\n".len()];
        assert_eq!(body.trim_end_matches('\n'), text.trim_end_matches('\n'));
    }
}

#[tokio::test]
async fn test_second_close_adds_nothing() {
    for text in SAMPLES {
        let sink = CollectingSink::new();
        let mut ms = MarkdownStreamer::new(sink.clone());
        ms.code(*text, Newlines::NONE).await.unwrap();
        ms.close().await.unwrap();
        let chunks = sink.chunks().len();
        ms.close().await.unwrap();
        assert_eq!(sink.chunks().len(), chunks);
    }
}

#[tokio::test]
async fn test_fence_closed_once_between_modes() {
    let sink = CollectingSink::new();
    let mut ms = MarkdownStreamer::new(sink.clone());
    ms.code("c", Newlines::NONE).await.unwrap();
    ms.md("t", Newlines::NONE).await.unwrap();
    ms.md("u", Newlines::BEFORE).await.unwrap();
    assert_eq!(sink.joined(), "\n``````\nc\n``````\nt\nu");
    assert_eq!(sink.joined().matches("``````").count(), 2);
}

#[tokio::test]
async fn test_no_double_blank_lines() {
    let sink = CollectingSink::new();
    let mut ms = MarkdownStreamer::new(sink.clone());
    ms.md("a\n", Newlines::BOTH).await.unwrap();
    ms.md("\nb\n", Newlines::BOTH).await.unwrap();
    ms.code("c\n", Newlines::BOTH).await.unwrap();
    ms.md("d", Newlines::BOTH).await.unwrap();
    assert_eq!(sink.joined(), "a\n\nb\n\n``````\nc\n``````\nd\n");
}
