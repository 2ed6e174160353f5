use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::{Error, Result};

/// Append-only destination for streamed markup.
///
/// Chunks are delivered in call order and never retracted. An `append` only
/// returns once the chunk has been handed off, so callers suspend here and
/// nowhere else.
#[async_trait]
pub trait AppendSink: Send {
    /// Append one chunk.
    async fn append(&mut self, chunk: String) -> Result<()>;
}

#[async_trait]
impl<S: AppendSink + ?Sized> AppendSink for &mut S {
    async fn append(&mut self, chunk: String) -> Result<()> {
        (**self).append(chunk).await
    }
}

#[async_trait]
impl<S: AppendSink + ?Sized> AppendSink for Box<S> {
    async fn append(&mut self, chunk: String) -> Result<()> {
        (**self).append(chunk).await
    }
}

/// Sends each chunk over a bounded tokio channel.
///
/// Backpressure from a slow reader suspends the writer at the append
/// boundary. Once the receiver is dropped every append fails with
/// [`Error::SinkClosed`].
#[derive(Debug, Clone)]
pub struct ChannelSink {
    sender: mpsc::Sender<String>,
}

impl ChannelSink {
    /// Create a sink and the receiver that drains it.
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<String>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        (Self { sender }, receiver)
    }

    /// Wrap an existing sender.
    pub fn from_sender(sender: mpsc::Sender<String>) -> Self {
        Self { sender }
    }
}

#[async_trait]
impl AppendSink for ChannelSink {
    async fn append(&mut self, chunk: String) -> Result<()> {
        self.sender.send(chunk).await.map_err(|_| Error::SinkClosed)
    }
}

/// Discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

#[async_trait]
impl AppendSink for NullSink {
    async fn append(&mut self, _chunk: String) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_channel_sink_preserves_order() {
        let (mut sink, mut rx) = ChannelSink::new(8);
        sink.append("a".into()).await.unwrap();
        sink.append("b".into()).await.unwrap();
        drop(sink);

        let mut received = Vec::new();
        while let Some(chunk) = rx.recv().await {
            received.push(chunk);
        }
        assert_eq!(received, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_channel_sink_closed() {
        let (mut sink, rx) = ChannelSink::new(1);
        drop(rx);
        assert_eq!(sink.append("x".into()).await, Err(Error::SinkClosed));
    }

    #[tokio::test]
    async fn test_borrowed_sink() {
        let mut sink = NullSink;
        let mut borrowed = &mut sink;
        assert!(borrowed.append("x".into()).await.is_ok());
    }
}
