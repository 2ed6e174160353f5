//! Test utilities for `scriptroom`.
//!
//! Helpers shared by the unit tests and the integration tests under
//! `tests/`, and available to downstream crates via
//! `use scriptroom::testutils::*`.

use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;

use crate::{
    error::{Error, Result},
    sink::AppendSink,
};

/// An [`AppendSink`] that records every chunk it receives.
///
/// Clones share the same buffer, so a test can hand one clone to a streamer
/// and inspect the other afterwards.
#[derive(Debug, Clone, Default)]
pub struct CollectingSink {
    chunks: Arc<Mutex<Vec<String>>>,
    fail_after: Option<usize>,
}

impl CollectingSink {
    /// Create an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// A sink that accepts `n` chunks and then reports itself closed.
    pub fn failing_after(n: usize) -> Self {
        Self {
            fail_after: Some(n),
            ..Self::default()
        }
    }

    /// The chunks received so far, in order.
    pub fn chunks(&self) -> Vec<String> {
        self.lock().clone()
    }

    /// All chunks concatenated.
    pub fn joined(&self) -> String {
        self.lock().concat()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<String>> {
        self.chunks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl AppendSink for CollectingSink {
    async fn append(&mut self, chunk: String) -> Result<()> {
        let mut chunks = self.lock();
        if self.fail_after.is_some_and(|n| chunks.len() >= n) {
            return Err(Error::SinkClosed);
        }
        chunks.push(chunk);
        Ok(())
    }
}
