//! Pull-based, blocking access to a fragment stream.
//!
//! Library users without an async runtime still want to iterate fragments as
//! they arrive. [`GenerationBridge`] owns a small dedicated tokio runtime for
//! its whole lifetime; each [`GenerationBridge::fragments`] call spawns one
//! task that drives the stream and hands items over a bounded channel to a
//! plain [`Iterator`].
//!
//! Dropping the iterator aborts the task, which drops the HTTP response and
//! cancels the remaining network work.
//!
//! Do not call into the bridge from inside an async context:
//! `blocking_recv` panics there. Async code should use
//! [`super::TextGenerator::generate`] directly.

use super::TextGenerator;
use crate::error::GenerationError;
use futures::StreamExt;
use std::sync::Arc;
use tokio::runtime::Runtime;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

/// Items buffered between the worker task and the consumer.
const FRAGMENT_BUFFER: usize = 16;

/// Runs async generators for synchronous callers.
pub struct GenerationBridge {
    runtime: Runtime,
}

impl GenerationBridge {
    /// Start the bridge's worker runtime (one worker thread).
    pub fn new() -> Result<Self, GenerationError> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .thread_name("generation-bridge")
            .enable_all()
            .build()
            .map_err(|e| GenerationError::Bridge(format!("failed to start runtime: {e}")))?;
        Ok(Self { runtime })
    }

    /// Start generating `prompt` and return a blocking iterator over the fragments.
    pub fn fragments(
        &self,
        generator: Arc<dyn TextGenerator>,
        prompt: impl Into<String>,
    ) -> BlockingFragments {
        let prompt = prompt.into();
        let (tx, rx) = mpsc::channel(FRAGMENT_BUFFER);

        let task = self.runtime.spawn(async move {
            let mut stream = match generator.generate(&prompt).await {
                Ok(stream) => stream,
                Err(e) => {
                    let _ = tx.send(Err(e)).await;
                    return;
                }
            };
            while let Some(item) = stream.next().await {
                let failed = item.is_err();
                if tx.send(item).await.is_err() {
                    debug!("fragment consumer went away; stopping {}", generator.name());
                    return;
                }
                if failed {
                    return;
                }
            }
        });

        BlockingFragments { rx, task }
    }

    /// Generate `prompt` and return the concatenated text.
    pub fn generate_text(
        &self,
        generator: Arc<dyn TextGenerator>,
        prompt: impl Into<String>,
    ) -> Result<String, GenerationError> {
        self.fragments(generator, prompt).collect()
    }
}

/// Blocking iterator over one generation's fragments.
///
/// Single-pass: once it returns `None` it stays exhausted.
pub struct BlockingFragments {
    rx: mpsc::Receiver<Result<String, GenerationError>>,
    task: JoinHandle<()>,
}

impl Iterator for BlockingFragments {
    type Item = Result<String, GenerationError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.rx.blocking_recv()
    }
}

impl Drop for BlockingFragments {
    fn drop(&mut self) {
        self.task.abort();
    }
}
