//! Debounced re-analysis for text that is still being typed.
//!
//! Each [`LiveAssistant::update`] bumps a revision. The background task waits
//! until no update has arrived for the debounce period, analyzes the latest
//! text and publishes it; superseded revisions are never published.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::debug;

use crate::assistant::WritingAssistant;
use crate::models::WritingAnalysis;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiveAnalysis {
    pub revision: u64,
    pub analysis: WritingAnalysis,
}

struct Revision {
    number: u64,
    text: String,
}

pub struct LiveAssistant {
    input: mpsc::UnboundedSender<Revision>,
    output: watch::Receiver<Option<LiveAnalysis>>,
    next_revision: AtomicU64,
    task: JoinHandle<()>,
}

impl LiveAssistant {
    /// Spawns the debounce loop on the current tokio runtime.
    pub fn spawn(assistant: Arc<WritingAssistant>, debounce: Duration) -> Self {
        let (input, rx) = mpsc::unbounded_channel();
        let (tx, output) = watch::channel(None);
        let task = tokio::spawn(run(assistant, debounce, rx, tx));

        LiveAssistant {
            input,
            output,
            next_revision: AtomicU64::new(1),
            task,
        }
    }

    /// Queues new text and returns its revision number.
    pub fn update(&self, text: impl Into<String>) -> u64 {
        let number = self.next_revision.fetch_add(1, Ordering::Relaxed);
        // the loop only stops after shutdown, which consumes self
        let _ = self.input.send(Revision {
            number,
            text: text.into(),
        });
        number
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<LiveAnalysis>> {
        self.output.clone()
    }

    pub fn latest(&self) -> Option<LiveAnalysis> {
        self.output.borrow().clone()
    }

    /// Stops the loop; a pending, not-yet-quiet revision is discarded.
    pub async fn shutdown(self) -> anyhow::Result<()> {
        let LiveAssistant { input, task, .. } = self;
        drop(input);
        task.await
            .map_err(|e| anyhow::anyhow!("live assistant task failed: {}", e))
    }
}

async fn run(
    assistant: Arc<WritingAssistant>,
    debounce: Duration,
    mut rx: mpsc::UnboundedReceiver<Revision>,
    tx: watch::Sender<Option<LiveAnalysis>>,
) {
    while let Some(mut latest) = rx.recv().await {
        // wait for a quiet period, restarting it on every newer revision
        loop {
            tokio::select! {
                next = rx.recv() => match next {
                    Some(revision) => latest = revision,
                    None => return,
                },
                _ = tokio::time::sleep(debounce) => {
                    match rx.try_recv() {
                        Ok(revision) => latest = revision,
                        Err(_) => break,
                    }
                }
            }
        }

        if latest.text.is_empty() {
            debug!(revision = latest.number, "skipping analysis of empty text");
            continue;
        }

        let analysis = assistant.analyze(&latest.text);
        debug!(
            revision = latest.number,
            position = %analysis.position,
            warnings = analysis.warnings.len(),
            "live analysis ready"
        );
        tx.send_replace(Some(LiveAnalysis {
            revision: latest.number,
            analysis,
        }));
    }
}
