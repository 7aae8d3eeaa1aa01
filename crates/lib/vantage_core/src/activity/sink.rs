//! Fire-and-forget activity sink.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use super::ActivityStore;
use crate::models::activity::NewActivity;

enum Command {
    Record(NewActivity),
    Flush(oneshot::Sender<()>),
}

/// Non-blocking handle to the background audit writer.
///
/// Cloning is cheap; every clone feeds the same worker. Write failures are
/// logged by the worker and never reach the caller.
#[derive(Clone)]
pub struct ActivitySink {
    tx: mpsc::UnboundedSender<Command>,
}

impl ActivitySink {
    /// Spawn the writer task on the current tokio runtime.
    pub fn spawn(store: Arc<dyn ActivityStore>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(run(store, rx));
        Self { tx }
    }

    /// Queue an activity for writing. Returns immediately.
    pub fn record(&self, activity: NewActivity) {
        let action = activity.action;
        if self.tx.send(Command::Record(activity)).is_err() {
            warn!(%action, "activity sink closed, dropping entry");
        }
    }

    /// Wait until every activity queued before this call has been processed.
    pub async fn flush(&self) {
        let (done_tx, done_rx) = oneshot::channel();
        if self.tx.send(Command::Flush(done_tx)).is_err() {
            return;
        }
        let _ = done_rx.await;
    }
}

async fn run(store: Arc<dyn ActivityStore>, mut rx: mpsc::UnboundedReceiver<Command>) {
    while let Some(command) = rx.recv().await {
        match command {
            Command::Record(activity) => {
                let action = activity.action;
                let user_id = activity.user_id;
                if let Err(e) = store.insert(activity).await {
                    warn!(%action, %user_id, "failed to record activity: {e}");
                }
            }
            Command::Flush(done) => {
                let _ = done.send(());
            }
        }
    }
    debug!("activity sink stopped");
}
