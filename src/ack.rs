use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::{JoinHandle, JoinSet};

use crate::telegram::MessageSender;

/// One reply waiting to go out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AckJob {
    pub chat_id: i64,
    pub reply_to: Option<i64>,
    pub text: String,
}

/// Cheap handle the request path uses to hand off replies.
#[derive(Clone)]
pub struct AckQueue {
    tx: mpsc::Sender<AckJob>,
}

/// Background task draining the queue. Keep it around to wait for
/// in-flight sends at shutdown.
pub struct AckWorker {
    handle: JoinHandle<usize>,
}

impl AckQueue {
    pub fn spawn<S: MessageSender>(
        sender: S,
        capacity: usize,
        send_timeout: Duration,
    ) -> (AckQueue, AckWorker) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let handle = tokio::spawn(run(Arc::new(sender), rx, send_timeout));
        (AckQueue { tx }, AckWorker { handle })
    }

    /// Never waits. Returns false when the job was dropped.
    pub fn enqueue(&self, job: AckJob) -> bool {
        match self.tx.try_send(job) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(job)) => {
                tracing::warn!(chat_id = job.chat_id, "ack queue full, dropping reply");
                false
            }
            Err(mpsc::error::TrySendError::Closed(job)) => {
                tracing::warn!(chat_id = job.chat_id, "ack worker gone, dropping reply");
                false
            }
        }
    }
}

impl AckWorker {
    /// Wait until every queue handle is dropped and all sends have settled.
    /// Returns how many jobs the worker picked up.
    pub async fn shutdown(self) -> usize {
        match self.handle.await {
            Ok(n) => n,
            Err(e) => {
                tracing::error!("ack worker crashed: {e}");
                0
            }
        }
    }
}

async fn run<S: MessageSender>(
    sender: Arc<S>,
    mut rx: mpsc::Receiver<AckJob>,
    send_timeout: Duration,
) -> usize {
    let mut inflight = JoinSet::new();
    let mut processed = 0;

    loop {
        tokio::select! {
            job = rx.recv() => {
                let Some(job) = job else { break };
                processed += 1;
                let sender = sender.clone();
                inflight.spawn(async move { deliver(sender.as_ref(), job, send_timeout).await });
            }
            Some(res) = inflight.join_next(), if !inflight.is_empty() => {
                if let Err(e) = res {
                    tracing::error!("ack send task panicked: {e}");
                }
            }
        }
    }

    while let Some(res) = inflight.join_next().await {
        if let Err(e) = res {
            tracing::error!("ack send task panicked: {e}");
        }
    }

    tracing::debug!(processed, "ack worker drained");
    processed
}

async fn deliver<S: MessageSender>(sender: &S, job: AckJob, send_timeout: Duration) {
    let send = sender.send_message(job.chat_id, &job.text, job.reply_to);
    match tokio::time::timeout(send_timeout, send).await {
        Ok(Ok(())) => {
            tracing::debug!(chat_id = job.chat_id, "ack sent");
        }
        Ok(Err(e)) => {
            tracing::warn!(chat_id = job.chat_id, "ack send failed: {e:#}");
        }
        Err(_) => {
            tracing::warn!(
                chat_id = job.chat_id,
                "ack send timed out after {}s",
                send_timeout.as_secs()
            );
        }
    }
}
