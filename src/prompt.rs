use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tracing::debug;

/// Result of a flow that waits on the player. Running out of time or the
/// front-end hanging up is a normal way to abandon it, not an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome<T> {
    Completed(T),
    Cancelled,
}

impl<T> Outcome<T> {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Outcome::Cancelled)
    }

    pub fn completed(self) -> Option<T> {
        match self {
            Outcome::Completed(value) => Some(value),
            Outcome::Cancelled => None,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U> {
        match self {
            Outcome::Completed(value) => Outcome::Completed(f(value)),
            Outcome::Cancelled => Outcome::Cancelled,
        }
    }
}

/// Wait up to `limit` for the next reply.
pub async fn await_reply<T>(replies: &mut mpsc::Receiver<T>, limit: Duration) -> Outcome<T> {
    await_matching(replies, limit, |_| true).await
}

/// Wait up to `limit` for a reply accepted by `accept`; others are dropped.
/// The limit covers the whole wait, not each message.
pub async fn await_matching<T>(
    replies: &mut mpsc::Receiver<T>,
    limit: Duration,
    mut accept: impl FnMut(&T) -> bool,
) -> Outcome<T> {
    let wait = async {
        while let Some(reply) = replies.recv().await {
            if accept(&reply) {
                return Some(reply);
            }
        }
        None
    };

    match timeout(limit, wait).await {
        Ok(Some(reply)) => Outcome::Completed(reply),
        Ok(None) => {
            debug!("reply channel closed");
            Outcome::Cancelled
        }
        Err(_) => {
            debug!(?limit, "prompt timed out");
            Outcome::Cancelled
        }
    }
}
