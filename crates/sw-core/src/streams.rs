//! Streams handed from a monitor client's workers to the orchestrator
//!
//! Status batches travel through a latest-wins slot built on
//! [`tokio::sync::watch`]: a new batch replaces an unread one. Session errors
//! travel through a single-slot queue, and end of session is signalled by
//! cancelling a [`CancellationToken`].

use sw_protocol::SessionStatus;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;

use crate::error::SessionError;

/// A full snapshot of the active sessions
pub type StatusBatch = Vec<SessionStatus>;

/// Create a latest-wins status slot
pub fn status_channel() -> (StatusSender, StatusReceiver) {
    let (tx, rx) = watch::channel(None);
    (StatusSender { tx }, StatusReceiver { rx })
}

/// Create the single-slot session error queue
pub fn error_slot() -> (ErrorSender, mpsc::Receiver<SessionError>) {
    let (tx, rx) = mpsc::channel(1);
    (ErrorSender { tx }, rx)
}

/// Writer half of the status slot
#[derive(Debug, Clone)]
pub struct StatusSender {
    tx: watch::Sender<Option<StatusBatch>>,
}

impl StatusSender {
    /// Publish a batch, discarding any batch not yet read
    pub fn push(&self, batch: StatusBatch) {
        self.tx.send_replace(Some(batch));
    }
}

/// Reader half of the status slot
#[derive(Debug)]
pub struct StatusReceiver {
    rx: watch::Receiver<Option<StatusBatch>>,
}

impl StatusReceiver {
    /// Wait for the next unread batch.
    ///
    /// Returns `None` once the writer is gone and nothing is left to read.
    pub async fn recv(&mut self) -> Option<StatusBatch> {
        loop {
            self.rx.changed().await.ok()?;
            if let Some(batch) = self.rx.borrow_and_update().clone() {
                return Some(batch);
            }
        }
    }

    /// Take the unread batch, if any, without waiting
    pub fn try_recv(&mut self) -> Option<StatusBatch> {
        match self.rx.has_changed() {
            Ok(true) => self.rx.borrow_and_update().clone(),
            _ => None,
        }
    }
}

/// Writer half of the error slot
#[derive(Debug, Clone)]
pub struct ErrorSender {
    tx: mpsc::Sender<SessionError>,
}

impl ErrorSender {
    /// Report an error; dropped if one is already pending
    pub fn report(&self, error: SessionError) -> bool {
        match self.tx.try_send(error) {
            Ok(()) => true,
            Err(e) => {
                tracing::debug!("Session error slot occupied, dropping: {}", e.into_inner());
                false
            }
        }
    }
}

/// Observable streams of an active session
#[derive(Debug)]
pub struct SessionStreams {
    /// Latest status snapshot
    pub status: StatusReceiver,
    /// Error frames and stream failures
    pub errors: mpsc::Receiver<SessionError>,
    /// Cancelled when the agent process or remote session ends
    pub done: CancellationToken,
}

#[cfg(test)]
mod tests {
    use super::*;
    use sw_protocol::SessionState;

    fn batch(project: &str) -> StatusBatch {
        vec![SessionStatus {
            project_id: format!("/srv/{}", project),
            project_display_name: project.to_string(),
            session_id: "s1".to_string(),
            status: SessionState::Working,
            updated_at_epoch_secs: 1,
        }]
    }

    #[tokio::test]
    async fn test_latest_batch_wins() {
        let (tx, mut rx) = status_channel();
        tx.push(batch("b1"));
        tx.push(batch("b2"));

        let got = rx.recv().await.unwrap();
        assert_eq!(got[0].project_display_name, "b2");
        assert!(rx.try_recv().is_none());
    }

    #[tokio::test]
    async fn test_recv_waits_for_push() {
        let (tx, mut rx) = status_channel();
        let reader = tokio::spawn(async move { rx.recv().await });

        tokio::task::yield_now().await;
        tx.push(batch("late"));

        let got = reader.await.unwrap().unwrap();
        assert_eq!(got[0].project_display_name, "late");
    }

    #[tokio::test]
    async fn test_unread_batch_survives_sender_drop() {
        let (tx, mut rx) = status_channel();
        tx.push(batch("last"));
        drop(tx);

        assert_eq!(rx.recv().await.unwrap()[0].project_display_name, "last");
        assert!(rx.recv().await.is_none());
    }

    #[test]
    fn test_error_slot_holds_one() {
        let (tx, mut rx) = error_slot();
        assert!(tx.report(SessionError::Remote("first".into())));
        assert!(!tx.report(SessionError::Remote("second".into())));

        assert_eq!(rx.try_recv().unwrap(), SessionError::Remote("first".into()));
        assert!(rx.try_recv().is_err());
    }
}
