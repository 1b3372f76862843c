//! A cloneable handle for watching and closing a running session.

use crate::session::{SessionSnapshot, SessionState};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

/// A cloneable handle onto a [`ChatSession`](crate::ChatSession).
///
/// The session task is the only writer; handles only read snapshots and
/// request teardown.
#[derive(Clone)]
pub struct SessionHandle {
    pub(crate) cancel: CancellationToken,
    pub(crate) snapshot: watch::Receiver<SessionSnapshot>,
}

impl SessionHandle {
    /// Request teardown. Safe to call any number of times.
    pub fn close(&self) {
        self.cancel.cancel();
    }

    /// Whether teardown has been requested
    pub fn is_closing(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// The latest published snapshot
    pub fn snapshot(&self) -> SessionSnapshot {
        self.snapshot.borrow().clone()
    }

    /// Wait for the next snapshot. Returns `None` once the session is gone.
    pub async fn changed(&mut self) -> Option<SessionSnapshot> {
        self.snapshot.changed().await.ok()?;
        Some(self.snapshot.borrow_and_update().clone())
    }

    /// Wait until a snapshot satisfies `predicate`
    pub async fn wait_for<F>(&mut self, mut predicate: F) -> Option<SessionSnapshot>
    where
        F: FnMut(&SessionSnapshot) -> bool,
    {
        self.snapshot
            .wait_for(|snapshot| predicate(snapshot))
            .await
            .ok()
            .map(|snapshot| snapshot.clone())
    }

    /// Wait until the session reaches `Closed`, with a timeout.
    /// Returns `true` if it closed in time.
    pub async fn wait_for_closed_timeout(&mut self, timeout: std::time::Duration) -> bool {
        tokio::time::timeout(
            timeout,
            self.wait_for(|s| s.state == SessionState::Closed),
        )
        .await
        .is_ok_and(|snapshot| snapshot.is_some())
    }

    /// Subscribe to the raw snapshot channel
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshot.clone()
    }
}
