//! Identity and cancellation for a single send.

use tokio_util::sync::CancellationToken;

/// Handle for one in-flight send.
///
/// Every send gets a fresh id; results carrying an id that is no longer the
/// controller's current session are dropped. Cloning shares the token.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    id: u64,
    cancel: CancellationToken,
}

impl SessionHandle {
    pub(crate) fn new(id: u64) -> Self {
        Self {
            id,
            cancel: CancellationToken::new(),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// Abort the send. Idempotent.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Token to hand to the transport
    pub fn token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Resolves once the send is aborted
    pub async fn cancelled(&self) {
        self.cancel.cancelled().await
    }
}
