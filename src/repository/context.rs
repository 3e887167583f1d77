use std::time::Duration;

use tokio::sync::watch;

/// Default per-call database timeout (§5: "each database call carries a
/// default 30 s timeout unless the caller provides one").
pub const DEFAULT_DB_TIMEOUT: Duration = Duration::from_secs(30);

/// The write half of a session-scoped cancellation signal. Dropped or
/// `cancel()`-ed when a session closes; every [`RepoContext`] derived from
/// the matching [`CancelSignal`] observes the cancellation on its next poll.
#[derive(Clone)]
pub struct CancelHandle(watch::Sender<bool>);

impl CancelHandle {
    pub fn cancel(&self) {
        let _ = self.0.send(true);
    }
}

/// The read half, cloned into every [`RepoContext`] spawned on behalf of a
/// session or request.
#[derive(Clone)]
pub struct CancelSignal(watch::Receiver<bool>);

impl CancelSignal {
    pub fn is_cancelled(&self) -> bool {
        *self.0.borrow()
    }

    /// Resolves once cancellation is signalled. Intended to be raced against
    /// a repository call with `tokio::select!`.
    pub async fn cancelled(&mut self) {
        let _ = self.0.wait_for(|v| *v).await;
    }
}

/// A signal pair that never fires — used by background jobs and tests that
/// have no session to scope cancellation to.
pub fn never_cancelled() -> CancelSignal {
    let (_tx, rx) = watch::channel(false);
    CancelSignal(rx)
}

pub fn cancellation_pair() -> (CancelHandle, CancelSignal) {
    let (tx, rx) = watch::channel(false);
    (CancelHandle(tx), CancelSignal(rx))
}

/// Carried by every repository call per §4.1 ("all methods take a
/// cancellation-carrying context"). Wraps a per-call timeout and a
/// session-scoped cancellation signal; Postgres repository implementations
/// race the underlying query against both.
#[derive(Clone)]
pub struct RepoContext {
    pub timeout: Duration,
    pub cancel: CancelSignal,
}

impl RepoContext {
    pub fn new(timeout: Duration, cancel: CancelSignal) -> Self {
        Self { timeout, cancel }
    }

    /// Default timeout, no session to cancel against — used by background
    /// jobs (admission sweeper) and tests.
    pub fn background() -> Self {
        Self {
            timeout: DEFAULT_DB_TIMEOUT,
            cancel: never_cancelled(),
        }
    }

    pub fn scoped_to(cancel: CancelSignal) -> Self {
        Self {
            timeout: DEFAULT_DB_TIMEOUT,
            cancel,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}
