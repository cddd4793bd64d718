use crate::AbortError;
use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

type Listener = Box<dyn FnOnce() + Send>;

/// Handle returned by [`AbortSignal::on_abort`], used to unregister the listener.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub struct ListenerId(u64);

#[derive(Default)]
struct Listeners {
    aborted: bool,
    next_id: u64,
    entries: Vec<(ListenerId, Listener)>,
}

struct SignalCore {
    token: CancellationToken,
    listeners: Mutex<Listeners>,
}

impl SignalCore {
    fn lock(&self) -> MutexGuard<'_, Listeners> {
        self.listeners.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// One-shot abort switch. Owns the signal it hands out.
///
/// Clones fire the same signal.
#[derive(Clone)]
pub struct AbortController {
    signal: AbortSignal,
}

impl AbortController {
    pub fn new() -> Self {
        AbortController {
            signal: AbortSignal {
                core: Arc::new(SignalCore {
                    token: CancellationToken::new(),
                    listeners: Mutex::new(Listeners::default()),
                }),
            },
        }
    }

    pub fn signal(&self) -> AbortSignal {
        self.signal.clone()
    }

    /// Fires the signal.
    ///
    /// Returns `true` only for the call that actually fired it; later calls are
    /// no-ops. Listeners run synchronously on the calling thread, in
    /// registration order.
    pub fn abort(&self) -> bool {
        let listeners = {
            let mut listeners = self.signal.core.lock();
            if listeners.aborted {
                trace!("abort ignored, signal already fired");
                return false;
            }
            listeners.aborted = true;
            std::mem::take(&mut listeners.entries)
        };
        self.signal.core.token.cancel();
        debug!(listeners = listeners.len(), "abort signal fired");
        for (_, listener) in listeners {
            listener();
        }
        true
    }

    pub fn is_aborted(&self) -> bool {
        self.signal.is_aborted()
    }
}

impl Default for AbortController {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for AbortController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AbortController")
            .field("signal", &self.signal)
            .finish()
    }
}

/// Read side of an [`AbortController`].
///
/// Cheap to clone. The wrapped function observes it either by polling
/// [`is_aborted`](Self::is_aborted), by awaiting [`aborted`](Self::aborted), or
/// by registering a listener with [`on_abort`](Self::on_abort).
#[derive(Clone)]
pub struct AbortSignal {
    core: Arc<SignalCore>,
}

impl AbortSignal {
    pub fn is_aborted(&self) -> bool {
        self.core.lock().aborted
    }

    /// `Err(AbortError::Aborted)` once the signal has fired.
    pub fn check(&self) -> Result<(), AbortError> {
        if self.is_aborted() {
            Err(AbortError::Aborted)
        } else {
            Ok(())
        }
    }

    /// Completes once the signal fires.
    pub async fn aborted(&self) {
        self.core.token.cancelled().await
    }

    /// A `CancellationToken` cancelled together with this signal.
    ///
    /// Cancelling the returned token does not fire the signal.
    pub fn token(&self) -> CancellationToken {
        self.core.token.child_token()
    }

    /// Registers a listener that runs once when the signal fires.
    ///
    /// On a signal that already fired the listener runs immediately.
    pub fn on_abort<F>(&self, listener: F) -> ListenerId
    where
        F: FnOnce() + Send + 'static,
    {
        let mut listeners = self.core.lock();
        let id = ListenerId(listeners.next_id);
        listeners.next_id += 1;
        if listeners.aborted {
            drop(listeners);
            listener();
        } else {
            listeners.entries.push((id, Box::new(listener)));
        }
        id
    }

    /// Unregisters a listener. Returns `false` if it already ran or was removed.
    pub fn remove_listener(&self, id: ListenerId) -> bool {
        let mut listeners = self.core.lock();
        let before = listeners.entries.len();
        listeners.entries.retain(|(entry_id, _)| *entry_id != id);
        listeners.entries.len() != before
    }

    /// Runs `work` until it completes or the signal fires, whichever comes first.
    pub async fn race<F>(&self, work: F) -> Result<F::Output, AbortError>
    where
        F: Future,
    {
        tokio::select! {
            biased;
            _ = self.core.token.cancelled() => Err(AbortError::Aborted),
            output = work => Ok(output),
        }
    }

    /// Like [`race`](Self::race), but also gives up after `timeout`.
    pub async fn race_with_timeout<F>(
        &self,
        work: F,
        timeout: Duration,
    ) -> Result<F::Output, AbortError>
    where
        F: Future,
    {
        match tokio::time::timeout(timeout, self.race(work)).await {
            Ok(result) => result,
            Err(_) => Err(AbortError::Timeout),
        }
    }
}

impl fmt::Debug for AbortSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AbortSignal")
            .field("aborted", &self.is_aborted())
            .finish()
    }
}

/// Carrier passed as the first argument to an abortable function.
#[derive(Debug, Clone)]
pub struct AbortLifecycle {
    pub signal: AbortSignal,
}
