use crate::callbacks::{noop, Callback};
use crate::runner::{current_runtime, RunnerBuilder};
use crate::{
    AbortController, AbortLifecycle, AbortSignal, AsyncRunner, CallContext, ExecutionState,
    Status, Trigger,
};
use futures_signals::signal::{MutableSignalCloned, SignalStream};
use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, trace};

type Carried<A> = (AbortLifecycle, A);

/// Controller of the latest trigger. Fires on drop.
#[derive(Default)]
struct CurrentAbort {
    controller: Mutex<Option<AbortController>>,
}

impl CurrentAbort {
    fn lock(&self) -> MutexGuard<'_, Option<AbortController>> {
        self.controller.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Installs a fresh controller. The one it replaces is left as is.
    fn renew(&self) -> AbortSignal {
        let controller = AbortController::new();
        let signal = controller.signal();
        *self.lock() = Some(controller);
        signal
    }

    /// Listeners run after the lock is released, so they may call back into the runner.
    fn abort(&self) -> bool {
        let controller = self.lock().clone();
        match controller {
            Some(controller) => controller.abort(),
            None => {
                trace!("abort ignored, nothing triggered yet");
                false
            }
        }
    }

    fn signal(&self) -> Option<AbortSignal> {
        self.lock().as_ref().map(AbortController::signal)
    }
}

impl Drop for CurrentAbort {
    fn drop(&mut self) {
        if self.abort() {
            debug!("runner dropped, current trigger aborted");
        }
    }
}

/// An [`AsyncRunner`] whose function receives an [`AbortLifecycle`] first.
///
/// Every trigger gets its own [`AbortSignal`]. [`abort`](Self::abort) fires the
/// signal of the latest trigger, and dropping the last clone of the runner does
/// the same. Aborting is advisory: the state only reaches `Failed` if the
/// function notices the signal and returns an error.
pub struct AbortableAsyncRunner<A, T, E> {
    runner: AsyncRunner<Carried<A>, T, E>,
    current: Arc<CurrentAbort>,
}

impl<A, T, E> Clone for AbortableAsyncRunner<A, T, E> {
    fn clone(&self) -> Self {
        AbortableAsyncRunner {
            runner: self.runner.clone(),
            current: self.current.clone(),
        }
    }
}

impl<A, T, E> AbortableAsyncRunner<A, T, E>
where
    A: Clone + Send + 'static,
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    pub fn new<F, Fut>(func: F) -> Self
    where
        F: Fn(AbortLifecycle, A) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        Self::builder(func).build()
    }

    pub fn builder<F, Fut>(func: F) -> AbortableRunnerBuilder<A, T, E>
    where
        F: Fn(AbortLifecycle, A) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        AbortableRunnerBuilder {
            inner: AsyncRunner::builder(move |(lifecycle, args): Carried<A>| {
                func(lifecycle, args)
            }),
            on_done: noop(),
            on_error: noop(),
        }
    }

    /// Starts one execution with a fresh abort signal.
    ///
    /// A previous trigger still in flight keeps its own signal, which is no
    /// longer reachable through [`abort`](Self::abort).
    ///
    /// # Panics
    ///
    /// Must be called within a tokio runtime. Nothing changes when it is not.
    pub fn trigger(&self, args: A) -> Trigger<T> {
        let runtime = current_runtime();
        let signal = self.current.renew();
        self.runner
            .trigger_on(&runtime, (AbortLifecycle { signal }, args))
    }

    /// Fires the signal of the latest trigger.
    ///
    /// Returns `true` if this call fired it. Nothing happens before the first
    /// trigger or when the signal already fired.
    pub fn abort(&self) -> bool {
        self.current.abort()
    }

    /// The signal handed to the latest trigger.
    pub fn current_signal(&self) -> Option<AbortSignal> {
        self.current.signal()
    }

    pub fn state(&self) -> ExecutionState<T, E> {
        self.runner.state()
    }

    pub fn status(&self) -> Status {
        self.runner.status()
    }

    pub fn is_loading(&self) -> bool {
        self.runner.is_loading()
    }

    pub fn to_signal(&self) -> MutableSignalCloned<ExecutionState<T, E>> {
        self.runner.to_signal()
    }

    pub fn to_stream(&self) -> SignalStream<MutableSignalCloned<ExecutionState<T, E>>> {
        self.runner.to_stream()
    }

    pub async fn settled(&self) -> ExecutionState<T, E> {
        self.runner.settled().await
    }
}

impl<A, T, E> fmt::Debug for AbortableAsyncRunner<A, T, E>
where
    T: fmt::Debug,
    E: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AbortableAsyncRunner")
            .field("runner", &self.runner)
            .field("signal", &self.current.signal())
            .finish()
    }
}

/// Options for an [`AbortableAsyncRunner`].
pub struct AbortableRunnerBuilder<A, T, E> {
    inner: RunnerBuilder<Carried<A>, T, E>,
    on_done: Callback<T, A>,
    on_error: Callback<E, A>,
}

impl<A, T, E> AbortableRunnerBuilder<A, T, E>
where
    A: Clone + Send + 'static,
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    /// Called after the state moved to `Done`, with the caller's arguments only.
    pub fn on_done<F>(mut self, callback: F) -> Self
    where
        F: for<'a> Fn(&T, CallContext<'a, A>) + Send + Sync + 'static,
    {
        self.on_done = Arc::new(callback);
        self
    }

    /// Called after the state moved to `Failed`, with the caller's arguments only.
    pub fn on_error<F>(mut self, callback: F) -> Self
    where
        F: for<'a> Fn(&E, CallContext<'a, A>) + Send + Sync + 'static,
    {
        self.on_error = Arc::new(callback);
        self
    }

    /// See [`RunnerBuilder::discard_stale`].
    pub fn discard_stale(mut self, discard_stale: bool) -> Self {
        self.inner = self.inner.discard_stale(discard_stale);
        self
    }

    pub fn build(self) -> AbortableAsyncRunner<A, T, E> {
        let on_done = self.on_done;
        let on_error = self.on_error;
        let runner = self
            .inner
            .with_callbacks(
                Arc::new(move |result: &T, ctx: CallContext<'_, Carried<A>>| {
                    on_done(result, CallContext { args: &ctx.args.1 })
                }),
                Arc::new(move |error: &E, ctx: CallContext<'_, Carried<A>>| {
                    on_error(error, CallContext { args: &ctx.args.1 })
                }),
            )
            .build();
        AbortableAsyncRunner {
            runner,
            current: Arc::new(CurrentAbort::default()),
        }
    }
}
