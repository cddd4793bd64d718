use crate::callbacks::{noop, Callback};
use crate::{CallContext, ExecutionState, Status};
use futures_core::future::BoxFuture;
use futures_signals::signal::{Mutable, MutableSignalCloned, SignalExt, SignalStream};
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

type BoxedFn<A, T, E> = Box<dyn Fn(A) -> BoxFuture<'static, Result<T, E>> + Send + Sync>;

struct RunnerCore<A, T, E> {
    func: BoxedFn<A, T, E>,
    on_done: Callback<T, A>,
    on_error: Callback<E, A>,
    discard_stale: bool,
    generation: AtomicU64,
    state: Mutable<ExecutionState<T, E>>,
}

impl<A, T, E> RunnerCore<A, T, E>
where
    T: Clone,
    E: Clone,
{
    fn begin(&self) -> u64 {
        let mut state = self.state.lock_mut();
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let previous = std::mem::take(&mut *state);
        *state = previous.working();
        trace!(generation, "trigger started");
        generation
    }

    fn settle(&self, generation: u64, args: &A, outcome: Result<T, E>) -> Option<T> {
        {
            let mut state = self.state.lock_mut();
            if self.discard_stale && generation != self.generation.load(Ordering::SeqCst) {
                debug!(generation, "stale trigger settled, state left untouched");
                return outcome.ok();
            }
            *state = match &outcome {
                Ok(data) => ExecutionState::done(data.clone()),
                Err(error) => ExecutionState::failed(error.clone()),
            };
            debug!(generation, status = %state.status, "trigger settled");
        }
        match outcome {
            Ok(data) => {
                (self.on_done)(&data, CallContext { args });
                Some(data)
            }
            Err(error) => {
                (self.on_error)(&error, CallContext { args });
                None
            }
        }
    }
}

/// Tracks the lifecycle of one async function.
///
/// Cloning is cheap and shares the state, the wrapped function and the callbacks.
pub struct AsyncRunner<A, T, E> {
    core: Arc<RunnerCore<A, T, E>>,
}

impl<A, T, E> Clone for AsyncRunner<A, T, E> {
    fn clone(&self) -> Self {
        AsyncRunner {
            core: self.core.clone(),
        }
    }
}

impl<A, T, E> AsyncRunner<A, T, E>
where
    A: Clone + Send + 'static,
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    /// Wraps `func` with no-op callbacks. `func` is not called until [`trigger`](Self::trigger).
    pub fn new<F, Fut>(func: F) -> Self
    where
        F: Fn(A) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        Self::builder(func).build()
    }

    pub fn builder<F, Fut>(func: F) -> RunnerBuilder<A, T, E>
    where
        F: Fn(A) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        RunnerBuilder {
            func: Box::new(move |args: A| -> BoxFuture<'static, Result<T, E>> {
                Box::pin(func(args))
            }),
            on_done: noop(),
            on_error: noop(),
            discard_stale: false,
        }
    }

    /// Starts one execution of the wrapped function.
    ///
    /// The state is `Working` before the wrapped function is called. The
    /// returned future runs on the current tokio runtime and settles the state
    /// whether or not the [`Trigger`] is awaited. The trigger resolves to the
    /// result, or to `None` when the function failed; the failure itself is in
    /// the state.
    ///
    /// # Panics
    ///
    /// Must be called within a tokio runtime. The state is left untouched when
    /// it is not.
    pub fn trigger(&self, args: A) -> Trigger<T> {
        self.trigger_on(&current_runtime(), args)
    }

    pub(crate) fn trigger_on(&self, runtime: &Handle, args: A) -> Trigger<T> {
        let generation = self.core.begin();
        let pending = (self.core.func)(args.clone());
        let core = self.core.clone();
        let handle = runtime.spawn(async move {
            let outcome = pending.await;
            core.settle(generation, &args, outcome)
        });
        Trigger { handle }
    }

    pub fn state(&self) -> ExecutionState<T, E> {
        self.core.state.get_cloned()
    }

    pub fn status(&self) -> Status {
        self.core.state.lock_ref().status
    }

    pub fn is_loading(&self) -> bool {
        self.core.state.lock_ref().is_loading()
    }

    pub fn to_signal(&self) -> MutableSignalCloned<ExecutionState<T, E>> {
        self.core.state.signal_cloned()
    }

    pub fn to_stream(&self) -> SignalStream<MutableSignalCloned<ExecutionState<T, E>>> {
        self.core.state.signal_cloned().to_stream()
    }

    /// Waits for the first snapshot that is not `Working`.
    pub async fn settled(&self) -> ExecutionState<T, E> {
        let mut last = None;
        self.to_signal()
            .stop_if(|state| !state.is_loading())
            .for_each(|state| {
                last = Some(state);
                async {}
            })
            .await;
        last.unwrap_or_else(|| self.state())
    }
}

impl<A, T, E> fmt::Debug for AsyncRunner<A, T, E>
where
    T: fmt::Debug,
    E: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsyncRunner")
            .field("state", &*self.core.state.lock_ref())
            .field("discard_stale", &self.core.discard_stale)
            .finish()
    }
}

/// Handle of the runtime `trigger` spawns onto, looked up before any state changes.
pub(crate) fn current_runtime() -> Handle {
    match Handle::try_current() {
        Ok(runtime) => runtime,
        Err(error) => panic!("trigger called outside a tokio runtime: {error}"),
    }
}

/// Options for an [`AsyncRunner`].
pub struct RunnerBuilder<A, T, E> {
    func: BoxedFn<A, T, E>,
    on_done: Callback<T, A>,
    on_error: Callback<E, A>,
    discard_stale: bool,
}

impl<A, T, E> RunnerBuilder<A, T, E>
where
    A: Clone + Send + 'static,
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    /// Called with the result after the state moved to `Done`.
    pub fn on_done<F>(mut self, callback: F) -> Self
    where
        F: for<'a> Fn(&T, CallContext<'a, A>) + Send + Sync + 'static,
    {
        self.on_done = Arc::new(callback);
        self
    }

    /// Called with the error after the state moved to `Failed`.
    pub fn on_error<F>(mut self, callback: F) -> Self
    where
        F: for<'a> Fn(&E, CallContext<'a, A>) + Send + Sync + 'static,
    {
        self.on_error = Arc::new(callback);
        self
    }

    /// When set, a trigger that settles after a newer trigger started leaves
    /// the state and the callbacks alone. Off by default: the last trigger to
    /// settle wins.
    pub fn discard_stale(mut self, discard_stale: bool) -> Self {
        self.discard_stale = discard_stale;
        self
    }

    pub(crate) fn with_callbacks(
        mut self,
        on_done: Callback<T, A>,
        on_error: Callback<E, A>,
    ) -> Self {
        self.on_done = on_done;
        self.on_error = on_error;
        self
    }

    pub fn build(self) -> AsyncRunner<A, T, E> {
        AsyncRunner {
            core: Arc::new(RunnerCore {
                func: self.func,
                on_done: self.on_done,
                on_error: self.on_error,
                discard_stale: self.discard_stale,
                generation: AtomicU64::new(0),
                state: Mutable::new(ExecutionState::initial()),
            }),
        }
    }
}

/// Pending outcome of one [`AsyncRunner::trigger`] call.
///
/// Resolves to `Some(result)` on success and `None` on failure. A panic raised
/// by `on_done` or `on_error` resumes in whoever polls this future. Dropping it
/// detaches the execution without cancelling it.
#[derive(Debug)]
pub struct Trigger<T> {
    handle: JoinHandle<Option<T>>,
}

impl<T> Future for Trigger<T> {
    type Output = Option<T>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.handle).poll(cx) {
            Poll::Pending => Poll::Pending,
            Poll::Ready(Ok(output)) => Poll::Ready(output),
            Poll::Ready(Err(error)) if error.is_panic() => {
                std::panic::resume_unwind(error.into_panic())
            }
            // Runtime shutting down.
            Poll::Ready(Err(_)) => Poll::Ready(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;
    use std::time::Duration;

    #[tokio::test]
    async fn test_resolves_with_result() {
        let runner = AsyncRunner::new(|_: ()| async { Ok::<_, String>(1) });
        let result = runner.trigger(()).await;
        assert_eq!(result, Some(1));
        assert_eq!(
            runner.state(),
            ExecutionState {
                status: Status::Done,
                data: Some(1),
                error: None,
            }
        );
        assert!(!runner.is_loading());
    }

    #[tokio::test]
    async fn test_failure_is_swallowed() {
        let runner = AsyncRunner::new(|_: ()| async { Err::<i32, _>("X") });
        let result = runner.trigger(()).await;
        assert_eq!(result, None);
        assert_eq!(
            runner.state(),
            ExecutionState {
                status: Status::Failed,
                data: None,
                error: Some("X"),
            }
        );
    }

    #[tokio::test]
    async fn test_working_before_function_runs() {
        let started = Arc::new(AtomicUsize::new(0));
        let counter = started.clone();
        let runner = AsyncRunner::new(move |_: ()| {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok::<_, ()>(())
            }
        });
        assert_eq!(runner.status(), Status::Initial);

        let trigger = runner.trigger(());
        assert_eq!(runner.status(), Status::Working);
        assert!(runner.is_loading());
        assert_eq!(started.load(Ordering::SeqCst), 0);

        trigger.await;
        assert_eq!(started.load(Ordering::SeqCst), 1);
        assert_eq!(runner.status(), Status::Done);
    }

    #[tokio::test]
    async fn test_construction_does_not_call() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let runner = AsyncRunner::builder(move |_: ()| {
            counter.fetch_add(1, Ordering::SeqCst);
            async { Ok::<_, ()>(0) }
        })
        .on_done(|_, _| {})
        .build();
        let _clone = runner.clone();
        tokio::task::yield_now().await;
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(runner.state().is_initial());
    }

    #[tokio::test]
    async fn test_callbacks_receive_args() {
        let done = Arc::new(Mutex::new(Vec::new()));
        let errors = Arc::new(Mutex::new(Vec::new()));
        let done_log = done.clone();
        let error_log = errors.clone();
        let runner = AsyncRunner::builder(|(a, b): (i32, i32)| async move {
            if b == 0 {
                Err(format!("{a} / 0"))
            } else {
                Ok(a / b)
            }
        })
        .on_done(move |result, ctx| done_log.lock().unwrap().push((*result, *ctx.args)))
        .on_error(move |error, ctx| error_log.lock().unwrap().push((error.clone(), *ctx.args)))
        .build();

        assert_eq!(runner.trigger((6, 3)).await, Some(2));
        assert_eq!(runner.trigger((1, 0)).await, None);

        assert_eq!(*done.lock().unwrap(), vec![(2, (6, 3))]);
        assert_eq!(*errors.lock().unwrap(), vec![("1 / 0".to_string(), (1, 0))]);
    }

    #[tokio::test]
    async fn test_callback_sees_updated_state() {
        let seen = Arc::new(Mutex::new(None));
        let runner_slot: Arc<Mutex<Option<AsyncRunner<(), i32, ()>>>> = Arc::new(Mutex::new(None));
        let slot = runner_slot.clone();
        let seen_log = seen.clone();
        let runner = AsyncRunner::builder(|_: ()| async { Ok(3) })
            .on_done(move |_, _| {
                let status = slot.lock().unwrap().as_ref().map(|runner| runner.status());
                *seen_log.lock().unwrap() = status;
            })
            .build();
        *runner_slot.lock().unwrap() = Some(runner.clone());

        runner.trigger(()).await;
        assert_eq!(*seen.lock().unwrap(), Some(Status::Done));
        runner_slot.lock().unwrap().take();
    }

    #[tokio::test]
    #[should_panic(expected = "callback exploded")]
    async fn test_callback_panic_reaches_caller() {
        let runner = AsyncRunner::builder(|_: ()| async { Ok::<_, ()>(1) })
            .on_done(|_, _| panic!("callback exploded"))
            .build();
        runner.trigger(()).await;
    }

    #[tokio::test]
    async fn test_error_callback_panic_reaches_caller() {
        let seen = Arc::new(Mutex::new(None));
        let runner_slot: Arc<Mutex<Option<AsyncRunner<(), (), &'static str>>>> =
            Arc::new(Mutex::new(None));
        let slot = runner_slot.clone();
        let seen_log = seen.clone();
        let runner = AsyncRunner::builder(|_: ()| async { Err("boom") })
            .on_error(move |_, _| {
                let status = slot.lock().unwrap().as_ref().map(|runner| runner.status());
                *seen_log.lock().unwrap() = status;
                panic!("error callback exploded");
            })
            .build();
        *runner_slot.lock().unwrap() = Some(runner.clone());

        let error = tokio::spawn(runner.trigger(())).await.unwrap_err();
        assert!(error.is_panic());
        assert_eq!(
            error.into_panic().downcast_ref::<&str>(),
            Some(&"error callback exploded")
        );
        assert_eq!(*seen.lock().unwrap(), Some(Status::Failed));
        assert_eq!(runner.state(), ExecutionState::failed("boom"));
        runner_slot.lock().unwrap().take();
    }

    #[test]
    fn test_trigger_outside_runtime_leaves_state() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let runner = AsyncRunner::new(move |_: ()| {
            counter.fetch_add(1, Ordering::SeqCst);
            async { Ok::<_, ()>(1) }
        });

        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _ = runner.trigger(());
        }));

        assert!(outcome.is_err());
        assert_eq!(runner.status(), Status::Initial);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_last_settled_wins() {
        let runner = AsyncRunner::new(|delay_ms: u64| async move {
            tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            Ok::<_, ()>(delay_ms)
        });
        let slow = runner.trigger(100);
        let fast = runner.trigger(10);
        assert_eq!(fast.await, Some(10));
        assert_eq!(runner.state().data, Some(10));
        assert_eq!(slow.await, Some(100));
        assert_eq!(runner.state().data, Some(100));
    }

    #[tokio::test(start_paused = true)]
    async fn test_discard_stale() {
        let done = Arc::new(AtomicUsize::new(0));
        let counter = done.clone();
        let runner = AsyncRunner::builder(|delay_ms: u64| async move {
            tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            Ok::<_, ()>(delay_ms)
        })
        .on_done(move |_, _| {
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .discard_stale(true)
        .build();

        let slow = runner.trigger(100);
        let fast = runner.trigger(10);
        assert_eq!(fast.await, Some(10));
        assert_eq!(slow.await, Some(100));
        assert_eq!(runner.state(), ExecutionState::done(10));
        assert_eq!(done.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_settled_waits_for_outcome() {
        let runner = AsyncRunner::new(|_: ()| async {
            tokio::task::yield_now().await;
            Err::<(), _>(7)
        });
        let _detached = runner.trigger(());
        let state = runner.settled().await;
        assert_eq!(state, ExecutionState::failed(7));
    }
}
