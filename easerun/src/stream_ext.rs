use crate::ExecutionState;
use futures_core::stream::Stream;
use pin_project::pin_project;
use std::pin::Pin;
use std::task::{Context, Poll};

/// Stream helpers for observing a runner's state over time.
pub trait ExecutionStreamExt<T, E>: Stream<Item = ExecutionState<T, E>> {
    /// Yields snapshots up to and including the first settled one, then ends.
    ///
    /// ```
    /// use easerun::{AsyncRunner, ExecutionStreamExt};
    ///
    /// async fn example() {
    ///     let runner = AsyncRunner::new(|n: u32| async move { Ok::<_, ()>(n + 1) });
    ///     let _pending = runner.trigger(2);
    ///     let _snapshots = runner.to_stream().until_settled();
    /// }
    /// ```
    fn until_settled(self) -> UntilSettled<Self>
    where
        Self: Sized,
    {
        UntilSettled {
            stream: self,
            finished: false,
        }
    }
}

impl<S, T, E> ExecutionStreamExt<T, E> for S where S: Stream<Item = ExecutionState<T, E>> {}

/// Stream returned by [`ExecutionStreamExt::until_settled`].
#[pin_project(project = UntilSettledProj)]
#[derive(Debug)]
#[must_use = "Streams do nothing unless polled"]
pub struct UntilSettled<S> {
    #[pin]
    stream: S,
    finished: bool,
}

impl<S, T, E> Stream for UntilSettled<S>
where
    S: Stream<Item = ExecutionState<T, E>>,
{
    type Item = ExecutionState<T, E>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let UntilSettledProj { stream, finished } = self.project();
        if *finished {
            return Poll::Ready(None);
        }
        match stream.poll_next(cx) {
            Poll::Ready(Some(state)) => {
                *finished = state.is_settled();
                Poll::Ready(Some(state))
            }
            Poll::Ready(None) => {
                *finished = true;
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }
}
