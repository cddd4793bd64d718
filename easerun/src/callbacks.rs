use std::sync::Arc;

/// Call context handed to completion callbacks.
#[derive(Debug)]
pub struct CallContext<'a, A> {
    /// The arguments the settled trigger was called with.
    pub args: &'a A,
}

impl<A> Clone for CallContext<'_, A> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<A> Copy for CallContext<'_, A> {}

/// Completion callback shared by every clone of a runner.
pub type Callback<V, A> = Arc<dyn for<'a> Fn(&V, CallContext<'a, A>) + Send + Sync>;

pub(crate) fn noop<V: 'static, A: 'static>() -> Callback<V, A> {
    Arc::new(|_: &V, _: CallContext<'_, A>| {})
}
