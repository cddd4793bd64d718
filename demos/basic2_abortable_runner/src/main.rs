use crate::tracing_setup::tracing_init;
use easerun::{AbortError, AbortLifecycle, AbortableAsyncRunner};
use futures_signals::signal::SignalExt;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::time::sleep;
use tracing::{debug, info, warn};

mod tracing_setup;

/// Resolves after `ms`, or rejects as soon as the signal fires.
async fn abortable_sleep(lifecycle: AbortLifecycle, ms: u64) -> Result<String, AbortError> {
    debug!("Worker | sleep started");
    let (tx, rx) = oneshot::channel();
    let listener = lifecycle.signal.on_abort(move || {
        let _ = tx.send(());
    });
    tokio::select! {
        _ = sleep(Duration::from_millis(ms)) => {
            lifecycle.signal.remove_listener(listener);
            Ok("Sleep finished".to_string())
        }
        _ = rx => Err(AbortError::Aborted),
    }
}

async fn show_until_settled(runner: &AbortableAsyncRunner<u64, String, AbortError>) {
    runner
        .to_signal()
        .stop_if(|state| state.is_settled())
        .for_each(|state| async move {
            info!("  Main | show state: {:?}", state);
        })
        .await;
}

#[tokio::main]
async fn main() {
    tracing_init();

    let runner = AbortableAsyncRunner::builder(abortable_sleep)
        .on_done(|result, ctx| debug!("Worker | done: {result} after {}ms", ctx.args))
        .on_error(|error, ctx| debug!("Worker | error: {error} after asking for {}ms", ctx.args))
        .build();

    info!("==========================================");
    warn!("A. Sleep runs to completion");
    let _pending = runner.trigger(300);
    show_until_settled(&runner).await;

    info!("==========================================");
    warn!("B. Abort from main while sleeping");
    let _pending = runner.trigger(5_000);
    let aborter = runner.clone();
    let abort_task = tokio::spawn(async move {
        sleep(Duration::from_millis(200)).await;
        info!("  Main | abort fired: {}", aborter.abort());
    });
    show_until_settled(&runner).await;
    let _ = abort_task.await;

    info!("==========================================");
    warn!("C. Dropping the runner aborts the current trigger");
    let pending = runner.trigger(5_000);
    drop(runner);
    info!("  Main | trigger resolved to {:?}", pending.await);

    info!("  Main | Finish");
}
