use crate::tracing_setup::tracing_init;
use easerun::{AsyncRunner, ExecutionState};
use futures_signals::signal::SignalExt;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{info, warn};

mod tracing_setup;

async fn get_data(input: u64) -> Result<u64, String> {
    sleep(Duration::from_millis(500)).await;
    if input == 0 {
        return Err("input must not be zero".to_string());
    }
    Ok(input + 1)
}

async fn show_until_settled(runner: &AsyncRunner<u64, u64, String>) {
    runner
        .to_signal()
        .stop_if(|state| state.is_settled())
        .for_each(|state: ExecutionState<u64, String>| async move {
            info!(
                "  Main | status: {}, loading: {}, data: {:?}, error: {:?}",
                state.status,
                state.is_loading(),
                state.data,
                state.error
            );
        })
        .await;
}

#[tokio::main]
async fn main() {
    tracing_init();

    let runner = AsyncRunner::builder(get_data)
        .on_done(|result, ctx| info!("Worker | done with {result} for input {}", ctx.args))
        .on_error(|error, ctx| warn!("Worker | failed with {error:?} for input {}", ctx.args))
        .build();

    info!("==========================================");
    warn!("A. Trigger with 2");
    let pending = runner.trigger(2);
    show_until_settled(&runner).await;
    info!("  Main | trigger resolved to {:?}", pending.await);

    info!("==========================================");
    warn!("B. Trigger with 0, the failure lands in the state");
    let pending = runner.trigger(0);
    show_until_settled(&runner).await;
    info!("  Main | trigger resolved to {:?}", pending.await);

    info!("  Main | Finish");
}
