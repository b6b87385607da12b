use anyhow::Result;
use tokio::sync::watch;
use tokio::time::{interval, Duration, MissedTickBehavior};

use crate::core::shutdown::shutdown_watch;
use crate::core::state::AppState;
use crate::tasks::learning_summary;

pub(crate) async fn run(state: AppState) -> Result<()> {
    let shutdown = shutdown_watch();
    let handle = tokio::spawn(learning_summary_loop(state.clone(), shutdown));

    tracing::info!(
        interval_seconds = state.settings().learning_summary().interval_seconds,
        batch_size = state.settings().learning_summary().batch_size,
        "PlayPack worker started"
    );

    if let Err(err) = handle.await {
        tracing::error!(error = %err, "Background task join failed");
    }
    tracing::info!("PlayPack worker stopped");

    Ok(())
}

async fn learning_summary_loop(state: AppState, mut shutdown: watch::Receiver<bool>) {
    let config = state.settings().learning_summary().clone();
    let mut tick = interval(Duration::from_secs(config.interval_seconds));
    tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            _ = tick.tick() => {
                if let Err(err) = learning_summary::recover_stale(state.learning(), config.stale_minutes).await {
                    tracing::error!(error = %err, "recover_stale failed");
                }
                if let Err(err) = learning_summary::process_queue(
                    state.learning(),
                    state.generator(),
                    config.batch_size,
                    state.settings().ai().summary_max_tokens,
                )
                .await
                {
                    tracing::error!(error = %err, "process_queue failed");
                }
            }
        }
    }
}
