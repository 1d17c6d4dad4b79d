//! Runs a periodic job until it finishes or the process receives SIGINT/SIGTERM.
//!
//! ```text
//! RUST_LOG=sigctx=debug,graceful_shutdown=info cargo run --example graceful_shutdown
//! SIGCTX_SIGNALS="INT,TERM,HUP" cargo run --example graceful_shutdown
//! ```

use anyhow::Context as _;
use sigctx::prelude::*;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

const TICKS: u32 = 30;

async fn run_job(ctx: &dyn Context) {
    let mut interval = tokio::time::interval(Duration::from_millis(500));
    let done = ctx.done();
    for tick in 1..=TICKS {
        tokio::select! {
            _ = interval.tick() => info!(tick, "working"),
            () = done.wait() => return,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let signals = match std::env::var("SIGCTX_SIGNALS") {
        Ok(list) => list.parse::<SignalSet>().context("parsing SIGCTX_SIGNALS")?,
        Err(_) => SignalSet::shutdown(),
    };

    let (parent, _cancel_parent) = with_timeout(background(), Duration::from_secs(60));
    let (ctx, cancel) = try_with_cancel_by_signal(parent, &signals)
        .context("subscribing to shutdown signals")?;
    info!(%signals, "running; send one of the signals to stop");

    run_job(&*ctx).await;
    cancel.cancel();
    ctx.done().wait().await;

    match ctx.err() {
        Some(ContextError::SignalReceived) => info!("interrupted by signal, shutting down"),
        Some(ContextError::DeadlineExceeded) => info!("ran out of time"),
        other => info!(cause = ?other, "job finished"),
    }
    Ok(())
}
