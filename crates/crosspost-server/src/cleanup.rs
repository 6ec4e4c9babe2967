use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crosspost_core::Linker;

/// Background task that deletes setup tokens past their TTL.
///
/// Expiry is also enforced lazily on every token lookup; this only keeps
/// abandoned tokens from piling up.
pub async fn run_sweep_loop(linker: Linker, interval_secs: u64, cancel: CancellationToken) {
    let mut interval = tokio::time::interval(Duration::from_secs(interval_secs));

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = interval.tick() => {}
        }

        let linker = linker.clone();
        match tokio::task::spawn_blocking(move || linker.sweep_expired()).await {
            Ok(Ok(count)) => {
                if count > 0 {
                    info!("Sweep: removed {} expired setup tokens", count);
                }
            }
            Ok(Err(e)) => warn!("Sweep error: {}", e),
            Err(e) => warn!("Sweep task failed: {}", e),
        }
    }

    debug!("token sweeper stopped");
}
