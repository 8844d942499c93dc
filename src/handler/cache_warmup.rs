//! Startup cache warm-up
//!
//! Populates every cached on-chain value before the server starts taking
//! requests. A failure here is logged and the key is fetched again on its
//! first request.

use std::time::Instant;

use tracing::{info, warn};

use crate::configuration::{AppState, State};

pub async fn warm_up(app_state: &AppState<State>) {
    let started = Instant::now();
    let keys = app_state.cache.keys();
    info!("Warming up {} cache entries", keys.len());

    match app_state.cache.refresh_all().await {
        Ok(()) => {
            info!(
                "Cache warm-up complete in {:.2}s",
                started.elapsed().as_secs_f64()
            );
        },
        Err(e) => {
            let fetched = keys
                .iter()
                .filter(|key| app_state.cache.entry(**key).fetched)
                .count();
            warn!(
                "Cache warm-up incomplete ({}/{} entries): {}",
                fetched,
                keys.len(),
                e
            );
        },
    }
}
