//! Shared helpers for signalair-core's integration test suite: a quiet
//! (no background heartbeat/sweep) config and a thin wrapper around
//! `MeshHandle::start` over `InMemoryTransport`.

use signalair_core::prelude::*;
use std::sync::Arc;
use std::time::Duration;

/// A router config with heartbeat/sweep intervals pushed far into the
/// future, so scripted scenarios aren't racing a background timer they
/// didn't ask for.
pub fn quiet_config() -> Config {
    let mut config = Config::default();
    config.heartbeat_interval = Duration::from_secs(3600);
    config.cleanup_interval = Duration::from_secs(3600);
    config
}

pub fn start_peer(id: &str, transport: Arc<InMemoryTransport>) -> MeshHandle {
    MeshHandle::start(PeerId::new(id), quiet_config(), transport, Arc::new(DefaultCryptoProvider::new()))
        .expect("default config validates")
}

/// Gives the router's actor task a chance to drain whatever was just
/// enqueued. Scenarios that need exact ordering capture frames from
/// `InMemoryTransport::drain_sent` and relay them by hand instead of
/// relying on timing.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(30)).await;
}

/// Like `settle`, but for `start_paused = true` tests where advancing
/// wall time isn't the point — just let the router's actor task drain
/// its channels via repeated cooperative yields.
pub async fn settle_paused() {
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }
}
