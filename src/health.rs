/// Health prober (C7).
///
/// Background liveness checks for stale backends. A probe is a `HEAD /`
/// request tagged with the [`ClientHandle::Probe`] sentinel; it never
/// writes to a client socket and never counts against a request's retry
/// budget — [`crate::transaction::TransactionManager`] only folds its
/// result into the backend's `inactive`/`probing` flags.
use std::sync::Arc;
use std::time::Duration;

use crate::backend::Pool;
use crate::codec;
use crate::listener::ClientHandle;
use crate::transaction::TransactionManager;

/// Iterates the pool, finds every backend stale enough to re-probe and not
/// already being probed, flips `probing` for each under one exclusive lock
/// acquisition, then hands each one to the transaction manager.
pub async fn run_due_probes(pool: &Arc<Pool>, manager: &mut TransactionManager, stale_timeout: Duration) {
    let due = {
        let mut guard = pool.write().await;
        let now = std::time::Instant::now();
        let mut due = Vec::new();
        for (idx, backend) in guard.iter_mut().enumerate() {
            if !backend.probing && now.saturating_duration_since(backend.last_refreshed) >= stale_timeout {
                backend.probing = true;
                due.push((idx, backend.host.clone()));
            }
        }
        due
    };

    for (idx, host) in due {
        let probe = codec::build_probe_request(&host);
        manager.dispatch(pool.clone(), idx, ClientHandle::Probe, probe, 0);
    }
}
