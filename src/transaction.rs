/// Transaction manager (C5).
///
/// Spawns one independent `tokio::task` per outbound attempt (normal or
/// probe), polls them for completion on `reap`, and routes results back to
/// the listener or the retry queue. Workers never touch the listener or
/// each other; they only mutate their target backend's counters and
/// timestamp, and only while holding the pool's exclusive lock.
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Instant;

use log::{debug, warn};
use tokio::net::lookup_host;
use tokio::task::JoinHandle;

use crate::backend::{BackendIndex, Pool};
use crate::listener::{self, ClientHandle};
use crate::upstream::{self, UpstreamError};

/// Result of one outbound attempt, consumed exactly once by `reap`.
struct TransactionOutcome {
    handle: ClientHandle,
    backend: BackendIndex,
    reply: Result<Vec<u8>, UpstreamError>,
}

/// An in-flight outbound attempt.
struct Transaction {
    task: JoinHandle<TransactionOutcome>,
    #[allow(dead_code)]
    created_at: Instant,
    request: Vec<u8>,
    attempt: u32,
    is_probe: bool,
}

/// A transaction that resolved without a usable upstream reply and is
/// still within the retry budget.
pub struct FailureRecord {
    pub handle: ClientHandle,
    pub request: Vec<u8>,
    pub backend: BackendIndex,
    pub attempt: u32,
}

pub struct TransactionManager {
    live: Vec<Transaction>,
}

impl TransactionManager {
    pub fn new() -> TransactionManager {
        TransactionManager { live: Vec::new() }
    }

    pub fn live_count(&self) -> usize {
        self.live.len()
    }

    /// Spawns a new outbound attempt against `backend`. Preconditions: the
    /// caller has already chosen `backend` under a shared lock on `pool`;
    /// `handle` is either a real client handle or the probe sentinel.
    pub fn dispatch(
        &mut self,
        pool: Arc<Pool>,
        backend: BackendIndex,
        handle: ClientHandle,
        request: Vec<u8>,
        attempt: u32,
    ) {
        let is_probe = handle.is_probe();
        let request_for_task = request.clone();
        let created_at = Instant::now();

        let task = tokio::spawn(async move {
            let (host, port) = {
                let mut guard = pool.write().await;
                guard[backend].in_flight += 1;
                guard[backend].last_refreshed = Instant::now();
                (guard[backend].host.clone(), guard[backend].port)
            };

            let reply = match lookup_host((host.as_str(), port)).await.ok().and_then(|mut it| it.next()) {
                Some(addr) => upstream::query(addr, &request_for_task).await,
                None => Err(UpstreamError::Connect),
            };

            {
                let mut guard = pool.write().await;
                guard[backend].in_flight = guard[backend].in_flight.saturating_sub(1);
            }

            TransactionOutcome { handle, backend, reply }
        });

        self.live.push(Transaction {
            task,
            created_at,
            request,
            attempt,
            is_probe,
        });
    }

    /// Inspects every live transaction with a non-blocking completion
    /// check (the tightest possible reading of the "≤ 10 ms bounded wait"
    /// from §4.5) and routes each resolved one to the listener or the
    /// retry queue. Resolved transactions are removed from the live set.
    pub async fn reap(&mut self, pool: &Pool, max_retries: u32, failure_queue: &mut VecDeque<FailureRecord>) {
        let mut still_live = Vec::with_capacity(self.live.len());
        let pending: Vec<Transaction> = self.live.drain(..).collect();

        for txn in pending {
            if !txn.task.is_finished() {
                still_live.push(txn);
                continue;
            }

            let attempt = txn.attempt;
            let is_probe = txn.is_probe;
            let request = txn.request;

            match txn.task.await {
                Ok(outcome) => {
                    Self::route_outcome(pool, outcome, attempt, is_probe, request, max_retries, failure_queue).await;
                }
                Err(join_err) => {
                    warn!("transaction worker panicked: {}", join_err);
                }
            }
        }

        self.live = still_live;
    }

    async fn route_outcome(
        pool: &Pool,
        outcome: TransactionOutcome,
        attempt: u32,
        is_probe: bool,
        request: Vec<u8>,
        max_retries: u32,
        failure_queue: &mut VecDeque<FailureRecord>,
    ) {
        let TransactionOutcome { handle, backend, reply } = outcome;

        match reply {
            Ok(bytes) => {
                {
                    let mut guard = pool.write().await;
                    guard[backend].inactive = false;
                    if is_probe {
                        guard[backend].probing = false;
                    }
                }
                if !is_probe {
                    if let Err(e) = listener::respond(handle, &bytes).await {
                        warn!("client write failed: {}", e);
                    }
                }
            }
            Err(e) => {
                {
                    let mut guard = pool.write().await;
                    guard[backend].inactive = true;
                    if is_probe {
                        guard[backend].probing = false;
                    }
                }
                debug!("upstream attempt against backend {} failed: {}", backend, e);

                if is_probe {
                    return;
                }

                if attempt < max_retries {
                    failure_queue.push_back(FailureRecord {
                        handle,
                        request,
                        backend,
                        attempt: attempt + 1,
                    });
                } else {
                    let body = crate::codec::build_503();
                    if let Err(e) = listener::respond(handle, &body).await {
                        warn!("client write failed while sending 503: {}", e);
                    }
                }
            }
        }
    }
}

impl Default for TransactionManager {
    fn default() -> Self {
        TransactionManager::new()
    }
}
