/// Dispatcher loop (C8).
///
/// The single control loop tying the listener, pool, transaction manager,
/// selector and health prober together. Runs on one `tokio::task`; all
/// network I/O for backends is delegated to the short-lived workers
/// `TransactionManager::dispatch` spawns, so this loop itself only ever
/// suspends on a bounded accept poll, a bounded reap pass, and brief
/// pool-lock acquisitions.
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use log::{info, warn};

use crate::backend::Pool;
use crate::codec;
use crate::health;
use crate::listener::{self, ClientHandle, Listener};
use crate::selector::{self, Selector};
use crate::transaction::{FailureRecord, TransactionManager};

/// Poll timeout for a single accept attempt per tick (§4.8).
const ACCEPT_POLL_MS: u64 = 10;

pub struct Dispatcher {
    listener: Listener,
    pool: Arc<Pool>,
    manager: TransactionManager,
    selector: Box<dyn Selector>,
    failure_queue: VecDeque<FailureRecord>,
    retries: u32,
    stale_timeout: Duration,
    quit: Arc<AtomicBool>,
}

impl Dispatcher {
    pub fn new(
        listener: Listener,
        pool: Arc<Pool>,
        strategy: crate::config::Strategy,
        retries: u32,
        stale_timeout: Duration,
        quit: Arc<AtomicBool>,
    ) -> Dispatcher {
        Dispatcher {
            listener,
            pool,
            manager: TransactionManager::new(),
            selector: selector::build(strategy),
            failure_queue: VecDeque::new(),
            retries,
            stale_timeout,
            quit,
        }
    }

    /// Runs until the shutdown flag is observed at the top of an
    /// iteration. There is no explicit cancellation of in-flight workers on
    /// shutdown — their own bounded receive timeout caps their lifetime.
    pub async fn run(&mut self) {
        loop {
            if self.quit.load(Ordering::Relaxed) {
                info!("dispatcher observed shutdown flag, exiting loop");
                break;
            }

            self.manager.reap(&self.pool, self.retries, &mut self.failure_queue).await;
            health::run_due_probes(&self.pool, &mut self.manager, self.stale_timeout).await;

            if let Some(item) = self.failure_queue.pop_front() {
                self.dispatch_with_selector(item.handle, item.request, item.attempt).await;
                continue;
            }

            let accepted = self.listener.try_accept_latest(ACCEPT_POLL_MS).await;
            let (request, handle) = match accepted {
                Some(pair) => pair,
                None => continue,
            };

            if self.pool.is_empty().await || self.pool.all_inactive().await {
                let body = codec::build_503();
                if let Err(e) = listener::respond(handle, &body).await {
                    warn!("client write failed while sending 503: {}", e);
                }
                continue;
            }

            self.dispatch_with_selector(handle, request, 0).await;
        }
    }

    async fn dispatch_with_selector(&mut self, handle: ClientHandle, request: Vec<u8>, attempt: u32) {
        let chosen = {
            let guard = self.pool.read().await;
            self.selector.pick(&guard)
        };

        match chosen {
            Some(idx) => self.manager.dispatch(self.pool.clone(), idx, handle, request, attempt),
            None => {
                let body = codec::build_503();
                if let Err(e) = listener::respond(handle, &body).await {
                    warn!("client write failed while sending 503: {}", e);
                }
            }
        }
    }
}
