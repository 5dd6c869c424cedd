/// Backend pool (C4).
///
/// An ordered, append-only list of upstream servers guarded by a single
/// readers-writer lock. Order is insertion order and never changes, so a
/// backend's index into the vector is a stable reference for the lifetime
/// of the pool — workers and the selector both use it instead of carrying
/// pointers into the vector's storage.
use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use tokio::net::lookup_host;
use tokio::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

pub type BackendIndex = usize;

/// An upstream server entry, owned by the pool for the lifetime of the
/// process.
#[derive(Debug, Clone)]
pub struct Backend {
    pub id: u64,
    pub host: String,
    pub port: u16,
    pub weight: u32,
    pub inactive: bool,
    pub probing: bool,
    pub last_refreshed: Instant,
    pub in_flight: u64,
}

impl Backend {
    fn new(id: u64, host: String, port: u16, weight: u32) -> Backend {
        Backend {
            id,
            host,
            port,
            weight: weight.max(1),
            inactive: false,
            probing: false,
            last_refreshed: Instant::now(),
            in_flight: 0,
        }
    }

    /// Resolves `host:port` to a connectable address. Accepts both IP
    /// literals and hostnames by delegating to the OS resolver.
    pub async fn socket_addr(&self) -> io::Result<SocketAddr> {
        lookup_host((self.host.as_str(), self.port))
            .await?
            .next()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "no address found for backend"))
    }
}

/// Ordered collection of [`Backend`]s with shared, contended state.
///
/// Reads (selection, iteration, probe scheduling) dominate; writes are
/// small field flips (in-flight, last-refreshed, inactive, probing), so a
/// readers-writer lock is used rather than a single mutex.
pub struct Pool {
    backends: RwLock<Vec<Backend>>,
    next_id: AtomicU64,
}

impl Pool {
    pub fn new() -> Pool {
        Pool {
            backends: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Registers a new backend, assigning it the next monotonically
    /// increasing id unless `id` is given explicitly, and appends it to the
    /// end of the pool. Returns the id assigned.
    pub async fn add(&self, host: String, port: u16, weight: u32, id: Option<u64>) -> u64 {
        let id = match id {
            Some(id) => {
                // Keep the counter ahead of any caller-specified id so later
                // auto-assigned ids never collide with it.
                self.next_id.fetch_max(id + 1, Ordering::AcqRel);
                id
            }
            None => self.next_id.fetch_add(1, Ordering::AcqRel),
        };
        let backend = Backend::new(id, host, port, weight);
        self.backends.write().await.push(backend);
        id
    }

    pub async fn len(&self) -> usize {
        self.backends.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.backends.read().await.is_empty()
    }

    pub async fn all_inactive(&self) -> bool {
        let guard = self.backends.read().await;
        !guard.is_empty() && guard.iter().all(|b| b.inactive)
    }

    /// Read-only iteration under the shared lock.
    pub async fn snapshot_under_shared_lock<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&[Backend]) -> R,
    {
        let guard = self.backends.read().await;
        f(&guard)
    }

    pub async fn read(&self) -> RwLockReadGuard<'_, Vec<Backend>> {
        self.backends.read().await
    }

    pub async fn write(&self) -> RwLockWriteGuard<'_, Vec<Backend>> {
        self.backends.write().await
    }
}

impl Default for Pool {
    fn default() -> Self {
        Pool::new()
    }
}
