/// Selector (C6).
///
/// Three strategies over the pool, all skipping backends whose `inactive`
/// flag is set. Callers are expected to have already short-circuited the
/// empty-pool / all-inactive cases (§4.6) before calling `pick` — a `None`
/// return here is just defensive.
use rand::Rng;

use crate::backend::{Backend, BackendIndex};
use crate::config::Strategy;

pub trait Selector: Send {
    fn pick(&mut self, backends: &[Backend]) -> Option<BackendIndex>;
}

/// Builds the selector requested on the command line. The cursor/counters
/// a strategy needs live on the dispatcher, not the pool, since only the
/// dispatcher ever reads or writes them (see design note in SPEC_FULL.md).
pub fn build(strategy: Strategy) -> Box<dyn Selector> {
    match strategy {
        Strategy::WeightedRoundRobin => Box::new(WeightedRoundRobin::new()),
        Strategy::LeastConnections => Box::new(LeastConnections),
        Strategy::Random => Box::new(Random),
    }
}

/// Persistent cursor + hit counter (§4.6). Advancing skips inactive
/// backends up to `pool_size + 4` hops before giving up and resetting the
/// cursor to index 0, bounding the scan in case the pool mutates mid-loop.
pub struct WeightedRoundRobin {
    current: BackendIndex,
    hits: u32,
}

impl WeightedRoundRobin {
    pub fn new() -> WeightedRoundRobin {
        WeightedRoundRobin { current: 0, hits: 0 }
    }

    fn advance(&mut self, backends: &[Backend]) {
        let len = backends.len();
        if len == 0 {
            return;
        }
        let bound = len + 4;
        let mut idx = (self.current + 1) % len;
        let mut hops = 0;
        while backends[idx].inactive && hops < bound {
            idx = (idx + 1) % len;
            hops += 1;
        }
        self.current = if backends[idx].inactive { 0 } else { idx };
    }
}

impl Default for WeightedRoundRobin {
    fn default() -> Self {
        WeightedRoundRobin::new()
    }
}

impl Selector for WeightedRoundRobin {
    fn pick(&mut self, backends: &[Backend]) -> Option<BackendIndex> {
        if backends.is_empty() {
            return None;
        }
        if self.current >= backends.len() {
            self.current = 0;
        }
        if backends[self.current].inactive {
            self.advance(backends);
        }
        if backends[self.current].inactive {
            return None;
        }

        let chosen = self.current;
        self.hits += 1;
        if self.hits >= backends[chosen].weight || backends[chosen].inactive {
            self.hits = 0;
            self.advance(backends);
        }
        Some(chosen)
    }
}

/// Linear scan for the active backend with the smallest in-flight count.
/// Ties broken by larger weight, then by lower id.
pub struct LeastConnections;

impl Selector for LeastConnections {
    fn pick(&mut self, backends: &[Backend]) -> Option<BackendIndex> {
        backends
            .iter()
            .enumerate()
            .filter(|(_, b)| !b.inactive)
            .min_by(|(_, a), (_, b)| {
                a.in_flight
                    .cmp(&b.in_flight)
                    .then(b.weight.cmp(&a.weight))
                    .then(a.id.cmp(&b.id))
            })
            .map(|(idx, _)| idx)
    }
}

/// Uniformly picks an index; if it lands on an inactive backend, scans
/// forward (wrapping) to the first active one.
pub struct Random;

impl Selector for Random {
    fn pick(&mut self, backends: &[Backend]) -> Option<BackendIndex> {
        let len = backends.len();
        if len == 0 {
            return None;
        }
        let start = rand::thread_rng().gen_range(0..len);
        if !backends[start].inactive {
            return Some(start);
        }
        for hop in 1..len {
            let idx = (start + hop) % len;
            if !backends[idx].inactive {
                return Some(idx);
            }
        }
        None
    }
}
