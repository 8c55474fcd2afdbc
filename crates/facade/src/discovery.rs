//! Client-side endpoint discovery for the service façade (spec §4.4):
//! reservoir-sample one endpoint uniformly from a dynamically-refreshed
//! list, with a bounded wait if the list is momentarily empty.

use parking_lot::RwLock;
use rand::Rng;
use std::time::{Duration, Instant};
use tracing::debug;

/// A source of currently-live service endpoints.
pub trait Discovery: Send + Sync {
    /// The endpoints known right now. May be empty momentarily (e.g.
    /// during a topology change); callers should retry rather than treat
    /// an empty list as permanent.
    fn endpoints(&self) -> Vec<String>;
}

/// Reservoir-sample one endpoint from `candidates`, uniformly, without
/// needing the total count in advance (Algorithm R, k = 1).
pub fn pick_one<R: Rng>(candidates: impl Iterator<Item = String>, rng: &mut R) -> Option<String> {
    let mut chosen = None;
    let mut seen: u64 = 0;
    for candidate in candidates {
        seen += 1;
        if rng.gen_range(0..seen) == 0 {
            chosen = Some(candidate);
        }
    }
    chosen
}

/// Pick one endpoint from `discovery`, polling up to `max_wait` if the
/// list is momentarily empty.
pub fn pick_endpoint_blocking(discovery: &dyn Discovery, max_wait: Duration, poll_interval: Duration) -> Option<String> {
    let deadline = Instant::now() + max_wait;
    let mut rng = rand::thread_rng();
    loop {
        let endpoints = discovery.endpoints();
        if !endpoints.is_empty() {
            return pick_one(endpoints.into_iter(), &mut rng);
        }
        let now = Instant::now();
        if now >= deadline {
            debug!("discovery list still empty after bounded wait");
            return None;
        }
        std::thread::sleep(poll_interval.min(deadline - now));
    }
}

/// An in-memory, mutable `Discovery` — the in-process stand-in used by
/// tests and the single-node façade; a networked implementation would
/// poll a registry service instead.
#[derive(Default)]
pub struct StaticDiscovery {
    endpoints: RwLock<Vec<String>>,
}

impl StaticDiscovery {
    /// Build a discovery source seeded with `endpoints`.
    pub fn new(endpoints: Vec<String>) -> Self {
        StaticDiscovery {
            endpoints: RwLock::new(endpoints),
        }
    }

    /// Replace the known endpoint list, simulating a topology refresh.
    pub fn set(&self, endpoints: Vec<String>) {
        *self.endpoints.write() = endpoints;
    }
}

impl Discovery for StaticDiscovery {
    fn endpoints(&self) -> Vec<String> {
        self.endpoints.read().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn pick_one_returns_none_for_an_empty_iterator() {
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(pick_one(std::iter::empty(), &mut rng), None);
    }

    #[test]
    fn pick_one_always_returns_the_only_candidate() {
        let mut rng = StdRng::seed_from_u64(1);
        let candidates = vec!["a".to_string()];
        assert_eq!(pick_one(candidates.into_iter(), &mut rng), Some("a".to_string()));
    }

    #[test]
    fn pick_endpoint_blocking_waits_for_a_populated_list() {
        let discovery = StaticDiscovery::default();
        let discovery = std::sync::Arc::new(discovery);
        let writer = std::sync::Arc::clone(&discovery);
        std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(20));
            writer.set(vec!["node-a".to_string()]);
        });

        let picked = pick_endpoint_blocking(discovery.as_ref(), Duration::from_secs(1), Duration::from_millis(5));
        assert_eq!(picked, Some("node-a".to_string()));
    }

    #[test]
    fn pick_endpoint_blocking_gives_up_after_the_bound() {
        let discovery = StaticDiscovery::default();
        let picked = pick_endpoint_blocking(&discovery, Duration::from_millis(20), Duration::from_millis(5));
        assert_eq!(picked, None);
    }
}
