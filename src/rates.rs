// Per-second rates from cumulative counters, tracked across ticks per entity key.

use std::collections::HashMap;

/// Bytes per second to kilobits per second.
pub fn bytes_to_kbps(bytes_per_sec: f64) -> f64 {
    bytes_per_sec * 8.0 / 1000.0
}

/// Bytes per second to MiB per second.
pub fn bytes_to_mibps(bytes_per_sec: f64) -> f64 {
    bytes_per_sec / (1024.0 * 1024.0)
}

pub fn bytes_to_gib(bytes: u64) -> f64 {
    bytes as f64 / (1024.0 * 1024.0 * 1024.0)
}

#[derive(Debug, Clone)]
struct CounterSample<const N: usize> {
    timestamp: f64,
    counters: [u64; N],
    rates: [f64; N],
    seen: bool,
}

/// Tracks the last sample of `N` cumulative counters per key and derives per-second rates.
///
/// Keys are pruned by [`RateTracker::prune_unseen`]: every key not observed since the
/// previous prune is dropped, so interfaces or disks that disappear do not linger.
#[derive(Debug, Clone)]
pub struct RateTracker<const N: usize> {
    samples: HashMap<String, CounterSample<N>>,
}

impl<const N: usize> Default for RateTracker<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> RateTracker<N> {
    pub fn new() -> Self {
        Self {
            samples: HashMap::new(),
        }
    }

    /// Records `counters` for `key` at `timestamp` (seconds) and returns per-second rates.
    ///
    /// First observation yields all zeros. A non-advancing timestamp returns the previous
    /// rates and leaves the stored sample untouched. A counter that went backwards
    /// (reset or wrap) contributes a rate of 0.
    pub fn observe(&mut self, key: &str, timestamp: f64, counters: [u64; N]) -> [f64; N] {
        let Some(prev) = self.samples.get_mut(key) else {
            self.samples.insert(
                key.to_string(),
                CounterSample {
                    timestamp,
                    counters,
                    rates: [0.0; N],
                    seen: true,
                },
            );
            return [0.0; N];
        };
        prev.seen = true;

        let dt = timestamp - prev.timestamp;
        if dt.is_nan() || dt <= 0.0 {
            return prev.rates;
        }

        let mut rates = [0.0; N];
        for (i, rate) in rates.iter_mut().enumerate() {
            let delta = counters[i].saturating_sub(prev.counters[i]);
            *rate = delta as f64 / dt;
        }
        prev.timestamp = timestamp;
        prev.counters = counters;
        prev.rates = rates;
        rates
    }

    /// Drops keys not observed since the last prune and clears the marks for the next poll.
    pub fn prune_unseen(&mut self) {
        self.samples.retain(|_, s| std::mem::take(&mut s.seen));
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.samples.contains_key(key)
    }
}
