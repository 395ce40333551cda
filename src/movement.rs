// Movement trend tracking - per-pair distance history
//
// Remembers the last observed distance for each unordered vehicle pair
// and classifies subsequent observations as approaching or receding.
// A minimum sampling interval keeps high-frequency GPS updates from
// dominating the trend, and a hysteresis band keeps jitter from
// flip-flopping the classification.

use std::collections::HashMap;

use serde::Serialize;

/// Minimum seconds between samples used for a trend (default)
pub const DEFAULT_MIN_SAMPLE_INTERVAL: f64 = 1.0;

/// Distance change in meters below which no trend is reported (default)
pub const DEFAULT_HYSTERESIS_M: f64 = 0.3;

/// Seconds after which an unrefreshed pair record is swept (default)
pub const DEFAULT_PAIR_MAX_AGE: f64 = 300.0;

/// Canonical, order-independent key for an unordered vehicle pair
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PairKey {
    a: String,
    b: String,
}

impl PairKey {
    /// Build the key; the two identities are stored sorted so that
    /// `new(x, y) == new(y, x)`.
    pub fn new(x: &str, y: &str) -> Self {
        if x <= y {
            PairKey {
                a: x.to_string(),
                b: y.to_string(),
            }
        } else {
            PairKey {
                a: y.to_string(),
                b: x.to_string(),
            }
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.a == id || self.b == id
    }

    /// Display form, e.g. "5550001-5550002"
    pub fn canonical(&self) -> String {
        format!("{}-{}", self.a, self.b)
    }
}

/// Distance trend for a pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Approaching,
    Receding,
    Unknown,
}

/// Classification result: trend plus closing/opening speed in m/s
/// (zero when no meaningful trend exists)
#[derive(Debug, Clone, Copy, Serialize)]
pub struct Movement {
    pub trend: Trend,
    pub speed: f64,
}

impl Movement {
    fn unknown() -> Self {
        Movement {
            trend: Trend::Unknown,
            speed: 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct PairState {
    distance: f64,
    timestamp: f64,
}

/// Per-pair distance trend classifier
///
/// Owns the pair-state map. Callers serialize access by holding this
/// behind a lock; there is no interior synchronization.
pub struct MovementTracker {
    pairs: HashMap<PairKey, PairState>,
    min_sample_interval: f64,
    hysteresis_m: f64,
}

impl MovementTracker {
    pub fn new(min_sample_interval: f64, hysteresis_m: f64) -> Self {
        MovementTracker {
            pairs: HashMap::new(),
            min_sample_interval,
            hysteresis_m,
        }
    }

    /// Classify the trend for `key` given the current distance in meters.
    ///
    /// First observation of a pair stores the sample and reports
    /// `unknown`. Samples arriving sooner than the minimum interval (or
    /// out of order) are ignored and leave the stored state untouched.
    /// Otherwise the stored state is updated unconditionally and the
    /// trend is derived from the distance delta against the hysteresis
    /// band.
    pub fn classify(&mut self, key: PairKey, distance: f64, now: f64) -> Movement {
        let state = match self.pairs.get_mut(&key) {
            Some(s) => s,
            None => {
                self.pairs.insert(
                    key,
                    PairState {
                        distance,
                        timestamp: now,
                    },
                );
                return Movement::unknown();
            }
        };

        let dt = now - state.timestamp;
        if dt < self.min_sample_interval {
            return Movement::unknown();
        }

        let delta = distance - state.distance;
        state.distance = distance;
        state.timestamp = now;

        if delta < -self.hysteresis_m {
            Movement {
                trend: Trend::Approaching,
                speed: (delta / dt).abs(),
            }
        } else if delta > self.hysteresis_m {
            Movement {
                trend: Trend::Receding,
                speed: (delta / dt).abs(),
            }
        } else {
            Movement::unknown()
        }
    }

    /// Drop all pair records that reference the given vehicle identity.
    /// Called when a vehicle is deactivated. Returns the number removed.
    pub fn evict_vehicle(&mut self, id: &str) -> usize {
        let before = self.pairs.len();
        self.pairs.retain(|key, _| !key.contains(id));
        before - self.pairs.len()
    }

    /// Drop pair records whose last sample is older than `max_age`
    /// seconds. Returns the number removed.
    pub fn sweep(&mut self, now: f64, max_age: f64) -> usize {
        let before = self.pairs.len();
        self.pairs.retain(|_, state| now - state.timestamp <= max_age);
        before - self.pairs.len()
    }

    pub fn pair_count(&self) -> usize {
        self.pairs.len()
    }
}

impl Default for MovementTracker {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_SAMPLE_INTERVAL, DEFAULT_HYSTERESIS_M)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pair_key_order_independent() {
        let k1 = PairKey::new("5550001", "5550002");
        let k2 = PairKey::new("5550002", "5550001");
        assert_eq!(k1, k2);
        assert_eq!(k1.canonical(), "5550001-5550002");
        assert!(k1.contains("5550001"));
        assert!(k1.contains("5550002"));
        assert!(!k1.contains("5550003"));
    }

    #[test]
    fn test_first_observation_is_unknown() {
        let mut mt = MovementTracker::default();
        let m = mt.classify(PairKey::new("a", "b"), 10.0, 1000.0);
        assert_eq!(m.trend, Trend::Unknown);
        assert_eq!(m.speed, 0.0);
        assert_eq!(mt.pair_count(), 1);
    }

    #[test]
    fn test_monotonic_approach() {
        let mut mt = MovementTracker::default();
        let key = PairKey::new("a", "b");

        assert_eq!(mt.classify(key.clone(), 10.0, 1000.0).trend, Trend::Unknown);

        // 2 m closer after 2 s
        let m = mt.classify(key.clone(), 8.0, 1002.0);
        assert_eq!(m.trend, Trend::Approaching);
        assert!((m.speed - 1.0).abs() < 1e-9);

        // Still closing on the third sample
        let m = mt.classify(key, 6.5, 1003.0);
        assert_eq!(m.trend, Trend::Approaching);
        assert!((m.speed - 1.5).abs() < 1e-9);
    }

    #[test]
    fn test_receding() {
        let mut mt = MovementTracker::default();
        let key = PairKey::new("a", "b");

        mt.classify(key.clone(), 5.0, 1000.0);
        let m = mt.classify(key, 9.0, 1002.0);
        assert_eq!(m.trend, Trend::Receding);
        assert!((m.speed - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_sample_too_soon_leaves_state_unchanged() {
        let mut mt = MovementTracker::default();
        let key = PairKey::new("a", "b");

        mt.classify(key.clone(), 10.0, 1000.0);

        // 0.5 s later: ignored, stored state keeps the 1000.0 sample
        let m = mt.classify(key.clone(), 2.0, 1000.5);
        assert_eq!(m.trend, Trend::Unknown);

        // Next valid sample compares against the original 10.0 m
        let m = mt.classify(key, 8.0, 1001.5);
        assert_eq!(m.trend, Trend::Approaching);
        assert!((m.speed - (2.0 / 1.5)).abs() < 1e-9);
    }

    #[test]
    fn test_hysteresis_suppresses_jitter() {
        let mut mt = MovementTracker::default();
        let key = PairKey::new("a", "b");

        mt.classify(key.clone(), 10.0, 1000.0);

        // +-0.2 m changes are inside the 0.3 m band
        let m = mt.classify(key.clone(), 10.2, 1002.0);
        assert_eq!(m.trend, Trend::Unknown);
        assert_eq!(m.speed, 0.0);

        let m = mt.classify(key, 10.0, 1004.0);
        assert_eq!(m.trend, Trend::Unknown);
        assert_eq!(m.speed, 0.0);
    }

    #[test]
    fn test_out_of_order_sample_ignored() {
        let mut mt = MovementTracker::default();
        let key = PairKey::new("a", "b");

        mt.classify(key.clone(), 10.0, 1000.0);
        // Earlier timestamp than the stored sample
        let m = mt.classify(key.clone(), 4.0, 999.0);
        assert_eq!(m.trend, Trend::Unknown);

        // Stored state still reflects the 1000.0 sample
        let m = mt.classify(key, 8.0, 1002.0);
        assert_eq!(m.trend, Trend::Approaching);
    }

    #[test]
    fn test_custom_band_and_interval() {
        let mut mt = MovementTracker::new(5.0, 1.0);
        let key = PairKey::new("a", "b");

        mt.classify(key.clone(), 10.0, 1000.0);
        // 4 s is below the 5 s interval
        assert_eq!(mt.classify(key.clone(), 2.0, 1004.0).trend, Trend::Unknown);
        // 0.9 m change is inside the 1.0 m band
        assert_eq!(mt.classify(key.clone(), 9.1, 1006.0).trend, Trend::Unknown);
        // 2 m change is not
        assert_eq!(mt.classify(key, 7.1, 1012.0).trend, Trend::Approaching);
    }

    #[test]
    fn test_evict_vehicle() {
        let mut mt = MovementTracker::default();
        mt.classify(PairKey::new("a", "b"), 10.0, 1000.0);
        mt.classify(PairKey::new("a", "c"), 20.0, 1000.0);
        mt.classify(PairKey::new("b", "c"), 30.0, 1000.0);

        assert_eq!(mt.evict_vehicle("a"), 2);
        assert_eq!(mt.pair_count(), 1);
    }

    #[test]
    fn test_sweep_stale_pairs() {
        let mut mt = MovementTracker::default();
        mt.classify(PairKey::new("a", "b"), 10.0, 1000.0);
        mt.classify(PairKey::new("a", "c"), 20.0, 1200.0);

        assert_eq!(mt.sweep(1400.0, 300.0), 1);
        assert_eq!(mt.pair_count(), 1);

        // Surviving pair still classifies against its stored sample
        let m = mt.classify(PairKey::new("a", "c"), 15.0, 1400.0);
        assert_eq!(m.trend, Trend::Approaching);
    }
}
