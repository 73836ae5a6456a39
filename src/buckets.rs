//! Buckets are the primary internal storage type.
//!
//! One map per metric type, keyed by metric name. The same name may live in
//! all four maps at once; the wire type decides which bucket a sample lands
//! in. The engine is the only owner of a `Buckets` value, which is what makes
//! `drain` atomic with respect to ingest.

use fnv::FnvHasher;
use metric::Sample;
use std::collections::{HashMap, HashSet};
use std::hash::BuildHasherDefault;
use std::mem;

/// A `HashMap` with the FNV hasher. Metric names are short and we hash them
/// constantly; FNV wins over SipHash here.
pub type HashMapFnv<K, V> = HashMap<K, V, BuildHasherDefault<FnvHasher>>;

/// Names under this prefix are the daemon's own statistics. They are re-seeded
/// at zero on every flush so the self-observation keys never disappear.
pub const INTERNAL_PREFIX: &'static str = "statsd.";

/// Raw per-window state for one timer.
#[derive(Clone, Debug, PartialEq)]
pub struct TimerBucket {
    /// raw observed values, in arrival order
    pub values: Vec<f64>,
    /// the sample rate most recently seen for this timer
    pub rate: f64,
}

/// The window snapshot `drain` moves out of the store: counters, timers and
/// sets are taken, gauges are copied.
#[derive(Clone, Debug, Default)]
pub struct FlushWindow {
    /// counter totals, already rate-corrected
    pub counters: HashMapFnv<String, f64>,
    /// raw timer state
    pub timers: HashMapFnv<String, TimerBucket>,
    /// current gauge values
    pub gauges: HashMapFnv<String, f64>,
    /// set members
    pub sets: HashMapFnv<String, HashSet<String>>,
}

/// Buckets stores all metrics between flushes.
pub struct Buckets {
    counters: HashMapFnv<String, f64>,
    gauges: HashMapFnv<String, f64>,
    timers: HashMapFnv<String, TimerBucket>,
    sets: HashMapFnv<String, HashSet<String>>,

    delete_counters: bool,
}

impl Default for Buckets {
    /// Create a default Buckets: counter keys are deleted on flush rather
    /// than zeroed.
    fn default() -> Buckets {
        Buckets {
            counters: HashMapFnv::default(),
            gauges: HashMapFnv::default(),
            timers: HashMapFnv::default(),
            sets: HashMapFnv::default(),
            delete_counters: true,
        }
    }
}

impl Buckets {
    /// Create a Buckets with an explicit counter reset policy. With
    /// `delete_counters` false every counter key survives its flush at zero.
    pub fn new(delete_counters: bool) -> Buckets {
        let mut b = Buckets::default();
        b.delete_counters = delete_counters;
        b
    }

    /// Adds a sample to the bucket storage.
    pub fn add(&mut self, sample: Sample) {
        match sample {
            Sample::Counter { name, value, rate } => {
                *self.counters.entry(name).or_insert(0.0) += value / rate;
            }
            Sample::Timer { name, value, rate } => {
                let bkt = self.timers.entry(name).or_insert_with(|| TimerBucket {
                    values: Vec::new(),
                    rate: 1.0,
                });
                bkt.values.push(value);
                bkt.rate = rate;
            }
            Sample::Gauge { name, value, delta } => {
                if delta {
                    *self.gauges.entry(name).or_insert(0.0) += value;
                } else {
                    self.gauges.insert(name, value);
                }
            }
            Sample::Set { name, member } => {
                self.sets
                    .entry(name)
                    .or_insert_with(HashSet::new)
                    .insert(member);
            }
        }
    }

    /// Move the current window out and reset for the next one.
    ///
    /// Counters, timers and sets are taken; gauges are copied and left in
    /// place, surviving until the process exits or a sample overwrites them.
    /// Counter keys come back at zero when the store was built with
    /// `delete_counters` false; self-metric keys always do.
    pub fn drain(&mut self) -> FlushWindow {
        let counters = mem::replace(&mut self.counters, HashMapFnv::default());
        let timers = mem::replace(&mut self.timers, HashMapFnv::default());
        let sets = mem::replace(&mut self.sets, HashMapFnv::default());
        for name in counters.keys() {
            if !self.delete_counters || name.starts_with(INTERNAL_PREFIX) {
                self.counters.insert(name.clone(), 0.0);
            }
        }
        FlushWindow {
            counters: counters,
            timers: timers,
            gauges: self.gauges.clone(),
            sets: sets,
        }
    }

    /// The in-flight counter totals.
    pub fn counters(&self) -> &HashMapFnv<String, f64> {
        &self.counters
    }

    /// The current gauge values.
    pub fn gauges(&self) -> &HashMapFnv<String, f64> {
        &self.gauges
    }

    /// The in-flight timer state.
    pub fn timers(&self) -> &HashMapFnv<String, TimerBucket> {
        &self.timers
    }

    /// The in-flight set members.
    pub fn sets(&self) -> &HashMapFnv<String, HashSet<String>> {
        &self.sets
    }
}

// Tests
//
#[cfg(test)]
mod test {
    use super::*;
    use metric::Sample;
    use quickcheck::{QuickCheck, TestResult};
    use std::collections::{HashMap, HashSet};

    #[test]
    fn test_add_counter_metric() {
        let mut buckets = Buckets::default();
        buckets.add(Sample::counter("some.metric", 1.0));

        let rmname = String::from("some.metric");
        assert!(
            buckets.counters.contains_key(&rmname),
            "Should contain the metric key"
        );
        assert_eq!(Some(&1.0), buckets.counters.get(&rmname));

        // Increment counter
        buckets.add(Sample::counter("some.metric", 1.0));
        assert_eq!(Some(&2.0), buckets.counters.get(&rmname));
        assert_eq!(1, buckets.counters().len());
        assert_eq!(0, buckets.gauges().len());
    }

    #[test]
    fn test_counter_rate_scaling() {
        let mut buckets = Buckets::default();
        buckets.add(Sample::Counter {
            name: "scaled".to_string(),
            value: 1.0,
            rate: 0.1,
        });
        assert_eq!(Some(&10.0), buckets.counters().get("scaled"));
    }

    #[test]
    fn test_add_gauge_metric() {
        let mut buckets = Buckets::default();
        let rmname = String::from("some.metric");
        buckets.add(Sample::gauge("some.metric", 11.5));
        assert!(
            buckets.gauges.contains_key(&rmname),
            "Should contain the metric key"
        );
        assert_eq!(Some(&11.5), buckets.gauges.get(&rmname));
        assert_eq!(1, buckets.gauges().len());
        assert_eq!(0, buckets.counters().len());
    }

    #[test]
    fn test_add_delta_gauge_metric() {
        let mut buckets = Buckets::default();
        buckets.add(Sample::gauge("some.metric", 100.0));
        buckets.add(Sample::delta_gauge("some.metric", -11.5));
        assert_eq!(Some(&88.5), buckets.gauges.get("some.metric"));
        assert_eq!(1, buckets.gauges().len());
    }

    #[test]
    fn test_reset_add_delta_gauge_metric() {
        let mut buckets = Buckets::default();
        buckets.add(Sample::gauge("some.metric", 100.0));
        buckets.add(Sample::delta_gauge("some.metric", -11.5));
        buckets.add(Sample::gauge("some.metric", 2007.3));
        assert_eq!(Some(&2007.3), buckets.gauges.get("some.metric"));
    }

    #[test]
    fn test_delta_gauge_without_base_counts_from_zero() {
        let mut buckets = Buckets::default();
        buckets.add(Sample::delta_gauge("fresh", -3.0));
        assert_eq!(Some(&-3.0), buckets.gauges.get("fresh"));
    }

    #[test]
    fn test_add_timer_metric() {
        let mut buckets = Buckets::default();
        buckets.add(Sample::timer("some.metric", 11.5));
        assert_eq!(
            Some(&TimerBucket {
                values: vec![11.5],
                rate: 1.0,
            }),
            buckets.timers.get("some.metric")
        );

        buckets.add(Sample::Timer {
            name: "some.metric".to_string(),
            value: 99.5,
            rate: 0.1,
        });
        let bkt = buckets.timers.get("some.metric").unwrap();
        assert_eq!(vec![11.5, 99.5], bkt.values);
        // last rate seen wins
        assert_eq!(0.1, bkt.rate);
    }

    #[test]
    fn test_add_set_metric_dedups() {
        let mut buckets = Buckets::default();
        buckets.add(Sample::set("uniques", "a"));
        buckets.add(Sample::set("uniques", "a"));
        buckets.add(Sample::set("uniques", "b"));
        assert_eq!(2, buckets.sets.get("uniques").unwrap().len());
    }

    #[test]
    fn test_drain_resets_window_state() {
        let mut buckets = Buckets::default();
        buckets.add(Sample::counter("cnt", 4.0));
        buckets.add(Sample::timer("tmr", 1.0));
        buckets.add(Sample::gauge("gg", 7.0));
        buckets.add(Sample::set("st", "a"));

        let window = buckets.drain();
        assert_eq!(Some(&4.0), window.counters.get("cnt"));
        assert_eq!(1, window.timers.get("tmr").unwrap().values.len());
        assert_eq!(Some(&7.0), window.gauges.get("gg"));
        assert_eq!(1, window.sets.get("st").unwrap().len());

        // counters deleted under the default policy, timers and sets gone,
        // gauges persist
        assert!(buckets.counters().is_empty());
        assert!(buckets.timers().is_empty());
        assert!(buckets.sets().is_empty());
        assert_eq!(Some(&7.0), buckets.gauges().get("gg"));
    }

    #[test]
    fn test_drain_zeroes_counters_when_persisted() {
        let mut buckets = Buckets::new(false);
        buckets.add(Sample::counter("cnt", 4.0));
        buckets.drain();
        assert_eq!(Some(&0.0), buckets.counters().get("cnt"));

        let second = buckets.drain();
        assert_eq!(Some(&0.0), second.counters.get("cnt"));
    }

    #[test]
    fn test_drain_reseeds_internal_counters() {
        let mut buckets = Buckets::default();
        buckets.add(Sample::counter("statsd.bad_lines_seen", 0.0));
        buckets.add(Sample::counter("user_metric", 1.0));
        buckets.drain();
        assert_eq!(Some(&0.0), buckets.counters().get("statsd.bad_lines_seen"));
        assert_eq!(None, buckets.counters().get("user_metric"));
    }

    #[test]
    fn unique_names_preserved_counters() {
        fn qos_ret(ms: Vec<Sample>) -> TestResult {
            let mut bucket = Buckets::default();

            for m in ms.clone() {
                bucket.add(m);
            }

            let cnts: HashSet<String> = ms.iter().fold(HashSet::default(), |mut acc, m| {
                if let Sample::Counter { ref name, .. } = *m {
                    acc.insert(name.clone());
                }
                acc
            });
            let b_cnts: HashSet<String> =
                bucket.counters().keys().cloned().collect();
            assert_eq!(cnts, b_cnts);

            TestResult::passed()
        }
        QuickCheck::new()
            .tests(100)
            .max_tests(1000)
            .quickcheck(qos_ret as fn(Vec<Sample>) -> TestResult);
    }

    #[test]
    fn unique_names_preserved_gauges() {
        fn qos_ret(ms: Vec<Sample>) -> TestResult {
            let mut bucket = Buckets::default();

            for m in ms.clone() {
                bucket.add(m);
            }

            let gauges: HashSet<String> = ms.iter().fold(HashSet::default(), |mut acc, m| {
                if let Sample::Gauge { ref name, .. } = *m {
                    acc.insert(name.clone());
                }
                acc
            });
            let b_gauges: HashSet<String> =
                bucket.gauges().keys().cloned().collect();
            assert_eq!(gauges, b_gauges);

            TestResult::passed()
        }
        QuickCheck::new()
            .tests(100)
            .max_tests(1000)
            .quickcheck(qos_ret as fn(Vec<Sample>) -> TestResult);
    }

    #[test]
    fn unique_names_preserved_timers() {
        fn qos_ret(ms: Vec<Sample>) -> TestResult {
            let mut bucket = Buckets::default();

            for m in ms.clone() {
                bucket.add(m);
            }

            let tm: HashSet<String> = ms.iter().fold(HashSet::default(), |mut acc, m| {
                if let Sample::Timer { ref name, .. } = *m {
                    acc.insert(name.clone());
                }
                acc
            });
            let b_tm: HashSet<String> = bucket.timers().keys().cloned().collect();
            assert_eq!(tm, b_tm);

            TestResult::passed()
        }
        QuickCheck::new()
            .tests(100)
            .max_tests(1000)
            .quickcheck(qos_ret as fn(Vec<Sample>) -> TestResult);
    }

    #[test]
    fn unique_names_preserved_sets() {
        fn qos_ret(ms: Vec<Sample>) -> TestResult {
            let mut bucket = Buckets::default();

            for m in ms.clone() {
                bucket.add(m);
            }

            let sts: HashSet<String> = ms.iter().fold(HashSet::default(), |mut acc, m| {
                if let Sample::Set { ref name, .. } = *m {
                    acc.insert(name.clone());
                }
                acc
            });
            let b_sts: HashSet<String> = bucket.sets().keys().cloned().collect();
            assert_eq!(sts, b_sts);

            TestResult::passed()
        }
        QuickCheck::new()
            .tests(100)
            .max_tests(1000)
            .quickcheck(qos_ret as fn(Vec<Sample>) -> TestResult);
    }

    #[test]
    fn test_counter_summations() {
        fn qos_ret(ms: Vec<Sample>) -> TestResult {
            let mut bucket = Buckets::default();

            for m in ms.clone() {
                bucket.add(m);
            }

            let mut cnts: HashMap<String, f64> = HashMap::default();
            for m in ms {
                if let Sample::Counter { name, value, rate } = m {
                    *cnts.entry(name).or_insert(0.0) += value / rate;
                }
            }

            assert_eq!(bucket.counters().len(), cnts.len());
            for (k, v) in bucket.counters() {
                assert_eq!(cnts.get(k), Some(v));
            }

            TestResult::passed()
        }
        QuickCheck::new()
            .tests(1000)
            .max_tests(10000)
            .quickcheck(qos_ret as fn(Vec<Sample>) -> TestResult);
    }

    #[test]
    fn test_drain_clears_space() {
        fn qos_ret(ms: Vec<Sample>) -> TestResult {
            let mut bucket = Buckets::default();
            let gauge_count = {
                for m in ms.clone() {
                    bucket.add(m);
                }
                bucket.gauges().len()
            };
            bucket.drain();

            assert_eq!(0, bucket.counters().len());
            assert_eq!(0, bucket.timers().len());
            assert_eq!(0, bucket.sets().len());
            assert_eq!(gauge_count, bucket.gauges().len());

            TestResult::passed()
        }
        QuickCheck::new()
            .tests(100)
            .max_tests(1000)
            .quickcheck(qos_ret as fn(Vec<Sample>) -> TestResult);
    }
}
