//! Pure reductions from raw window state to flat statistics.
//!
//! Everything in here is deterministic in its arguments; the engine decides
//! the namespace each (suffix, value) pair is rendered under.

use buckets::TimerBucket;

/// Rate a counter total over the flush window, per second.
pub fn counter_rate(total: f64, flush_interval_ms: u64) -> f64 {
    total / (flush_interval_ms as f64 / 1000.0)
}

/// Summarize one timer bucket into (stat suffix, value) pairs.
///
/// `count` is the number of raw samples received -- not scaled -- while
/// `count_ps` is normalized by the last-seen sample rate and the window
/// length. Percentile thresholds have been validated into `(0, 100]` at
/// startup. `bins` are ascending histogram bin upper bounds; when present an
/// implicit `inf` bin catches everything above the last bound.
///
/// An empty bucket reduces to nothing: timers are cleared on every flush, so
/// there is no such thing as an idle timer key.
pub fn summarize_timer(
    bucket: &TimerBucket,
    flush_interval_ms: u64,
    percentiles: &[f64],
    bins: Option<&[f64]>,
) -> Vec<(String, f64)> {
    let mut stats = Vec::with_capacity(9 + 3 * percentiles.len());
    let count = bucket.values.len();
    if count == 0 {
        return stats;
    }

    let mut values = bucket.values.clone();
    values.sort_by(|a, b| a.partial_cmp(b).unwrap());

    let count_f = count as f64;
    let interval_s = flush_interval_ms as f64 / 1000.0;
    let sum: f64 = values.iter().sum();
    let mean = sum / count_f;

    for pct in percentiles {
        let suffix = clean_pct(*pct);
        let mut idx = (count_f * pct / 100.0).round() as usize;
        if idx < 1 {
            idx = 1;
        } else if idx > count {
            idx = count;
        }
        let tail = &values[..idx];
        let sum_p: f64 = tail.iter().sum();
        stats.push((format!("mean_{}", suffix), sum_p / idx as f64));
        stats.push((format!("upper_{}", suffix), tail[idx - 1]));
        stats.push((format!("sum_{}", suffix), sum_p));
    }

    if let Some(bins) = bins {
        let mut prev = ::std::f64::NEG_INFINITY;
        for bin in bins {
            let in_bin = values.iter().filter(|v| **v > prev && **v <= *bin).count();
            stats.push((format!("histogram.bin_{}", bin), in_bin as f64));
            prev = *bin;
        }
        let above = values.iter().filter(|v| **v > prev).count();
        stats.push(("histogram.bin_inf".to_string(), above as f64));
    }

    let variance = values.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / count_f;
    let median = if count % 2 == 0 {
        (values[count / 2 - 1] + values[count / 2]) / 2.0
    } else {
        values[count / 2]
    };

    stats.push(("std".to_string(), variance.sqrt()));
    stats.push(("upper".to_string(), values[count - 1]));
    stats.push(("lower".to_string(), values[0]));
    stats.push(("count".to_string(), count_f));
    stats.push(("count_ps".to_string(), count_f / bucket.rate / interval_s));
    stats.push(("sum".to_string(), sum));
    stats.push(("sum_squares".to_string(), values.iter().map(|v| v * v).sum()));
    stats.push(("mean".to_string(), mean));
    stats.push(("median".to_string(), median));
    stats
}

/// `99.9` renders as `99_9`; dots would read as graphite path separators.
fn clean_pct(pct: f64) -> String {
    format!("{}", pct).replace('.', "_")
}
