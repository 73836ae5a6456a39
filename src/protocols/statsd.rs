//! The statsd line protocol.
//!
//! Valid message formats are:
//!
//! - `<str:metric_name>:<f64:value>|<str:type>`
//! - `<str:metric_name>:<f64:value>|<str:type>|@<f64:sample_rate>`
//!
//! where the type is one of `c`, `ms`, `g` or `s`. Multiple metrics can be
//! sent in a single UDP packet separated by newlines; every line is parsed on
//! its own, so one malformed line never poisons its siblings.

use metric::Sample;
use std::str::FromStr;

/// Parse a full datagram payload.
///
/// Parsed samples are appended to `res`. The return value is the number of
/// malformed lines encountered; empty lines -- a trailing newline, say -- are
/// skipped without penalty.
pub fn parse_statsd(source: &str, res: &mut Vec<Sample>) -> usize {
    let mut bad_lines = 0;
    for src in source.lines() {
        if src.is_empty() {
            continue;
        }
        match parse_line(src) {
            Some(sample) => res.push(sample),
            None => bad_lines += 1,
        }
    }
    bad_lines
}

/// Parse a single `name:value|type[|@rate]` line.
pub fn parse_line(src: &str) -> Option<Sample> {
    let colon_idx = src.find(':')?;
    let name = &src[..colon_idx];
    if name.is_empty() {
        return None;
    }
    let rest = &src[colon_idx + 1..];
    let pipe_idx = rest.find('|')?;
    let val_str = &rest[..pipe_idx];
    if val_str.is_empty() {
        return None;
    }

    let mut fields = rest[pipe_idx + 1..].split('|');
    let kind = fields.next()?;
    let rate = match fields.next() {
        Some(field) => {
            if !field.starts_with('@') {
                return None;
            }
            let rate = f64::from_str(&field[1..]).ok()?;
            if !(rate > 0.0 && rate <= 1.0) {
                return None;
            }
            rate
        }
        None => 1.0,
    };
    if fields.next().is_some() {
        return None;
    }

    match kind {
        "c" => Some(Sample::Counter {
            name: name.to_string(),
            value: parse_value(val_str)?,
            rate: rate,
        }),
        "ms" => Some(Sample::Timer {
            name: name.to_string(),
            value: parse_value(val_str)?,
            rate: rate,
        }),
        "g" => Some(Sample::Gauge {
            name: name.to_string(),
            value: parse_value(val_str)?,
            // a sign prefix marks an adjustment, so an absolute negative
            // gauge cannot be expressed on the wire
            delta: val_str.starts_with('+') || val_str.starts_with('-'),
        }),
        "s" => Some(Sample::Set {
            name: name.to_string(),
            member: val_str.to_string(),
        }),
        _ => None,
    }
}

fn parse_value(src: &str) -> Option<f64> {
    match f64::from_str(src) {
        Ok(f) if f.is_finite() => Some(f),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use metric::Sample;

    #[test]
    fn test_parse_metric_via_api() {
        let pyld =
            "zrth:0|g\nfst:1.1|ms\nsnd:+2.2|g\nfth:4|c\nfvth:5.5|c|@0.2\nsxth:-6.6|g\nsvth:wow|s";
        let mut res = Vec::new();
        assert_eq!(0, parse_statsd(pyld, &mut res));

        assert_eq!(Sample::gauge("zrth", 0.0), res[0]);
        assert_eq!(Sample::timer("fst", 1.1), res[1]);
        assert_eq!(Sample::delta_gauge("snd", 2.2), res[2]);
        assert_eq!(Sample::counter("fth", 4.0), res[3]);
        assert_eq!(
            Sample::Counter {
                name: "fvth".to_string(),
                value: 5.5,
                rate: 0.2,
            },
            res[4]
        );
        assert_eq!(Sample::delta_gauge("sxth", -6.6), res[5]);
        assert_eq!(Sample::set("svth", "wow"), res[6]);
    }

    #[test]
    fn test_metric_equal_in_name() {
        let res = parse_line("A=:1|ms").unwrap();
        assert_eq!(Sample::timer("A=", 1.0), res);
    }

    #[test]
    fn test_metric_slash_in_name() {
        let res = parse_line("A/:1|ms").unwrap();
        assert_eq!(Sample::timer("A/", 1.0), res);
    }

    #[test]
    fn test_sampled_timer_keeps_rate() {
        let res = parse_line("a_test_value:100|ms|@0.1").unwrap();
        assert_eq!(
            Sample::Timer {
                name: "a_test_value".to_string(),
                value: 100.0,
                rate: 0.1,
            },
            res
        );
    }

    #[test]
    fn test_set_member_kept_verbatim() {
        // "3" and "3.0" are distinct members, numeric or not
        assert_eq!(Sample::set("s", "3"), parse_line("s:3|s").unwrap());
        assert_eq!(Sample::set("s", "3.0"), parse_line("s:3.0|s").unwrap());
    }

    #[test]
    fn test_metric_invalid() {
        let invalid = vec![
            "",
            "metric",
            "metric|11:",
            "metric|12",
            "metric:13|",
            ":|@",
            ":1.0|c",
            "a_bad_test_value|z",
            "name:value|c",
            "name:1|z",
            "name:1|c|0.1",
            "name:1|c|@0",
            "name:1|c|@-0.1",
            "name:1|c|@1.1",
            "name:1|c|@huh",
            "name:1|c|@0.5|extra",
            "name:NaN|ms",
            "name:inf|g",
        ];
        for input in &invalid {
            assert_eq!(None, parse_line(input), "accepted {:?}", input);
        }
    }

    #[test]
    fn test_bad_line_does_not_poison_siblings() {
        let mut res = Vec::new();
        let bad = parse_statsd("a.b:12.1|g\nno pipe here\nb_c:13.2|c\n", &mut res);
        assert_eq!(1, bad);
        assert_eq!(2, res.len());
        assert_eq!(Sample::gauge("a.b", 12.1), res[0]);
        assert_eq!(Sample::counter("b_c", 13.2), res[1]);
    }

    #[test]
    fn test_trailing_newline_is_free() {
        let mut res = Vec::new();
        assert_eq!(0, parse_statsd("foo:1|c\n", &mut res));
        assert_eq!(1, res.len());
    }

    #[test]
    fn test_rate_on_gauge_validated_but_unused() {
        // the rate grammar applies to every type even though only counters
        // and timers consume it
        assert!(parse_line("foo:1|g|@0.5").is_some());
        assert_eq!(None, parse_line("foo:1|g|@2"));
    }
}
