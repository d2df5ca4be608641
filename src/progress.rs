use crate::types::ProgressSample;
use lazy_static::lazy_static;
use regex::Regex;
use std::time::Instant;

lazy_static! {
    static ref CLOCK: Regex = Regex::new(r"^(\d+):(\d+):(\d+\.\d+)$").unwrap();
    static ref OUT_TIME: Regex = Regex::new(r"out_time=(\S+)").unwrap();
    static ref DURATION: Regex = Regex::new(r"Duration: ([^,\s]+)").unwrap();
}

/// Parses a bare `HH:MM:SS.frac` timestamp into seconds.
pub fn parse_timestamp(raw: &str) -> Option<f64> {
    let caps = CLOCK.captures(raw.trim())?;
    let field = |i: usize| caps.get(i)?.as_str().parse::<f64>().ok();
    Some(field(1)? * 3600.0 + field(2)? * 60.0 + field(3)?)
}

/// Extracts the elapsed position from one line of `-progress` output.
///
/// Lines without an `out_time=` marker (frame counts, bitrate, `progress=continue`, ...) are
/// expected and yield `None`, as do markers whose value is not a timestamp (`N/A`, negative
/// start values).
pub fn parse_line(raw_line: &str, observed_at: Instant) -> Option<ProgressSample> {
    let caps = OUT_TIME.captures(raw_line)?;
    let elapsed_seconds = parse_timestamp(caps.get(1)?.as_str())?;
    Some(ProgressSample {
        elapsed_seconds,
        observed_at,
    })
}

/// Finds the total length in the diagnostic text of an inspection run.
pub fn parse_duration(diagnostics: &str) -> Option<f64> {
    DURATION
        .captures_iter(diagnostics)
        .find_map(|caps| parse_timestamp(caps.get(1)?.as_str()))
}
