//! Per-card traffic counters from `/proc/net/dev` and the rates derived from two samples.

use std::collections::{HashMap, HashSet};
use std::io::BufRead;
use std::path::Path;
use std::time::Instant;

use crate::fsutil;

/// Cumulative byte counters of one card.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize)]
pub struct FlowSample {
    pub receive_bytes: u64,
    pub transmit_bytes: u64,
}

/// Counters (or rates) keyed by card name.
pub type CardFlow = HashMap<String, FlowSample>;

/// Number of counters on each interface line of `/proc/net/dev`.
const COUNTER_FIELDS: usize = 16;
/// Position of the transmitted bytes counter among the counters.
const TRANSMIT_BYTES_FIELD: usize = 8;

/// Splits an interface line of `/proc/net/dev` into its name and the counter fields.
fn parse_interface_line(line: &str) -> Option<(&str, impl Iterator<Item = &str>)> {
    let (iface, data) = line.trim().split_once(':')?;
    Some((iface.trim(), data.split_whitespace()))
}

/// Extracts receive and transmit bytes. Lines with fewer than 16 counters yield `None`,
/// unparsable counters read as `0`.
fn sample_from_fields<'a>(fields: impl Iterator<Item = &'a str>) -> Option<FlowSample> {
    let fields: Vec<&str> = fields.take(COUNTER_FIELDS).collect();
    if fields.len() < COUNTER_FIELDS {
        return None;
    }
    Some(FlowSample {
        receive_bytes: fields[0].parse().unwrap_or(0),
        transmit_bytes: fields[TRANSMIT_BYTES_FIELD].parse().unwrap_or(0),
    })
}

/// Parses `/proc/net/dev` content, keeping only the cards named in `names`.
///
/// # Errors
///
/// Returns an `std::io::Error` if reading from `buf` fails.
pub fn flow_from_reader<R: BufRead>(buf: &mut R, names: &HashSet<String>) -> std::io::Result<CardFlow> {
    let mut flow = CardFlow::with_capacity(names.len());
    let mut line = String::new();

    // Skip headers (first two lines)
    for _ in 0..2 {
        buf.read_line(&mut line)?;
        line.clear();
    }

    while buf.read_line(&mut line)? != 0 {
        if let Some((iface, fields)) = parse_interface_line(&line) {
            if names.contains(iface) {
                if let Some(sample) = sample_from_fields(fields) {
                    flow.insert(iface.to_owned(), sample);
                }
            }
        }
        line.clear();
    }

    Ok(flow)
}

/// Reads the counters of the cards in `names` from a `/proc/net/dev` style file.
///
/// An empty `names` set returns an empty flow without touching the file.
///
/// # Errors
///
/// Returns an error if the file cannot be opened or read.
pub fn read_card_flow(path: impl AsRef<Path>, names: &HashSet<String>) -> std::io::Result<CardFlow> {
    if names.is_empty() {
        return Ok(CardFlow::new());
    }
    let mut reader = fsutil::open_file_reader(path).map_err(std::io::Error::from)?;
    flow_from_reader(&mut reader, names)
}

/// Computes per-second rates for every card present in both samples.
///
/// Counters that went backwards (reset or wrap) produce a rate of `0`. An interval
/// of `0` produces an empty result.
pub fn calculate_card_flow(interval_s: u64, previous: &CardFlow, current: &CardFlow) -> CardFlow {
    if interval_s == 0 {
        return CardFlow::new();
    }

    previous
        .iter()
        .filter_map(|(name, pre)| {
            let now = current.get(name)?;
            Some((
                name.clone(),
                FlowSample {
                    receive_bytes: now.receive_bytes.saturating_sub(pre.receive_bytes) / interval_s,
                    transmit_bytes: now.transmit_bytes.saturating_sub(pre.transmit_bytes)
                        / interval_s,
                },
            ))
        })
        .collect()
}

/// Holds the previous sample and derives rates over the time that actually passed.
#[derive(Debug, Default)]
pub struct FlowTracker {
    previous: Option<(Instant, CardFlow)>,
}

impl FlowTracker {
    /// Records `current`, sampled at `at`, and returns the elapsed whole seconds with
    /// the rates since the previous sample.
    ///
    /// The first sample yields `None`. So does a sample less than a second after the
    /// previous one, which is then dropped and the older sample stays the reference.
    pub fn update(&mut self, at: Instant, current: CardFlow) -> Option<(u64, CardFlow)> {
        let Some((then, previous)) = &self.previous else {
            self.previous = Some((at, current));
            return None;
        };
        let elapsed = at.saturating_duration_since(*then).as_secs();
        if elapsed == 0 {
            return None;
        }
        let rates = calculate_card_flow(elapsed, previous, &current);
        self.previous = Some((at, current));
        Some((elapsed, rates))
    }
}
