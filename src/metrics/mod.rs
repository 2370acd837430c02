//! Metrics aggregation for the load engine
//!
//! - Streaming per-sample updates into a running [`StressReport`]
//! - Element-wise merge of reports from local workers and remote peers
//! - Latency quantile computation over the bucketed histogram
//! - Text and CSV rendering (see `reporting`)

pub mod reporting;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

use crate::constants::{LATENCY_PERCENTILES, SCALE};
use crate::job::Sample;

/// Aggregated outcome of a job, merged across workers and peers.
///
/// Latencies and rates are integers scaled by [`SCALE`] so merges stay
/// drift-free; print paths divide back down. Distributions are ordered maps
/// so report output and JSON are deterministic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StressReport {
    pub err_code: i32,
    pub err_msg: String,
    pub avg_total: i64,
    pub fastest: i64,
    pub slowest: i64,
    pub average: i64,
    pub rps: i64,
    pub error_dist: BTreeMap<String, u64>,
    pub status_code_dist: BTreeMap<u16, u64>,
    /// Latency histogram keyed by "%.3f"-formatted seconds; the zero-padded
    /// form makes lexicographic order numeric-equivalent.
    pub lats: BTreeMap<String, u64>,
    pub lats_total: i64,
    pub size_total: i64,
    pub duration: i64,
    pub output: String,
}

impl Default for StressReport {
    fn default() -> Self {
        Self {
            err_code: 0,
            err_msg: String::new(),
            avg_total: 0,
            fastest: i64::MAX,
            slowest: i64::MIN,
            average: 0,
            rps: 0,
            error_dist: BTreeMap::new(),
            status_code_dist: BTreeMap::new(),
            lats: BTreeMap::new(),
            lats_total: 0,
            size_total: 0,
            duration: 0,
            output: String::new(),
        }
    }
}

/// Latency bucket key for one elapsed time.
pub fn latency_bucket(elapsed: Duration) -> String {
    format!("{:.3}", elapsed.as_secs_f64())
}

impl StressReport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one worker sample into the running report.
    pub fn record(&mut self, sample: &Sample) {
        if let Some(message) = &sample.error {
            *self.error_dist.entry(message.clone()).or_insert(0) += 1;
            return;
        }

        *self.lats.entry(latency_bucket(sample.elapsed)).or_insert(0) += 1;
        let scaled = (sample.elapsed.as_secs_f64() * SCALE as f64) as i64;
        self.lats_total += 1;
        if self.slowest < scaled {
            self.slowest = scaled;
        }
        if self.fastest > scaled {
            self.fastest = scaled;
        }
        self.avg_total += scaled;
        *self
            .status_code_dist
            .entry(sample.status_code)
            .or_insert(0) += 1;
        if sample.content_length > 0 {
            self.size_total += sample.content_length as i64;
        }
    }

    /// Close out a run: fix the wall-clock duration and derive the rates.
    pub fn finalize(&mut self, total_elapsed: Duration) {
        self.duration = (total_elapsed.as_secs_f64() * SCALE as f64) as i64;
        self.recompute_rates();
    }

    /// Element-wise merge. `rps` and `average` are re-derived once at the
    /// end, so combining is associative over every accumulated field.
    pub fn combine<I>(&mut self, others: I)
    where
        I: IntoIterator<Item = StressReport>,
    {
        for other in others {
            if self.slowest < other.slowest {
                self.slowest = other.slowest;
            }
            if self.fastest > other.fastest {
                self.fastest = other.fastest;
            }
            self.lats_total += other.lats_total;
            self.avg_total += other.avg_total;
            self.size_total += other.size_total;
            for (code, count) in other.status_code_dist {
                *self.status_code_dist.entry(code).or_insert(0) += count;
            }
            for (message, count) in other.error_dist {
                *self.error_dist.entry(message).or_insert(0) += count;
            }
            for (bucket, count) in other.lats {
                *self.lats.entry(bucket).or_insert(0) += count;
            }
        }
        self.recompute_rates();
    }

    fn recompute_rates(&mut self) {
        if self.duration > 0 {
            self.rps = self.lats_total * SCALE * SCALE / self.duration;
        }
        if self.lats_total > 0 {
            self.average = self.avg_total / self.lats_total;
        }
    }

    /// Walk the sorted buckets and pick the first bucket whose cumulative
    /// share reaches each percentile target.
    pub fn percentiles(&self) -> Vec<(u8, String)> {
        let mut data: Vec<(u8, String)> = LATENCY_PERCENTILES
            .iter()
            .map(|p| (*p, String::new()))
            .collect();
        if self.lats_total == 0 {
            return data;
        }

        let mut j = 0;
        let mut cumulative: u64 = 0;
        for (bucket, count) in &self.lats {
            if j >= data.len() {
                break;
            }
            cumulative += count;
            while j < data.len()
                && cumulative * 100 / self.lats_total as u64 >= data[j].0 as u64
            {
                data[j].1 = bucket.clone();
                j += 1;
            }
        }
        data
    }

    pub fn has_samples(&self) -> bool {
        self.lats_total > 0 || !self.error_dist.is_empty()
    }

    pub fn set_error<S: Into<String>>(&mut self, message: S) {
        self.err_code = -1;
        self.err_msg = message.into();
    }
}
