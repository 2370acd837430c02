//! Job data model: the descriptor exchanged between driver, dashboard and
//! peers, and the per-request sample flowing from workers to the aggregator.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Command carried in a [`JobDescriptor`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Command {
    #[default]
    Start,
    Stop,
    Metrics,
}

/// Protocol selector for the job's client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HttpType {
    #[default]
    Http1,
    Http2,
    Http3,
    Ws,
}

impl HttpType {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpType::Http1 => "http1",
            HttpType::Http2 => "http2",
            HttpType::Http3 => "http3",
            HttpType::Ws => "ws",
        }
    }
}

impl std::fmt::Display for HttpType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The unit of work exchanged between UI, local driver and peers.
///
/// Cloned verbatim to peer worker processes; every field rides the wire as
/// snake_case JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JobDescriptor {
    /// Monotonic job key: wall-clock seconds at submission.
    pub sequence_id: i64,
    pub cmd: Command,
    pub request_method: String,
    pub request_body: String,
    /// Carried through to peers but never executed.
    pub request_script_body: String,
    pub request_http_type: HttpType,
    /// Total request cap; 0 means unbounded (then `duration` governs).
    pub n: u64,
    /// Concurrency: workers per job, >= 1.
    pub c: u64,
    /// Seconds cap; applies when `n` is 0 and as an upper bound otherwise.
    pub duration: u64,
    pub timeout_ms: u64,
    /// Aggregate requests-per-second target across all workers; 0 = unthrottled.
    pub qps: u64,
    pub disable_compression: bool,
    pub disable_keepalives: bool,
    pub auth_username: String,
    pub auth_password: String,
    pub headers: HashMap<String, Vec<String>>,
    /// URL template; may contain helper expressions.
    pub url: String,
    /// Output format selector: "" for text, "csv" for bucket rows.
    pub output: String,
}

impl Default for JobDescriptor {
    fn default() -> Self {
        Self {
            sequence_id: 0,
            cmd: Command::Start,
            request_method: "GET".to_string(),
            request_body: String::new(),
            request_script_body: String::new(),
            request_http_type: HttpType::Http1,
            n: 0,
            c: 1,
            duration: 0,
            timeout_ms: 3000,
            qps: 0,
            disable_compression: false,
            disable_keepalives: false,
            auth_username: String::new(),
            auth_password: String::new(),
            headers: HashMap::new(),
            url: String::new(),
            output: String::new(),
        }
    }
}

impl JobDescriptor {
    /// Requests each worker issues for a bounded run: exactly `n / c`.
    pub fn requests_per_worker(&self) -> u64 {
        if self.n == 0 { 0 } else { self.n / self.c.max(1) }
    }

    /// Per-worker pause between requests so the aggregate converges on
    /// `qps`: each of the `c` workers runs at `qps / c`.
    pub fn worker_interval(&self) -> Option<Duration> {
        if self.qps == 0 {
            return None;
        }
        let micros = 1_000_000 * self.c.max(1) / self.qps;
        Some(Duration::from_micros(micros.max(1)))
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Clone with a different command; used for stop/metrics fan-out.
    pub fn with_cmd(&self, cmd: Command) -> Self {
        let mut desc = self.clone();
        desc.cmd = cmd;
        desc
    }
}

impl std::fmt::Display for JobDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match serde_json::to_string_pretty(self) {
            Ok(body) => f.write_str(&body),
            Err(e) => write!(f, "{}", e),
        }
    }
}

/// A single completed request, as reported by a worker.
#[derive(Debug, Clone)]
pub struct Sample {
    pub status_code: u16,
    pub elapsed: Duration,
    pub content_length: u64,
    pub error: Option<String>,
}

impl Sample {
    pub fn success(status_code: u16, elapsed: Duration, content_length: u64) -> Self {
        Self {
            status_code,
            elapsed,
            content_length,
            error: None,
        }
    }

    pub fn failure(message: String) -> Self {
        Self {
            status_code: 0,
            elapsed: Duration::ZERO,
            content_length: 0,
            error: Some(message),
        }
    }
}
