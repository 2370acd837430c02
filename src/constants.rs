//! Application-wide constants and tuning values

use std::time::Duration;

/// Fixed-point factor for sub-second quantities carried in integer fields.
pub const SCALE: i64 = 10_000;

/// Latency distribution percentile targets.
pub const LATENCY_PERCENTILES: [u8; 7] = [10, 25, 50, 75, 90, 95, 99];

// Concurrency limits
pub const MAX_WORKERS_LIMIT: u64 = 10_000;

// HTTP/1.1 transport tuning
pub const IDLE_CONNS_PER_HOST: usize = 10;
pub const IDLE_CONN_TIMEOUT: Duration = Duration::from_secs(90);
pub const TCP_KEEPALIVE: Duration = Duration::from_secs(60);

/// `randomDate` draws from `[RANDOM_DATE_EPOCH_FLOOR, now)` epoch seconds.
pub const RANDOM_DATE_EPOCH_FLOOR: i64 = 94_608_000;
