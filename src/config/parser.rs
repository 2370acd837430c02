//! Command-line argument parsing

use clap::{Parser, ValueEnum};
use regex::Regex;
use std::path::PathBuf;
use std::sync::OnceLock;

use crate::errors::{BarrageError, Result};
use crate::job::HttpType;

static HEADER: OnceLock<Regex> = OnceLock::new();
static AUTH: OnceLock<Regex> = OnceLock::new();

fn header_regex() -> &'static Regex {
    HEADER.get_or_init(|| Regex::new(r"^([\w-]+):\s*(.+)").expect("Invalid header regex"))
}

fn auth_regex() -> &'static Regex {
    AUTH.get_or_init(|| Regex::new(r"^(.+):([^\s].+)").expect("Invalid auth regex"))
}

/// Protocol selector for the CLI
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum HttpTypeArg {
    Http1,
    Http2,
    Http3,
    Ws,
}

impl From<HttpTypeArg> for HttpType {
    fn from(arg: HttpTypeArg) -> Self {
        match arg {
            HttpTypeArg::Http1 => HttpType::Http1,
            HttpTypeArg::Http2 => HttpType::Http2,
            HttpTypeArg::Http3 => HttpType::Http3,
            HttpTypeArg::Ws => HttpType::Ws,
        }
    }
}

/// Raw configuration from command line arguments
#[derive(Parser, Debug, Clone)]
#[command(
    name = "barrage",
    version,
    about = "A distributed HTTP and WebSocket load generator with templated requests",
    long_about = None
)]
pub struct RawArgs {
    /// Target URL; may contain template helper expressions
    #[arg(value_name = "URL")]
    pub positional_url: Option<String>,

    /// Total number of requests (0 = unbounded; then duration governs)
    #[arg(short = 'n', long = "requests", value_name = "COUNT", default_value_t = 0)]
    pub requests: u64,

    /// Number of concurrent workers
    #[arg(short = 'c', long = "concurrency", value_name = "COUNT", default_value_t = 50)]
    pub concurrency: u64,

    /// Aggregate rate limit in requests per second (0 = unthrottled)
    #[arg(short = 'q', long = "qps", value_name = "RATE", default_value_t = 0)]
    pub qps: u64,

    /// Duration cap, e.g. '30s', '5m', '2h'
    #[arg(short = 'd', long = "duration", value_name = "TIME", default_value = "10s")]
    pub duration: String,

    /// Request timeout in milliseconds
    #[arg(short = 't', long = "timeout", value_name = "MS", default_value_t = 3000)]
    pub timeout_ms: u64,

    /// HTTP method
    #[arg(short = 'm', long = "method", value_name = "METHOD", default_value = "GET")]
    pub method: String,

    /// Request body; may contain template helper expressions
    #[arg(long = "body", value_name = "BODY", default_value = "")]
    pub body: String,

    /// Read the request body from a file
    #[arg(long = "body-file", value_name = "PATH")]
    pub body_file: Option<PathBuf>,

    /// Custom header in 'Name: value' form (repeatable)
    #[arg(short = 'H', long = "header", value_name = "HEADER", action = clap::ArgAction::Append)]
    pub headers: Vec<String>,

    /// Basic authentication as username:password
    #[arg(short = 'a', long = "auth", value_name = "USER:PASS")]
    pub auth: Option<String>,

    /// Target URL (alternative to the positional form)
    #[arg(long = "url", value_name = "URL")]
    pub url: Option<String>,

    /// Read a whitespace-separated URL list; each URL becomes a sequential job
    #[arg(long = "url-file", value_name = "PATH")]
    pub url_file: Option<PathBuf>,

    /// Protocol to drive
    #[arg(long = "http", value_enum, value_name = "TYPE", default_value = "http1")]
    pub http_type: HttpTypeArg,

    /// Disable response compression
    #[arg(long = "disable-compression")]
    pub disable_compression: bool,

    /// Disable keep-alive; prevents TCP connection reuse between requests
    #[arg(long = "disable-keepalive")]
    pub disable_keepalives: bool,

    /// HTTP proxy as a URL (http1 transport only)
    #[arg(short = 'x', long = "proxy", value_name = "URL")]
    pub proxy: Option<String>,

    /// Number of runtime worker threads (defaults to the core count)
    #[arg(long = "cpus", value_name = "COUNT")]
    pub cpus: Option<usize>,

    /// Output format: summary when empty, 'csv' for latency bucket rows
    #[arg(short = 'o', long = "output", value_name = "FORMAT", default_value = "")]
    pub output: String,

    /// Run as a distributed worker, listening on this address
    #[arg(long = "listen", value_name = "HOST:PORT")]
    pub listen: Option<String>,

    /// Serve the dashboard UI and JSON API on this address
    #[arg(long = "dashboard", value_name = "HOST:PORT")]
    pub dashboard: Option<String>,

    /// Peer worker address for coordinator mode (repeatable)
    #[arg(short = 'W', long = "worker", value_name = "HOST:PORT", action = clap::ArgAction::Append)]
    pub workers: Vec<String>,

    /// Log level: 0=trace 1=debug 2=info 3=error
    #[arg(long = "verbose", value_name = "LEVEL", default_value_t = 3)]
    pub verbose: u8,

    /// Print canonical usage examples and exit
    #[arg(long = "example")]
    pub example: bool,

    /// Load a script body, carried in the job but not executed
    #[arg(long = "script", value_name = "PATH")]
    pub script: Option<PathBuf>,
}

/// Parse argv. Usage errors become configuration errors (exit code 1);
/// help and version print and exit 0 here.
pub fn parse_raw() -> Result<RawArgs> {
    RawArgs::try_parse().map_err(|e| match e.kind() {
        clap::error::ErrorKind::DisplayHelp | clap::error::ErrorKind::DisplayVersion => {
            let _ = e.print();
            std::process::exit(0);
        }
        _ => BarrageError::config(e.to_string()),
    })
}

/// Parse a duration string with an s/m/h suffix (plain numbers are seconds).
pub fn parse_duration_secs(input: &str) -> Result<u64> {
    let input = input.trim();
    if input.is_empty() {
        return Err(BarrageError::config("Duration cannot be empty"));
    }

    let (number_part, multiplier) = match input.chars().last() {
        Some('s') | Some('S') => (&input[..input.len() - 1], 1),
        Some('m') | Some('M') => (&input[..input.len() - 1], 60),
        Some('h') | Some('H') => (&input[..input.len() - 1], 3600),
        _ => (input, 1),
    };

    let value = number_part.parse::<u64>().map_err(|_| {
        BarrageError::config(format!("Invalid duration format: '{}'", input))
    })?;
    Ok(value * multiplier)
}

/// Split one 'Name: value' header argument.
pub fn parse_header(input: &str) -> Result<(String, String)> {
    let caps = header_regex().captures(input).ok_or_else(|| {
        BarrageError::config(format!(
            "Invalid header format '{}'. Use 'Name: value' format",
            input
        ))
    })?;
    Ok((caps[1].to_string(), caps[2].to_string()))
}

/// Split one 'username:password' auth argument.
pub fn parse_auth(input: &str) -> Result<(String, String)> {
    let caps = auth_regex().captures(input).ok_or_else(|| {
        BarrageError::config(format!(
            "Invalid auth format '{}'. Use 'username:password' format",
            input
        ))
    })?;
    Ok((caps[1].to_string(), caps[2].to_string()))
}

pub const EXAMPLES: &str = r#"
1.Example load test:
    barrage -n 1000 -c 10 -t 3000 -m GET --url "http://127.0.0.1/test1"
    barrage -n 1000 -c 10 -t 3000 -m GET "http://127.0.0.1/test1"
    barrage -d 10s -c 10 -m POST --body "{}" --url-file urls.txt

2.Example HTTP/2 test:
    barrage -d 10s -c 10 --http http2 -m POST "https://127.0.0.1/test1" --body "{}"

3.Example HTTP/3 test:
    barrage -d 10s -c 10 --http http3 -m POST "https://127.0.0.1/test1" --body "{}"

4.Example WebSocket test:
    barrage -d 10s -c 2 --http ws "ws://127.0.0.1/echo" --body "ping"

5.Example dashboard:
    barrage --dashboard "127.0.0.1:12345" --verbose 1

6.Example template helpers:
    barrage -c 1 -n 1 "https://127.0.0.1:18090?data={{ randomString 10 }}" --verbose 0

7.Example distributed test:
    (1) barrage --listen "127.0.0.1:12710" --verbose 1
    (2) barrage -c 1 -d 10s "http://127.0.0.1:18090/test1" --body "{}" -W "127.0.0.1:12710"
"#;
