//! Request templating for dynamic values in URLs and bodies
//!
//! A template is parsed once per job and rendered once per request.
//! Recognized helper expressions:
//! - `{{ intSum 1 2 3 }}` - integer sum of the arguments
//! - `{{ random 1 100 }}` - integer in [min, max)
//! - `{{ randomString 10 }}` - n alphanumeric characters
//! - `{{ randomNum 6 }}` - n decimal digits
//! - `{{ date "YMD" }}` - wall-clock time (YMD, HMS, else yyyyMMdd-HHmmss)
//! - `{{ randomDate "YMD" }}` - uniform over [epoch floor, now)
//! - `{{ UUID }}` - identifier computed once per job, stable across calls
//! - `{{ escape "a b" }}` - URL query-escape
//! - `{{ getEnv "HOME" }}` - environment variable lookup
//!
//! Rendering is concurrency-safe: the per-job RNG sits behind a mutex so
//! helper calls may come from any worker.

use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use regex::Regex;
use std::sync::{Mutex, OnceLock};
use uuid::Builder;

use crate::constants::RANDOM_DATE_EPOCH_FLOOR;
use crate::errors::{BarrageError, Result};

const LETTER_BYTES: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";
const NUM_BYTES: &[u8] = b"0123456789";

static EXPRESSION: OnceLock<Regex> = OnceLock::new();

fn expression_regex() -> &'static Regex {
    EXPRESSION.get_or_init(|| Regex::new(r"\{\{([^{}]*)\}\}").expect("Invalid expression regex"))
}

/// Per-job render state: one RNG seeded at job start and the job-stable
/// identifier exposed by the `UUID` helper.
#[derive(Debug)]
pub struct RenderContext {
    rng: Mutex<StdRng>,
    job_uuid: String,
}

impl RenderContext {
    /// Seed from wall-clock entropy, once per job.
    pub fn new() -> Self {
        Self::with_seed(rand::rng().random())
    }

    /// Fixed seed; renders become reproducible byte-for-byte.
    pub fn with_seed(seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let bytes: [u8; 16] = rng.random();
        let job_uuid = Builder::from_random_bytes(bytes).into_uuid().to_string();
        Self {
            rng: Mutex::new(rng),
            job_uuid,
        }
    }

    fn with_rng<T>(&self, f: impl FnOnce(&mut StdRng) -> T) -> T {
        let mut rng = self.rng.lock().expect("render rng lock poisoned");
        f(&mut rng)
    }
}

impl Default for RenderContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Helper function names recognized inside `{{ ... }}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Helper {
    IntSum,
    Random,
    RandomString,
    RandomNum,
    Date,
    RandomDate,
    Uuid,
    Escape,
    GetEnv,
}

impl Helper {
    fn from_name(name: &str) -> Option<Self> {
        match name {
            "intSum" => Some(Helper::IntSum),
            "random" => Some(Helper::Random),
            "randomString" => Some(Helper::RandomString),
            "randomNum" => Some(Helper::RandomNum),
            "date" => Some(Helper::Date),
            "randomDate" => Some(Helper::RandomDate),
            "UUID" => Some(Helper::Uuid),
            "escape" => Some(Helper::Escape),
            "getEnv" => Some(Helper::GetEnv),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Arg {
    Int(i64),
    Str(String),
}

impl Arg {
    fn as_int(&self) -> Result<i64> {
        match self {
            Arg::Int(v) => Ok(*v),
            Arg::Str(s) => Err(BarrageError::Template(format!(
                "expected integer argument, got \"{}\"",
                s
            ))),
        }
    }

    fn as_str(&self) -> String {
        match self {
            Arg::Int(v) => v.to_string(),
            Arg::Str(s) => s.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Segment {
    Literal(String),
    Call { helper: Helper, args: Vec<Arg> },
}

/// A URL or body template, parsed once per job.
#[derive(Debug, Clone, PartialEq)]
pub struct Template {
    segments: Vec<Segment>,
}

impl Template {
    /// Parse a template string. Unknown helpers and malformed expressions
    /// are configuration errors surfaced before the job starts.
    pub fn parse(input: &str) -> Result<Self> {
        let mut segments = Vec::new();
        let mut cursor = 0;

        for caps in expression_regex().captures_iter(input) {
            let whole = caps.get(0).expect("regex match has group 0");
            if whole.start() > cursor {
                segments.push(Segment::Literal(input[cursor..whole.start()].to_string()));
            }
            segments.push(parse_call(caps[1].trim())?);
            cursor = whole.end();
        }
        if cursor < input.len() {
            segments.push(Segment::Literal(input[cursor..].to_string()));
        }

        Ok(Self { segments })
    }

    /// Render with per-invocation helper expansion.
    pub fn render(&self, ctx: &RenderContext) -> Result<String> {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Call { helper, args } => out.push_str(&eval(*helper, args, ctx)?),
            }
        }
        Ok(out)
    }
}

fn parse_call(inner: &str) -> Result<Segment> {
    let mut tokens = tokenize(inner)?;
    if tokens.is_empty() {
        return Err(BarrageError::Template("empty expression".to_string()));
    }
    let name = tokens.remove(0);
    let helper = Helper::from_name(&name)
        .ok_or_else(|| BarrageError::Template(format!("unknown helper \"{}\"", name)))?;
    let args = tokens
        .into_iter()
        .map(|token| match token.parse::<i64>() {
            Ok(v) => Arg::Int(v),
            Err(_) => Arg::Str(token),
        })
        .collect();
    Ok(Segment::Call { helper, args })
}

// Whitespace-separated tokens; double quotes group a single argument and
// are stripped.
fn tokenize(input: &str) -> Result<Vec<String>> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;

    for ch in input.chars() {
        match ch {
            '"' => {
                if in_quotes {
                    tokens.push(std::mem::take(&mut current));
                }
                in_quotes = !in_quotes;
            }
            c if c.is_whitespace() && !in_quotes => {
                if !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                }
            }
            c => current.push(c),
        }
    }
    if in_quotes {
        return Err(BarrageError::Template(format!(
            "unterminated quote in \"{}\"",
            input
        )));
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    Ok(tokens)
}

fn eval(helper: Helper, args: &[Arg], ctx: &RenderContext) -> Result<String> {
    match helper {
        Helper::IntSum => {
            let mut sum = 0i64;
            for arg in args {
                sum = sum.wrapping_add(arg.as_int()?);
            }
            Ok(sum.to_string())
        }
        Helper::Random => {
            let (min, max) = match args {
                [min, max] => (min.as_int()?, max.as_int()?),
                _ => {
                    return Err(BarrageError::Template(
                        "random expects two integer arguments".to_string(),
                    ));
                }
            };
            if max <= min {
                return Ok(min.to_string());
            }
            Ok(ctx.with_rng(|rng| rng.random_range(min..max)).to_string())
        }
        Helper::RandomString => random_n(args, ctx, LETTER_BYTES),
        Helper::RandomNum => random_n(args, ctx, NUM_BYTES),
        Helper::Date => {
            let fmt = args.first().map(Arg::as_str).unwrap_or_default();
            Ok(format_timestamp(Utc::now().timestamp(), &fmt))
        }
        Helper::RandomDate => {
            let fmt = args.first().map(Arg::as_str).unwrap_or_default();
            let now = Utc::now().timestamp();
            let ts = if now > RANDOM_DATE_EPOCH_FLOOR {
                ctx.with_rng(|rng| rng.random_range(RANDOM_DATE_EPOCH_FLOOR..now))
            } else {
                RANDOM_DATE_EPOCH_FLOOR
            };
            Ok(format_timestamp(ts, &fmt))
        }
        Helper::Uuid => Ok(ctx.job_uuid.clone()),
        Helper::Escape => {
            let raw = args.first().map(Arg::as_str).unwrap_or_default();
            Ok(url::form_urlencoded::byte_serialize(raw.as_bytes()).collect())
        }
        Helper::GetEnv => {
            let key = args.first().map(Arg::as_str).unwrap_or_default();
            Ok(std::env::var(key).unwrap_or_default())
        }
    }
}

fn random_n(args: &[Arg], ctx: &RenderContext, alphabet: &[u8]) -> Result<String> {
    let n = args
        .first()
        .map(Arg::as_int)
        .transpose()?
        .unwrap_or(0)
        .max(0) as usize;
    Ok(ctx.with_rng(|rng| {
        (0..n)
            .map(|_| alphabet[rng.random_range(0..alphabet.len())] as char)
            .collect()
    }))
}

/// `YMD` -> yyyyMMdd, `HMS` -> HHmmss, anything else -> yyyyMMdd-HHmmss.
fn format_timestamp(secs: i64, fmt: &str) -> String {
    let dt = DateTime::from_timestamp(secs, 0).unwrap_or_default();
    let spec = match fmt {
        "YMD" => "%Y%m%d",
        "HMS" => "%H%M%S",
        _ => "%Y%m%d-%H%M%S",
    };
    dt.format(spec).to_string()
}
