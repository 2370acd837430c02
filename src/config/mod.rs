//! Configuration for the barrage load generator
//!
//! Layered the usual way: raw CLI arguments are parsed by `parser`, shaped
//! into [`Config`] here, then checked by `validation`. The config is the
//! factory for the [`JobDescriptor`]s the engine actually runs.

pub mod loader;
pub mod parser;
pub mod validation;

use std::collections::HashMap;
use url::Url;

use crate::errors::{BarrageError, Result};
use crate::job::{Command, HttpType, JobDescriptor};

/// How this process runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunMode {
    /// Drive jobs from the CLI (optionally fanning out to peers).
    Bench,
    /// Serve the control endpoint for a coordinator.
    Worker(String),
    /// Serve the dashboard UI plus the JSON API.
    Dashboard(String),
}

/// Validated process configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub mode: RunMode,
    pub urls: Vec<String>,
    pub peers: Vec<String>,
    pub proxy: Option<Url>,
    pub n: u64,
    pub c: u64,
    pub qps: u64,
    pub duration_secs: u64,
    pub timeout_ms: u64,
    pub method: String,
    pub body: String,
    pub script_body: String,
    pub http_type: HttpType,
    pub headers: HashMap<String, Vec<String>>,
    pub auth_username: String,
    pub auth_password: String,
    pub disable_compression: bool,
    pub disable_keepalives: bool,
    pub output: String,
    pub verbose: u8,
    pub cpus: Option<usize>,
    pub example: bool,
}

impl Config {
    /// Parse and validate configuration from command line arguments.
    pub fn from_args() -> Result<Self> {
        let raw = parser::parse_raw()?;
        let config: Config = raw.try_into()?;
        validation::validate(&config)?;
        Ok(config)
    }

    /// Build the descriptor for one job against `url`.
    pub fn to_descriptor(&self, url: &str, sequence_id: i64) -> JobDescriptor {
        JobDescriptor {
            sequence_id,
            cmd: Command::Start,
            request_method: self.method.clone(),
            request_body: self.body.clone(),
            request_script_body: self.script_body.clone(),
            request_http_type: self.http_type,
            n: self.n,
            c: self.c,
            duration: self.duration_secs,
            timeout_ms: self.timeout_ms,
            qps: self.qps,
            disable_compression: self.disable_compression,
            disable_keepalives: self.disable_keepalives,
            auth_username: self.auth_username.clone(),
            auth_password: self.auth_password.clone(),
            headers: self.headers.clone(),
            url: url.to_string(),
            output: self.output.clone(),
        }
    }
}

impl TryFrom<parser::RawArgs> for Config {
    type Error = BarrageError;

    fn try_from(raw: parser::RawArgs) -> Result<Self> {
        let duration_secs = parser::parse_duration_secs(&raw.duration)?;

        let urls = if let Some(path) = &raw.url_file {
            loader::load_urls(path)?
        } else {
            raw.url
                .clone()
                .or(raw.positional_url.clone())
                .into_iter()
                .collect()
        };

        let body = if let Some(path) = &raw.body_file {
            loader::load_text(path)?
        } else {
            raw.body.clone()
        };

        let script_body = match &raw.script {
            Some(path) => loader::load_text(path)?,
            None => String::new(),
        };

        let mut headers: HashMap<String, Vec<String>> = HashMap::new();
        for line in &raw.headers {
            let (name, value) = parser::parse_header(line)?;
            headers.entry(name).or_default().push(value);
        }

        let (auth_username, auth_password) = match &raw.auth {
            Some(input) => parser::parse_auth(input)?,
            None => (String::new(), String::new()),
        };

        let proxy = match &raw.proxy {
            Some(addr) => Some(Url::parse(addr)?),
            None => None,
        };

        let mode = if let Some(addr) = &raw.listen {
            RunMode::Worker(addr.clone())
        } else if let Some(addr) = &raw.dashboard {
            RunMode::Dashboard(addr.clone())
        } else {
            RunMode::Bench
        };

        Ok(Config {
            mode,
            urls,
            peers: raw.workers.clone(),
            proxy,
            n: raw.requests,
            c: raw.concurrency,
            qps: raw.qps,
            duration_secs,
            timeout_ms: raw.timeout_ms,
            method: raw.method.to_uppercase(),
            body,
            script_body,
            http_type: raw.http_type.into(),
            headers,
            auth_username,
            auth_password,
            disable_compression: raw.disable_compression,
            disable_keepalives: raw.disable_keepalives,
            output: raw.output.clone(),
            verbose: raw.verbose,
            cpus: raw.cpus,
            example: raw.example,
        })
    }
}
