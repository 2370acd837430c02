//! Configuration validation logic

use super::{Config, RunMode};
use crate::constants::MAX_WORKERS_LIMIT;
use crate::errors::{BarrageError, Result};
use crate::job::HttpType;

/// Validate the configuration before anything starts.
pub fn validate(config: &Config) -> Result<()> {
    if config.example {
        return Ok(());
    }
    validate_load(config)?;
    validate_request(config)?;
    validate_output(config)?;
    Ok(())
}

fn validate_load(config: &Config) -> Result<()> {
    if config.c == 0 {
        return Err(BarrageError::config("Concurrency cannot be smaller than 1"));
    }
    if config.c > MAX_WORKERS_LIMIT {
        return Err(BarrageError::config(format!(
            "Concurrency cannot exceed {}",
            MAX_WORKERS_LIMIT
        )));
    }
    if config.n > 0 && config.n < config.c {
        return Err(BarrageError::config(
            "Total requests cannot be smaller than the concurrency level",
        ));
    }
    if config.timeout_ms == 0 {
        return Err(BarrageError::config("Timeout must be greater than 0"));
    }
    if config.mode == RunMode::Bench && config.urls.is_empty() {
        return Err(BarrageError::config("url or url-file empty"));
    }
    Ok(())
}

fn validate_request(config: &Config) -> Result<()> {
    reqwest::Method::from_bytes(config.method.as_bytes())
        .map_err(|_| BarrageError::config(format!("Invalid method '{}'", config.method)))?;

    if config.http_type == HttpType::Http3 && !cfg!(feature = "http3") {
        return Err(BarrageError::config(
            "HTTP/3 support is not compiled in; rebuild with \
             RUSTFLAGS=\"--cfg reqwest_unstable\" and --features http3",
        ));
    }
    Ok(())
}

fn validate_output(config: &Config) -> Result<()> {
    match config.output.as_str() {
        "" | "csv" => {}
        other => {
            return Err(BarrageError::config(format!(
                "Invalid output type '{}'; only csv is supported",
                other
            )));
        }
    }
    if config.verbose > 3 {
        return Err(BarrageError::config(
            "Verbose level must be between 0 and 3",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn test_config() -> Config {
        Config {
            mode: RunMode::Bench,
            urls: vec!["http://127.0.0.1/".to_string()],
            peers: Vec::new(),
            proxy: None,
            n: 100,
            c: 10,
            qps: 0,
            duration_secs: 10,
            timeout_ms: 3000,
            method: "GET".to_string(),
            body: String::new(),
            script_body: String::new(),
            http_type: HttpType::Http1,
            headers: HashMap::new(),
            auth_username: String::new(),
            auth_password: String::new(),
            disable_compression: false,
            disable_keepalives: false,
            output: String::new(),
            verbose: 3,
            cpus: None,
            example: false,
        }
    }

    #[test]
    fn valid_config_passes() {
        assert!(validate(&test_config()).is_ok());
    }

    #[test]
    fn zero_concurrency_is_rejected() {
        let mut config = test_config();
        config.c = 0;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn n_below_c_is_rejected() {
        let mut config = test_config();
        config.n = 5;
        config.c = 10;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn unbounded_n_is_fine_with_any_c() {
        let mut config = test_config();
        config.n = 0;
        config.c = 500;
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn bench_mode_needs_a_url() {
        let mut config = test_config();
        config.urls.clear();
        assert!(validate(&config).is_err());

        config.mode = RunMode::Worker("127.0.0.1:12710".to_string());
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn only_csv_output_is_accepted() {
        let mut config = test_config();
        config.output = "csv".to_string();
        assert!(validate(&config).is_ok());
        config.output = "json".to_string();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn example_skips_validation() {
        let mut config = test_config();
        config.example = true;
        config.urls.clear();
        config.c = 0;
        assert!(validate(&config).is_ok());
    }
}
