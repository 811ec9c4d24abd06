//! Engine configuration loading from environment variables.
//!
//! All configuration values are loaded from `QUIVER_*` environment variables
//! with sensible defaults. Invalid values fall back to defaults without crashing.
//!
//! # Environment Variables
//!
//! | Variable | Default | Description |
//! |---|---|---|
//! | `QUIVER_FILE_TIMEOUT_MS` | 300000 | Hard bound per test file |
//! | `QUIVER_TEST_TIMEOUT_MS` | 300000 | Default bound per test or hook |
//! | `QUIVER_MAX_CONCURRENCY` | 0 | Files executing at once (0 = unbounded) |
//! | `QUIVER_BENCH_ITERATIONS` | 1000 | Default benchmark iterations |
//! | `QUIVER_BENCH_WARMUP` | 10 | Default warmup invocations |
//! | `QUIVER_BENCH_TIMEOUT_MS` | 5000 | Default benchmark time budget |
//! | `QUIVER_BENCH_CONFIDENCE` | 0.95 | Default confidence level |
//! | `QUIVER_REPLAY_LOGS` | false | Replay captured logs to stderr |
//! | `QUIVER_LOG_LEVEL` | info | Tracing filter directive |
//! | `QUIVER_LOG_FORMAT` | pretty | `json` or `pretty` |

use std::num::NonZeroUsize;
use std::time::Duration;

use serde::Serialize;

use crate::bench::BenchOptions;
use crate::execution::RunOptions;
use crate::pool::PoolConfig;
use crate::telemetry::{LogConfig, LogFormat};

/// Effective engine configuration summary (serializable).
#[derive(Debug, Clone, Serialize)]
pub struct EffectiveConfig {
    pub file_timeout_ms: u64,
    pub test_timeout_ms: u64,
    pub max_concurrency: usize,
    pub bench_iterations: usize,
    pub bench_warmup: usize,
    pub bench_timeout_ms: u64,
    pub bench_confidence: f64,
    pub replay_logs: bool,
    pub log_level: String,
    pub log_format: &'static str,
}

/// All engine configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct EnvConfig {
    pub run: RunOptions,
    pub max_concurrency: Option<NonZeroUsize>,
    pub replay_logs: bool,
    pub logging: LogConfig,
}

/// Parse a `usize` env var, returning `default` on missing or invalid.
fn parse_usize(key: &str, default: usize) -> usize {
    match std::env::var(key) {
        Ok(val) => val.trim().parse::<usize>().unwrap_or(default),
        Err(_) => default,
    }
}

/// Parse a `u64` env var, returning `default` on missing or invalid.
fn parse_u64(key: &str, default: u64) -> u64 {
    match std::env::var(key) {
        Ok(val) => val.trim().parse::<u64>().unwrap_or(default),
        Err(_) => default,
    }
}

/// Parse an `f64` env var, returning `default` on missing or invalid.
fn parse_f64(key: &str, default: f64) -> f64 {
    match std::env::var(key) {
        Ok(val) => val.trim().parse::<f64>().unwrap_or(default),
        Err(_) => default,
    }
}

/// Parse a boolean env var (`1/true/yes/on`, `0/false/no/off`).
fn parse_bool(key: &str, default: bool) -> bool {
    match std::env::var(key) {
        Ok(val) => match val.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => true,
            "0" | "false" | "no" | "off" => false,
            _ => default,
        },
        Err(_) => default,
    }
}

/// Load benchmark defaults from environment.
fn load_bench_options() -> BenchOptions {
    let defaults = BenchOptions::default();
    let iterations = parse_usize("QUIVER_BENCH_ITERATIONS", defaults.iterations).max(1);
    let warmup = parse_usize("QUIVER_BENCH_WARMUP", defaults.warmup);
    let timeout_ms = parse_u64("QUIVER_BENCH_TIMEOUT_MS", 5000).max(1);
    let confidence = parse_f64("QUIVER_BENCH_CONFIDENCE", defaults.confidence);
    // Outside (0, 1) would fail validation at run time.
    let confidence = if confidence > 0.0 && confidence < 1.0 {
        confidence
    } else {
        defaults.confidence
    };
    BenchOptions {
        iterations,
        warmup,
        timeout: Duration::from_millis(timeout_ms),
        confidence,
    }
}

/// Load per-file and per-test bounds from environment.
fn load_run_options() -> RunOptions {
    let file_ms = parse_u64("QUIVER_FILE_TIMEOUT_MS", 300_000).max(1);
    let test_ms = parse_u64("QUIVER_TEST_TIMEOUT_MS", 300_000).max(1);
    RunOptions {
        file_timeout: Duration::from_millis(file_ms),
        test_timeout: Duration::from_millis(test_ms),
        bench: load_bench_options(),
    }
}

/// Load logging configuration from environment.
fn load_log_config() -> LogConfig {
    let level = std::env::var("QUIVER_LOG_LEVEL")
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| "info".to_string());
    let format = std::env::var("QUIVER_LOG_FORMAT")
        .ok()
        .and_then(|v| v.parse::<LogFormat>().ok())
        .unwrap_or_default();
    LogConfig {
        format,
        level,
        output_path: None,
    }
}

/// Load all configuration from environment variables.
///
/// Missing or invalid values fall back to safe defaults without panicking.
pub fn load() -> EnvConfig {
    EnvConfig {
        run: load_run_options(),
        max_concurrency: NonZeroUsize::new(parse_usize("QUIVER_MAX_CONCURRENCY", 0)),
        replay_logs: parse_bool("QUIVER_REPLAY_LOGS", false),
        logging: load_log_config(),
    }
}

impl EnvConfig {
    pub fn pool_config(&self) -> PoolConfig {
        PoolConfig {
            run: self.run.clone(),
            max_concurrency: self.max_concurrency,
            replay_logs: self.replay_logs,
        }
    }

    /// Return a serializable summary of all effective values.
    pub fn effective_config(&self) -> EffectiveConfig {
        EffectiveConfig {
            file_timeout_ms: self.run.file_timeout.as_millis() as u64,
            test_timeout_ms: self.run.test_timeout.as_millis() as u64,
            max_concurrency: self.max_concurrency.map_or(0, NonZeroUsize::get),
            bench_iterations: self.run.bench.iterations,
            bench_warmup: self.run.bench.warmup,
            bench_timeout_ms: self.run.bench.timeout.as_millis() as u64,
            bench_confidence: self.run.bench.confidence,
            replay_logs: self.replay_logs,
            log_level: self.logging.level.clone(),
            log_format: match self.logging.format {
                LogFormat::Json => "json",
                LogFormat::Pretty => "pretty",
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // Serialize env-mutating tests to avoid cross-test pollution.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    const ENV_KEYS: &[&str] = &[
        "QUIVER_FILE_TIMEOUT_MS",
        "QUIVER_TEST_TIMEOUT_MS",
        "QUIVER_MAX_CONCURRENCY",
        "QUIVER_BENCH_ITERATIONS",
        "QUIVER_BENCH_WARMUP",
        "QUIVER_BENCH_TIMEOUT_MS",
        "QUIVER_BENCH_CONFIDENCE",
        "QUIVER_REPLAY_LOGS",
        "QUIVER_LOG_LEVEL",
        "QUIVER_LOG_FORMAT",
    ];

    fn clear_env_vars() {
        for k in ENV_KEYS {
            std::env::remove_var(k);
        }
    }

    #[test]
    fn test_defaults_are_sensible() {
        let _lock = ENV_LOCK.lock().unwrap();
        clear_env_vars();
        let cfg = load();
        assert_eq!(cfg.run.file_timeout, Duration::from_secs(300));
        assert_eq!(cfg.run.test_timeout, Duration::from_secs(300));
        assert_eq!(cfg.max_concurrency, None);
        assert_eq!(cfg.run.bench, BenchOptions::default());
        assert!(!cfg.replay_logs);
        assert_eq!(cfg.logging.level, "info");
        assert_eq!(cfg.logging.format, LogFormat::Pretty);
    }

    #[test]
    fn test_env_vars_override_defaults() {
        let _lock = ENV_LOCK.lock().unwrap();
        clear_env_vars();
        std::env::set_var("QUIVER_FILE_TIMEOUT_MS", "1500");
        std::env::set_var("QUIVER_MAX_CONCURRENCY", "4");
        std::env::set_var("QUIVER_BENCH_ITERATIONS", "50");
        std::env::set_var("QUIVER_BENCH_CONFIDENCE", "0.99");
        std::env::set_var("QUIVER_REPLAY_LOGS", "yes");
        std::env::set_var("QUIVER_LOG_FORMAT", "json");
        let cfg = load();
        assert_eq!(cfg.run.file_timeout, Duration::from_millis(1500));
        assert_eq!(cfg.max_concurrency.map(NonZeroUsize::get), Some(4));
        assert_eq!(cfg.run.bench.iterations, 50);
        assert_eq!(cfg.run.bench.confidence, 0.99);
        assert!(cfg.replay_logs);
        assert_eq!(cfg.logging.format, LogFormat::Json);
        assert_eq!(cfg.pool_config().max_concurrency, cfg.max_concurrency);
        clear_env_vars();
    }

    #[test]
    fn test_invalid_env_falls_back_to_default() {
        let _lock = ENV_LOCK.lock().unwrap();
        clear_env_vars();
        std::env::set_var("QUIVER_FILE_TIMEOUT_MS", "soon");
        std::env::set_var("QUIVER_BENCH_CONFIDENCE", "1.5");
        std::env::set_var("QUIVER_REPLAY_LOGS", "maybe");
        std::env::set_var("QUIVER_LOG_FORMAT", "xml");
        let cfg = load();
        assert_eq!(cfg.run.file_timeout, Duration::from_secs(300));
        assert_eq!(cfg.run.bench.confidence, 0.95);
        assert!(!cfg.replay_logs);
        assert_eq!(cfg.logging.format, LogFormat::Pretty);
        clear_env_vars();
    }

    #[test]
    fn test_floors_applied() {
        let _lock = ENV_LOCK.lock().unwrap();
        clear_env_vars();
        std::env::set_var("QUIVER_BENCH_ITERATIONS", "0");
        std::env::set_var("QUIVER_TEST_TIMEOUT_MS", "0");
        let cfg = load();
        assert_eq!(cfg.run.bench.iterations, 1, "iterations must have a floor");
        assert!(cfg.run.test_timeout > Duration::ZERO);
        assert!(cfg.run.bench.validate().is_ok());
        clear_env_vars();
    }

    #[test]
    fn test_effective_config_serializes() {
        let _lock = ENV_LOCK.lock().unwrap();
        clear_env_vars();
        let eff = load().effective_config();
        let json = serde_json::to_value(&eff).unwrap();
        assert_eq!(json["file_timeout_ms"], 300_000);
        assert_eq!(json["max_concurrency"], 0);
        assert_eq!(json["bench_iterations"], 1000);
        assert_eq!(json["log_format"], "pretty");
    }
}
