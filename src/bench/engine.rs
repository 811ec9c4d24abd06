//! Benchmark runner: warmup, timed measurement loop, reduction.

use std::convert::Infallible;
use std::future::Future;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use futures::FutureExt;
use serde::{Deserialize, Serialize};

use super::error::BenchError;
use super::stats;

/// Upper bound on the sample buffer reserved up front.
const MAX_PREALLOCATED_SAMPLES: usize = 65_536;

/// Benchmark run parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct BenchOptions {
    /// Number of measured invocations to collect.
    pub iterations: usize,
    /// Untimed invocations before measurement starts.
    pub warmup: usize,
    /// Time budget for the measurement phase.
    pub timeout: Duration,
    /// Confidence level for the interval, exclusive `(0, 1)`.
    pub confidence: f64,
}

impl Default for BenchOptions {
    fn default() -> Self {
        Self {
            iterations: 1000,
            warmup: 10,
            timeout: Duration::from_secs(5),
            confidence: 0.95,
        }
    }
}

impl BenchOptions {
    /// Reject options that cannot produce a meaningful run.
    pub fn validate(&self) -> Result<(), BenchError> {
        if self.iterations == 0 {
            return Err(BenchError::ZeroIterations);
        }
        if !(self.confidence > 0.0 && self.confidence < 1.0) {
            return Err(BenchError::InvalidConfidence(self.confidence));
        }
        Ok(())
    }
}

/// Confidence interval around the mean latency.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceInterval {
    pub lower: f64,
    pub upper: f64,
}

/// Immutable snapshot of one benchmark run. Latencies are milliseconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BenchmarkMetrics {
    pub mean_latency: f64,
    pub median_latency: f64,
    pub p95_latency: f64,
    pub std_dev: f64,
    pub ops_per_second: f64,
    pub confidence_interval: ConfidenceInterval,
    /// Samples actually collected. Zero means "no data", not failure.
    pub samples: usize,
    pub timestamp: DateTime<Utc>,
    pub timed_out: bool,
}

impl BenchmarkMetrics {
    /// All-zero metrics for a run that collected nothing.
    pub fn empty(timed_out: bool) -> Self {
        Self {
            mean_latency: 0.0,
            median_latency: 0.0,
            p95_latency: 0.0,
            std_dev: 0.0,
            ops_per_second: 0.0,
            confidence_interval: ConfidenceInterval::default(),
            samples: 0,
            timestamp: Utc::now(),
            timed_out,
        }
    }

    /// Build metrics from raw millisecond samples.
    pub fn from_samples(samples: &[f64], confidence: f64, timed_out: bool) -> Self {
        let Some(r) = stats::reduce(samples, confidence) else {
            return Self::empty(timed_out);
        };
        let n = samples.len();
        let ops_per_second = if r.mean > 0.0 {
            n as f64 / (r.mean / 1000.0)
        } else {
            0.0
        };
        Self {
            mean_latency: r.mean,
            median_latency: r.median,
            p95_latency: r.p95,
            std_dev: r.std_dev,
            ops_per_second,
            confidence_interval: ConfidenceInterval {
                lower: r.ci_lower,
                upper: r.ci_upper,
            },
            samples: n,
            timestamp: Utc::now(),
            timed_out,
        }
    }
}

/// Stateless benchmark driver.
pub struct BenchEngine;

impl BenchEngine {
    /// Benchmark an async candidate.
    ///
    /// Each sample times one awaited invocation. The measurement loop stops
    /// once `iterations` samples exist or the time budget is spent.
    pub async fn run<F, Fut>(mut candidate: F, options: &BenchOptions) -> Result<BenchmarkMetrics, BenchError>
    where
        F: FnMut() -> Fut,
        Fut: Future,
    {
        let (metrics, _) = Self::try_run(|| candidate().map(Ok::<_, Infallible>), options).await?;
        Ok(metrics)
    }

    /// Benchmark a fallible async candidate.
    ///
    /// The first `Err`, in warmup or measurement, stops the run. The failed
    /// invocation is not sampled; metrics cover the samples taken before it.
    pub async fn try_run<F, Fut, T, E>(
        mut candidate: F,
        options: &BenchOptions,
    ) -> Result<(BenchmarkMetrics, Option<E>), BenchError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        options.validate()?;

        for _ in 0..options.warmup {
            if let Err(e) = candidate().await {
                return Ok((BenchmarkMetrics::empty(false), Some(e)));
            }
        }

        let mut samples = Vec::with_capacity(options.iterations.min(MAX_PREALLOCATED_SAMPLES));
        let started = Instant::now();
        let mut timed_out = false;
        let mut error = None;

        while samples.len() < options.iterations {
            if started.elapsed() >= options.timeout {
                timed_out = true;
                break;
            }
            let t = Instant::now();
            let outcome = candidate().await;
            let ms = t.elapsed().as_secs_f64() * 1000.0;
            match outcome {
                Ok(value) => {
                    std::hint::black_box(value);
                    samples.push(ms);
                }
                Err(e) => {
                    error = Some(e);
                    break;
                }
            }
        }

        tracing::debug!(
            samples = samples.len(),
            iterations = options.iterations,
            timed_out,
            failed = error.is_some(),
            "benchmark measurement finished"
        );
        Ok((BenchmarkMetrics::from_samples(&samples, options.confidence, timed_out), error))
    }

    /// Benchmark a synchronous candidate on the current thread.
    pub fn run_blocking<F, T>(mut candidate: F, options: &BenchOptions) -> Result<BenchmarkMetrics, BenchError>
    where
        F: FnMut() -> T,
    {
        options.validate()?;

        for _ in 0..options.warmup {
            std::hint::black_box(candidate());
        }

        let mut samples = Vec::with_capacity(options.iterations.min(MAX_PREALLOCATED_SAMPLES));
        let started = Instant::now();
        let mut timed_out = false;

        while samples.len() < options.iterations {
            if started.elapsed() >= options.timeout {
                timed_out = true;
                break;
            }
            let t = Instant::now();
            std::hint::black_box(candidate());
            samples.push(t.elapsed().as_secs_f64() * 1000.0);
        }

        Ok(BenchmarkMetrics::from_samples(&samples, options.confidence, timed_out))
    }
}
