//! Subprocess boundary for the gradient-boosted tabular model.
//!
//! The worker is invoked as `program [args..] <command> <input> <model>`
//! where `command` is `train` or `predict`, `input` is a CSV transfer
//! artifact, and `model` is the worker-owned model file. Output is a
//! tab-delimited payload on stdout:
//!
//! ```text
//! STATUS	ok
//! METRIC	rmse	2.41
//! PRED	ROTTERDAM	40HC	2026-08-07	14.2	0.82
//! ```
//!
//! A timed-out worker is killed; partial results from a killed run are
//! never used.

use crate::core::SeriesKey;
use crate::error::{ForecastError, Result};
use crate::tabular::features::FeatureFrame;
use chrono::NaiveDate;
use std::collections::HashMap;
use std::io::{Read, Write};
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// How often the child is polled while waiting for exit.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Worker invocation mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerCommand {
    Train,
    Predict,
}

impl WorkerCommand {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkerCommand::Train => "train",
            WorkerCommand::Predict => "predict",
        }
    }
}

/// One prediction line from the worker payload.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkerPrediction {
    pub key: SeriesKey,
    pub date: NaiveDate,
    pub value: f64,
    pub confidence: f64,
}

/// Parsed worker payload.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WorkerOutcome {
    pub predictions: Vec<WorkerPrediction>,
    pub metrics: HashMap<String, f64>,
}

/// Training metrics reported back by the backend.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrainReport {
    pub metrics: HashMap<String, f64>,
}

/// Port over the tabular model execution. The subprocess adapter is the
/// production implementation; tests and future in-process models plug
/// in here without touching the combiner.
pub trait TabularBackend: Send + Sync {
    fn train(&self, frame: &FeatureFrame) -> Result<TrainReport>;
    fn predict(&self, frame: &FeatureFrame) -> Result<Vec<WorkerPrediction>>;
}

/// Configuration for the worker subprocess.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Worker executable (e.g. an interpreter).
    pub program: PathBuf,
    /// Arguments placed before the command triple (e.g. a script path).
    pub args: Vec<String>,
    /// Model artifact path owned by the worker.
    pub model_path: PathBuf,
    pub train_timeout: Duration,
    pub predict_timeout: Duration,
}

impl WorkerConfig {
    pub fn new(program: impl Into<PathBuf>, model_path: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            model_path: model_path.into(),
            train_timeout: Duration::from_secs(300),
            predict_timeout: Duration::from_secs(45),
        }
    }

    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }
}

/// Subprocess-backed implementation of [`TabularBackend`].
#[derive(Debug, Clone)]
pub struct SubprocessBackend {
    config: WorkerConfig,
}

impl SubprocessBackend {
    pub fn new(config: WorkerConfig) -> Self {
        Self { config }
    }

    fn invoke(
        &self,
        command: WorkerCommand,
        frame: &FeatureFrame,
        timeout: Duration,
    ) -> Result<WorkerOutcome> {
        let mut input = tempfile::Builder::new()
            .prefix("depot-features-")
            .suffix(".csv")
            .tempfile()
            .map_err(|e| ForecastError::ExternalProcess(format!("transfer file: {e}")))?;
        input
            .write_all(frame.to_csv().as_bytes())
            .map_err(|e| ForecastError::ExternalProcess(format!("transfer file: {e}")))?;

        debug!(
            command = command.as_str(),
            rows = frame.len(),
            program = %self.config.program.display(),
            "invoking tabular worker"
        );

        let mut child = Command::new(&self.config.program)
            .args(&self.config.args)
            .arg(command.as_str())
            .arg(input.path())
            .arg(&self.config.model_path)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| ForecastError::ExternalProcess(format!("spawn failed: {e}")))?;

        // Drain stdout on a separate thread so a chatty worker cannot
        // deadlock on a full pipe while we poll for exit.
        let mut stdout_pipe = child.stdout.take().ok_or_else(|| {
            let _ = child.kill();
            ForecastError::ExternalProcess("worker stdout unavailable".to_string())
        })?;
        let reader = std::thread::spawn(move || {
            let mut buf = String::new();
            let _ = stdout_pipe.read_to_string(&mut buf);
            buf
        });

        let started = Instant::now();
        let status = loop {
            match child.try_wait() {
                Ok(Some(status)) => break status,
                Ok(None) => {
                    if started.elapsed() > timeout {
                        warn!(command = command.as_str(), "worker timed out, killing");
                        let _ = child.kill();
                        let _ = child.wait();
                        let _ = reader.join();
                        return Err(ForecastError::ExternalProcess(format!(
                            "worker timed out after {}s",
                            timeout.as_secs()
                        )));
                    }
                    std::thread::sleep(POLL_INTERVAL);
                }
                Err(e) => {
                    let _ = child.kill();
                    let _ = reader.join();
                    return Err(ForecastError::ExternalProcess(format!("wait failed: {e}")));
                }
            }
        };

        let stdout = reader
            .join()
            .map_err(|_| ForecastError::ExternalProcess("stdout reader panicked".to_string()))?;

        if !status.success() {
            return Err(ForecastError::ExternalProcess(format!(
                "worker exited with {status}"
            )));
        }

        parse_payload(&stdout)
    }
}

impl TabularBackend for SubprocessBackend {
    fn train(&self, frame: &FeatureFrame) -> Result<TrainReport> {
        let outcome = self.invoke(WorkerCommand::Train, frame, self.config.train_timeout)?;
        Ok(TrainReport {
            metrics: outcome.metrics,
        })
    }

    fn predict(&self, frame: &FeatureFrame) -> Result<Vec<WorkerPrediction>> {
        let outcome = self.invoke(WorkerCommand::Predict, frame, self.config.predict_timeout)?;
        Ok(outcome.predictions)
    }
}

/// Parse the worker's tab-delimited payload. Any structural problem is
/// an `ExternalProcess` error; nothing is swallowed.
pub fn parse_payload(text: &str) -> Result<WorkerOutcome> {
    let mut status: Option<&str> = None;
    let mut error_message: Option<String> = None;
    let mut outcome = WorkerOutcome::default();

    for (line_no, line) in text.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let fields: Vec<&str> = line.split('\t').collect();
        let malformed = |what: &str| {
            ForecastError::ExternalProcess(format!(
                "malformed worker payload at line {}: {}",
                line_no + 1,
                what
            ))
        };

        match fields[0] {
            "STATUS" => {
                status = Some(fields.get(1).copied().ok_or_else(|| malformed("STATUS"))?);
            }
            "ERROR" => {
                error_message = Some(fields[1..].join("\t"));
            }
            "METRIC" => {
                if fields.len() != 3 {
                    return Err(malformed("METRIC arity"));
                }
                let value: f64 = fields[2].parse().map_err(|_| malformed("METRIC value"))?;
                outcome.metrics.insert(fields[1].to_string(), value);
            }
            "PRED" => {
                if fields.len() != 6 {
                    return Err(malformed("PRED arity"));
                }
                let date = fields[3]
                    .parse::<NaiveDate>()
                    .map_err(|_| malformed("PRED date"))?;
                let value: f64 = fields[4].parse().map_err(|_| malformed("PRED value"))?;
                let confidence: f64 =
                    fields[5].parse().map_err(|_| malformed("PRED confidence"))?;
                outcome.predictions.push(WorkerPrediction {
                    key: SeriesKey::new(fields[1], fields[2]),
                    date,
                    value: value.max(0.0),
                    confidence: confidence.clamp(0.0, 1.0),
                });
            }
            other => return Err(malformed(&format!("unknown tag '{other}'"))),
        }
    }

    match status {
        Some("ok") => Ok(outcome),
        Some("error") => Err(ForecastError::ExternalProcess(
            error_message.unwrap_or_else(|| "worker reported an error".to_string()),
        )),
        Some(other) => Err(ForecastError::ExternalProcess(format!(
            "unknown worker status '{other}'"
        ))),
        None => Err(ForecastError::ExternalProcess(
            "worker payload missing STATUS line".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_predictions_and_metrics() {
        let payload = "STATUS\tok\nMETRIC\trmse\t2.5\nPRED\tROTTERDAM\t40HC\t2026-08-07\t14.2\t0.82\n";
        let outcome = parse_payload(payload).unwrap();
        assert_eq!(outcome.metrics["rmse"], 2.5);
        assert_eq!(outcome.predictions.len(), 1);
        let p = &outcome.predictions[0];
        assert_eq!(p.key, SeriesKey::new("ROTTERDAM", "40HC"));
        assert_eq!(p.date, NaiveDate::from_ymd_opt(2026, 8, 7).unwrap());
        assert_eq!(p.value, 14.2);
        assert_eq!(p.confidence, 0.82);
    }

    #[test]
    fn error_status_carries_the_message() {
        let payload = "STATUS\terror\nERROR\tmodel file missing\n";
        let err = parse_payload(payload).unwrap_err();
        assert_eq!(
            err,
            ForecastError::ExternalProcess("model file missing".to_string())
        );
    }

    #[test]
    fn missing_status_is_malformed() {
        let err = parse_payload("PRED\tA\tB\t2026-01-01\t1.0\t0.5\n").unwrap_err();
        assert!(matches!(err, ForecastError::ExternalProcess(_)));
    }

    #[test]
    fn bad_arity_and_bad_numbers_are_malformed() {
        assert!(parse_payload("STATUS\tok\nPRED\tA\tB\t2026-01-01\t1.0\n").is_err());
        assert!(parse_payload("STATUS\tok\nMETRIC\trmse\tNaNope\n").is_err());
        assert!(parse_payload("STATUS\tok\nWHAT\t1\n").is_err());
    }

    #[test]
    fn values_are_clamped_into_domain() {
        let payload = "STATUS\tok\nPRED\tA\tB\t2026-01-01\t-3.0\t1.7\n";
        let outcome = parse_payload(payload).unwrap();
        assert_eq!(outcome.predictions[0].value, 0.0);
        assert_eq!(outcome.predictions[0].confidence, 1.0);
    }

    #[test]
    fn timed_out_worker_is_killed() {
        let config = WorkerConfig {
            program: PathBuf::from("/bin/sh"),
            args: vec!["-c".to_string(), "sleep 30".to_string()],
            model_path: PathBuf::from("/tmp/none"),
            train_timeout: Duration::from_millis(200),
            predict_timeout: Duration::from_millis(200),
        };
        let backend = SubprocessBackend::new(config);
        let started = Instant::now();
        let err = backend.predict(&FeatureFrame::default()).unwrap_err();
        assert!(matches!(err, ForecastError::ExternalProcess(_)));
        // The kill happened promptly rather than after the sleep.
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn nonzero_exit_is_an_error() {
        let config = WorkerConfig::new("/bin/false", "/tmp/none");
        let backend = SubprocessBackend::new(config);
        let err = backend.predict(&FeatureFrame::default()).unwrap_err();
        assert!(matches!(err, ForecastError::ExternalProcess(_)));
    }
}
