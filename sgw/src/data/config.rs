use super::MessageClass;
use anyhow::{Result, ensure};
use serde::Deserialize;
use slog::{Logger, error, info};
use std::fs;
use std::net::IpAddr;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    // The S1-U IP address.  GTP-U is served on this address.
    pub ip_addr: IpAddr,

    // Human readable gateway name, used in logs.
    pub name: Option<String>,

    // Downlink packet aggregation tuning.
    pub aggregation: AggregationConfig,
}

/// Tuning of the per destination, per message class aggregation queues.  Lengths are in packets and
/// wait times in milliseconds.  Both are fractional, as are the steps by which they adapt.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AggregationConfig {
    pub initial_max_length: f64,
    pub initial_wait_time_ms: f64,
    pub max_queue_length: f64,
    pub min_queue_length: f64,
    pub max_wait_time_ms: f64,
    pub min_wait_time_ms: f64,
    pub increase_step: f64,
    pub decrease_step: f64,

    // Number of consecutive flushes of the same kind before the thresholds move.
    pub adapt_after: u32,

    #[serde(rename = "class")]
    pub classes: Vec<ClassConfig>,
}

/// Overrides the starting thresholds for one message class.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClassConfig {
    pub message_class: u8,
    pub initial_max_length: Option<f64>,
    pub initial_wait_time_ms: Option<f64>,
}

impl Default for AggregationConfig {
    fn default() -> Self {
        AggregationConfig {
            initial_max_length: 5.0,
            initial_wait_time_ms: 5.0,
            max_queue_length: 10.0,
            min_queue_length: 1.0,
            max_wait_time_ms: 5.0,
            min_wait_time_ms: 0.0,
            increase_step: 1.25,
            decrease_step: 0.8,
            adapt_after: 3,
            classes: vec![],
        }
    }
}

/// The resolved settings that a single queue is created with.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QueueParams {
    pub initial_max_length: f64,
    pub initial_wait_time_ms: f64,
    pub max_queue_length: f64,
    pub min_queue_length: f64,
    pub max_wait_time_ms: f64,
    pub min_wait_time_ms: f64,
    pub increase_step: f64,
    pub decrease_step: f64,
    pub adapt_after: u32,
}

impl AggregationConfig {
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("initial_max_length", self.initial_max_length),
            ("initial_wait_time_ms", self.initial_wait_time_ms),
            ("max_queue_length", self.max_queue_length),
            ("min_queue_length", self.min_queue_length),
            ("max_wait_time_ms", self.max_wait_time_ms),
            ("min_wait_time_ms", self.min_wait_time_ms),
            ("increase_step", self.increase_step),
            ("decrease_step", self.decrease_step),
        ] {
            ensure!(
                value.is_finite() && value >= 0.0,
                "{name} must be a non-negative number, got {value}"
            );
        }
        ensure!(
            self.min_queue_length >= 1.0,
            "min_queue_length must be at least 1"
        );
        ensure!(
            self.min_queue_length <= self.max_queue_length,
            "min_queue_length is greater than max_queue_length"
        );
        ensure!(
            self.min_wait_time_ms <= self.max_wait_time_ms,
            "min_wait_time_ms is greater than max_wait_time_ms"
        );
        ensure!(self.adapt_after >= 1, "adapt_after must be at least 1");

        self.check_initial_values(
            "default",
            self.initial_max_length,
            self.initial_wait_time_ms,
        )?;
        for class in self.classes.iter() {
            let params = self.queue_params(MessageClass(class.message_class));
            self.check_initial_values(
                &format!("class {}", class.message_class),
                params.initial_max_length,
                params.initial_wait_time_ms,
            )?;
        }
        Ok(())
    }

    fn check_initial_values(&self, what: &str, max_length: f64, wait_time_ms: f64) -> Result<()> {
        ensure!(
            (self.min_queue_length..=self.max_queue_length).contains(&max_length),
            "{what} initial max length {max_length} is outside [{}, {}]",
            self.min_queue_length,
            self.max_queue_length
        );
        ensure!(
            (self.min_wait_time_ms..=self.max_wait_time_ms).contains(&wait_time_ms),
            "{what} initial wait time {wait_time_ms}ms is outside [{}, {}]",
            self.min_wait_time_ms,
            self.max_wait_time_ms
        );
        Ok(())
    }

    pub fn queue_params(&self, class: MessageClass) -> QueueParams {
        let class_config = self.classes.iter().find(|c| c.message_class == class.0);
        QueueParams {
            initial_max_length: class_config
                .and_then(|c| c.initial_max_length)
                .unwrap_or(self.initial_max_length),
            initial_wait_time_ms: class_config
                .and_then(|c| c.initial_wait_time_ms)
                .unwrap_or(self.initial_wait_time_ms),
            max_queue_length: self.max_queue_length,
            min_queue_length: self.min_queue_length,
            max_wait_time_ms: self.max_wait_time_ms,
            min_wait_time_ms: self.min_wait_time_ms,
            increase_step: self.increase_step,
            decrease_step: self.decrease_step,
            adapt_after: self.adapt_after,
        }
    }
}

pub fn millis(ms: f64) -> Duration {
    Duration::from_nanos((ms * 1_000_000.0).round() as u64)
}

/// Load the aggregation settings from a TOML file.
pub fn load_config_file(filename: &str, logger: &Logger) -> Result<AggregationConfig> {
    let path = std::env::current_dir()?;
    let contents = fs::read_to_string(filename).inspect_err(|e| {
        error!(
            logger,
            "Failed to load config file {filename} (current directory {}) with error code {e}",
            path.display()
        )
    })?;
    let config: AggregationConfig = toml::from_str(&contents)?;
    config.validate()?;
    info!(
        logger,
        "Loaded aggregation config from {filename} with {} class overrides",
        config.classes.len()
    );
    Ok(config)
}
