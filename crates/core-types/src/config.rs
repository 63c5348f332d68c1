//! Layered configuration: built-in defaults, an optional TOML file, then
//! `P2V_*` environment variables (a `.env` file is honoured via `dotenvy`).

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default config file name looked up by the CLI.
pub const DEFAULT_CONFIG_FILE: &str = "p2v.toml";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("invalid `{field}`: {reason}")]
pub struct ConfigError {
    pub field: &'static str,
    pub reason: String,
}

impl ConfigError {
    fn new(field: &'static str, reason: impl Into<String>) -> Self {
        Self {
            field,
            reason: reason.into(),
        }
    }
}

/// Parameters of the synthetic basket generator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    pub num_baskets: usize,
    pub num_categories: usize,
    /// Interchangeable products per category.
    pub variants_per_category: usize,
    /// Categories that are typically bought together.
    pub categories_per_mission: usize,
    pub min_basket_size: usize,
    pub max_basket_size: usize,
    /// Probability that a slot is filled from outside the basket's mission.
    pub noise: f64,
    pub seed: u64,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            num_baskets: 1000,
            num_categories: 12,
            variants_per_category: 3,
            categories_per_mission: 4,
            min_basket_size: 2,
            max_basket_size: 4,
            noise: 0.1,
            seed: 42,
        }
    }
}

impl GeneratorConfig {
    /// Number of distinct products the generator can emit.
    pub fn vocab_size(&self) -> usize {
        self.num_categories * self.variants_per_category
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive = [
            ("num_baskets", self.num_baskets),
            ("num_categories", self.num_categories),
            ("variants_per_category", self.variants_per_category),
            ("categories_per_mission", self.categories_per_mission),
            ("min_basket_size", self.min_basket_size),
            ("max_basket_size", self.max_basket_size),
        ];
        for (field, value) in positive {
            if value == 0 {
                return Err(ConfigError::new(field, "must be greater than zero"));
            }
        }
        if self.min_basket_size > self.max_basket_size {
            return Err(ConfigError::new(
                "min_basket_size",
                format!(
                    "{} exceeds max_basket_size {}",
                    self.min_basket_size, self.max_basket_size
                ),
            ));
        }
        if !(0.0..=1.0).contains(&self.noise) {
            return Err(ConfigError::new("noise", "must lie within [0, 1]"));
        }
        Ok(())
    }
}

/// Embedding model and trainer options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Dimensionality of product vectors.
    pub vector_size: usize,
    /// Products seen fewer times than this are left out of the vocabulary.
    pub min_count: usize,
    pub epochs: usize,
    pub seed: u64,
    /// Trainer threads. With `1` training is fully deterministic.
    pub workers: usize,
    /// Context window around each product; `None` uses the whole basket.
    pub window: Option<usize>,
    /// Negative samples drawn per positive pair.
    pub negative: usize,
    /// Initial learning rate.
    pub alpha: f32,
    /// Learning rate reached at the end of the last epoch.
    pub min_alpha: f32,
    /// Exponent applied to product counts for the noise distribution.
    pub ns_exponent: f64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            vector_size: 100,
            min_count: 1,
            epochs: 5,
            seed: 1,
            workers: 1,
            window: None,
            negative: 5,
            alpha: 0.025,
            min_alpha: 0.0001,
            ns_exponent: 0.75,
        }
    }
}

impl ModelConfig {
    pub fn with_vector_size(mut self, vector_size: usize) -> Self {
        self.vector_size = vector_size;
        self
    }

    pub fn with_min_count(mut self, min_count: usize) -> Self {
        self.min_count = min_count;
        self
    }

    pub fn with_epochs(mut self, epochs: usize) -> Self {
        self.epochs = epochs;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_window(mut self, window: Option<usize>) -> Self {
        self.window = window;
        self
    }

    pub fn with_negative(mut self, negative: usize) -> Self {
        self.negative = negative;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.vector_size == 0 {
            return Err(ConfigError::new("vector_size", "must be greater than zero"));
        }
        if self.epochs == 0 {
            return Err(ConfigError::new("epochs", "must be greater than zero"));
        }
        if self.workers == 0 {
            return Err(ConfigError::new("workers", "must be at least 1"));
        }
        if self.window == Some(0) {
            return Err(ConfigError::new("window", "must be greater than zero"));
        }
        if self.negative == 0 {
            return Err(ConfigError::new("negative", "must be greater than zero"));
        }
        if !self.alpha.is_finite() || self.alpha <= 0.0 {
            return Err(ConfigError::new("alpha", "must be finite and greater than zero"));
        }
        if !(self.min_alpha > 0.0 && self.min_alpha <= self.alpha) {
            return Err(ConfigError::new(
                "min_alpha",
                format!("must satisfy 0 < min_alpha <= alpha ({})", self.alpha),
            ));
        }
        if !self.ns_exponent.is_finite() {
            return Err(ConfigError::new("ns_exponent", "must be finite"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive, e.g. `info` or `product2vec=debug`.
    pub level: String,
    pub json: bool,
    /// Optional log file; stderr only when unset.
    pub file: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            json: false,
            file: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub generator: GeneratorConfig,
    pub model: ModelConfig,
    pub logging: LoggingConfig,
}

impl AppConfig {
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        toml::from_str(raw).context("parse config TOML")
    }

    /// Apply `P2V_*` overrides using `lookup` to resolve variable names.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(seed) = lookup("P2V_SEED") {
            let seed: u64 = seed.parse().context("P2V_SEED")?;
            self.model.seed = seed;
            self.generator.seed = seed;
        }
        if let Some(epochs) = lookup("P2V_EPOCHS") {
            self.model.epochs = epochs.parse().context("P2V_EPOCHS")?;
        }
        if let Some(workers) = lookup("P2V_WORKERS") {
            self.model.workers = workers.parse().context("P2V_WORKERS")?;
        }
        if let Some(level) = lookup("P2V_LOG_LEVEL") {
            self.logging.level = level;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.generator.validate()?;
        self.model.validate()
    }
}

/// Load configuration from `path` (or defaults), then the process environment.
///
/// A missing `path` is not an error when it is the implicit default file.
pub fn load_config(path: Option<&Path>) -> Result<AppConfig> {
    let _ = dotenvy::dotenv();
    load_config_with(path, |key| std::env::var(key).ok())
}

/// Like [`load_config`], but overrides come from `lookup` instead of the
/// process environment and no `.env` file is read.
pub fn load_config_with<F>(path: Option<&Path>, lookup: F) -> Result<AppConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let mut cfg = match path {
        Some(p) => {
            let raw = std::fs::read_to_string(p)
                .with_context(|| format!("read config {}", p.display()))?;
            AppConfig::from_toml_str(&raw)?
        }
        None => {
            let default = Path::new(DEFAULT_CONFIG_FILE);
            if default.exists() {
                let raw = std::fs::read_to_string(default)
                    .with_context(|| format!("read config {}", default.display()))?;
                AppConfig::from_toml_str(&raw)?
            } else {
                AppConfig::default()
            }
        }
    };

    cfg.apply_overrides(lookup)?;
    cfg.validate()?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn partial_toml_keeps_defaults() {
        let cfg = AppConfig::from_toml_str(
            r#"
            [model]
            vector_size = 10
            epochs = 20

            [generator]
            num_baskets = 50
            "#,
        )
        .unwrap();
        assert_eq!(cfg.model.vector_size, 10);
        assert_eq!(cfg.model.epochs, 20);
        assert_eq!(cfg.model.negative, ModelConfig::default().negative);
        assert_eq!(cfg.generator.num_baskets, 50);
        assert_eq!(cfg.generator.num_categories, 12);
        assert_eq!(cfg.logging, LoggingConfig::default());
    }

    #[test]
    fn env_overrides_win() {
        let vars: HashMap<&str, &str> = [("P2V_SEED", "7"), ("P2V_WORKERS", "3")].into();
        let mut cfg = AppConfig::default();
        cfg.apply_overrides(|k| vars.get(k).map(|v| (*v).to_string()))
            .unwrap();
        assert_eq!(cfg.model.seed, 7);
        assert_eq!(cfg.generator.seed, 7);
        assert_eq!(cfg.model.workers, 3);
        assert_eq!(cfg.model.epochs, ModelConfig::default().epochs);
    }

    #[test]
    fn bad_override_is_reported() {
        let mut cfg = AppConfig::default();
        let err = cfg
            .apply_overrides(|k| (k == "P2V_EPOCHS").then(|| "many".to_string()))
            .unwrap_err();
        assert!(format!("{err:#}").contains("P2V_EPOCHS"));
    }

    #[test]
    fn generator_validation() {
        let ok = GeneratorConfig::default();
        assert!(ok.validate().is_ok());
        assert_eq!(ok.vocab_size(), 36);

        let zero = GeneratorConfig {
            num_baskets: 0,
            ..GeneratorConfig::default()
        };
        assert_eq!(zero.validate().unwrap_err().field, "num_baskets");

        let inverted = GeneratorConfig {
            min_basket_size: 5,
            max_basket_size: 2,
            ..GeneratorConfig::default()
        };
        assert_eq!(inverted.validate().unwrap_err().field, "min_basket_size");

        let noisy = GeneratorConfig {
            noise: 1.5,
            ..GeneratorConfig::default()
        };
        assert_eq!(noisy.validate().unwrap_err().field, "noise");
    }

    #[test]
    fn model_validation() {
        assert!(ModelConfig::default().validate().is_ok());
        assert!(ModelConfig::default().with_min_count(0).validate().is_ok());
        assert_eq!(
            ModelConfig::default()
                .with_vector_size(0)
                .validate()
                .unwrap_err()
                .field,
            "vector_size"
        );
        assert_eq!(
            ModelConfig::default().with_epochs(0).validate().unwrap_err().field,
            "epochs"
        );
        assert_eq!(
            ModelConfig::default().with_workers(0).validate().unwrap_err().field,
            "workers"
        );
        assert_eq!(
            ModelConfig::default()
                .with_window(Some(0))
                .validate()
                .unwrap_err()
                .field,
            "window"
        );
    }

    #[test]
    fn non_finite_learning_rate_rejected() {
        let mut cfg = ModelConfig::default();
        cfg.alpha = f32::INFINITY;
        assert_eq!(cfg.validate().unwrap_err().field, "alpha");
        cfg.alpha = f32::NAN;
        assert_eq!(cfg.validate().unwrap_err().field, "alpha");
        cfg.alpha = 0.0;
        assert_eq!(cfg.validate().unwrap_err().field, "alpha");

        let mut cfg = ModelConfig::default();
        cfg.min_alpha = f32::NAN;
        assert_eq!(cfg.validate().unwrap_err().field, "min_alpha");
    }

    #[test]
    fn load_config_reads_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[logging]\nlevel = \"debug\"\njson = true").unwrap();
        let cfg = load_config_with(Some(file.path()), |_| None).unwrap();
        assert!(cfg.logging.json);
        assert_eq!(cfg.logging.level, "debug");
        assert_eq!(cfg.model, ModelConfig::default());
    }

    #[test]
    fn load_config_rejects_invalid_values() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[model]\nvector_size = 0").unwrap();
        assert!(load_config_with(Some(file.path()), |_| None).is_err());
    }

    #[test]
    fn load_config_applies_lookup_after_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[model]\nepochs = 7\nworkers = 2").unwrap();
        let cfg = load_config_with(Some(file.path()), |k| {
            (k == "P2V_EPOCHS").then(|| "11".to_string())
        })
        .unwrap();
        assert_eq!(cfg.model.epochs, 11);
        assert_eq!(cfg.model.workers, 2);
    }

    #[test]
    fn load_config_validates_overridden_values() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[model]\nepochs = 3").unwrap();
        let err = load_config_with(Some(file.path()), |k| {
            (k == "P2V_WORKERS").then(|| "0".to_string())
        })
        .unwrap_err();
        assert!(format!("{err:#}").contains("workers"));
    }
}
