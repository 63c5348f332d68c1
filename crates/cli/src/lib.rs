//! Shared helpers for the `p2v` debug CLI: logging bootstrap, basket files,
//! and a progress-bar epoch observer.

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use core_types::config::LoggingConfig;
use indicatif::{ProgressBar, ProgressStyle};
use product2vec::{Corpus, EpochEnd, EpochObserver, Neighbor};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::writer::BoxMakeWriter;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Install the global subscriber. `RUST_LOG` wins over `cfg.level`.
///
/// Keep the returned guard alive for the life of the process when logging to
/// a file, otherwise buffered lines are lost.
pub fn init_tracing(cfg: &LoggingConfig) -> Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&cfg.level))
        .with_context(|| format!("invalid log level `{}`", cfg.level))?;

    let (writer, guard) = match cfg.file.as_deref() {
        Some(file) => {
            let path = Path::new(file);
            let dir = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));
            let name = path
                .file_name()
                .ok_or_else(|| anyhow!("log file `{file}` has no file name"))?;
            let appender = tracing_appender::rolling::never(dir, name);
            let (non_blocking, guard) = tracing_appender::non_blocking(appender);
            (BoxMakeWriter::new(non_blocking), Some(guard))
        }
        None => (BoxMakeWriter::new(std::io::stderr), None),
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer);
    let installed = if cfg.json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    installed.map_err(|e| anyhow!("init tracing: {e}"))?;
    Ok(guard)
}

pub fn read_baskets(path: &Path) -> Result<Corpus> {
    let file = File::open(path).with_context(|| format!("open baskets {}", path.display()))?;
    serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("parse baskets {}", path.display()))
}

/// Write baskets as a JSON array of arrays; `None` writes to stdout.
pub fn write_baskets(corpus: &Corpus, path: Option<&Path>) -> Result<()> {
    match path {
        Some(p) => {
            let file = File::create(p).with_context(|| format!("create {}", p.display()))?;
            let mut writer = BufWriter::new(file);
            serde_json::to_writer(&mut writer, corpus)?;
            writer.flush()?;
        }
        None => {
            let stdout = std::io::stdout();
            let mut lock = stdout.lock();
            serde_json::to_writer(&mut lock, corpus)?;
            writeln!(lock)?;
        }
    }
    Ok(())
}

/// Render neighbours as aligned `rank  product  score` lines.
pub fn format_neighbors(neighbors: &[Neighbor]) -> String {
    let width = neighbors
        .iter()
        .map(|n| n.product.len())
        .max()
        .unwrap_or(0);
    neighbors
        .iter()
        .enumerate()
        .map(|(rank, n)| format!("{:>3}  {:<width$}  {:>7.4}", rank + 1, n.product, n.score))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Epoch observer that drives a terminal progress bar.
pub struct ProgressObserver {
    bar: ProgressBar,
}

impl ProgressObserver {
    pub fn new() -> Self {
        let bar = ProgressBar::new(0);
        if let Ok(style) =
            ProgressStyle::with_template("{spinner} epoch {pos}/{len} [{bar:30}] {msg}")
        {
            bar.set_style(style.progress_chars("=> "));
        }
        Self { bar }
    }

    pub fn hidden() -> Self {
        Self {
            bar: ProgressBar::hidden(),
        }
    }

    pub fn position(&self) -> u64 {
        self.bar.position()
    }
}

impl Default for ProgressObserver {
    fn default() -> Self {
        Self::new()
    }
}

impl EpochObserver for ProgressObserver {
    fn on_train_begin(&self, epochs: usize) {
        self.bar.set_length(epochs as u64);
        self.bar.set_position(0);
    }

    fn on_epoch_end(&self, event: &EpochEnd) {
        self.bar.set_message(format!("loss {:.4}", event.loss));
        self.bar.inc(1);
    }

    fn on_train_end(&self) {
        self.bar.finish_and_clear();
    }
}
