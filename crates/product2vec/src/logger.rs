use std::collections::VecDeque;

use embedding_trainer::{EpochEnd, EpochObserver};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{Product2VecError, Result};

/// One finished epoch as remembered by [`EpochLogger`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EpochRecord {
    /// Zero-based epoch index.
    pub epoch: usize,
    /// Mean loss per positive pair.
    pub loss: f64,
}

/// Keeps the `n_latest` most recent epochs and logs training progress.
///
/// Share it with a model as `Arc<EpochLogger>` and read [`history`] once
/// `fit` has returned. The history is reset when a new training run begins.
///
/// [`history`]: EpochLogger::history
#[derive(Debug)]
pub struct EpochLogger {
    n_latest: usize,
    history: Mutex<VecDeque<EpochRecord>>,
}

impl EpochLogger {
    pub fn new(n_latest: usize) -> Result<Self> {
        if n_latest == 0 {
            return Err(Product2VecError::Configuration(
                "EpochLogger n_latest must be at least 1".into(),
            ));
        }
        Ok(Self {
            n_latest,
            history: Mutex::new(VecDeque::with_capacity(n_latest)),
        })
    }

    pub fn n_latest(&self) -> usize {
        self.n_latest
    }

    /// Recorded epochs, oldest first and most recent last.
    pub fn history(&self) -> Vec<EpochRecord> {
        self.history.lock().iter().copied().collect()
    }

    pub fn latest(&self) -> Option<EpochRecord> {
        self.history.lock().back().copied()
    }

    pub fn len(&self) -> usize {
        self.history.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.lock().is_empty()
    }
}

impl EpochObserver for EpochLogger {
    fn on_train_begin(&self, epochs: usize) {
        self.history.lock().clear();
        debug!(epochs, n_latest = self.n_latest, "epoch logger attached");
    }

    fn on_epoch_end(&self, event: &EpochEnd) {
        {
            let mut history = self.history.lock();
            if history.len() == self.n_latest {
                history.pop_front();
            }
            history.push_back(EpochRecord {
                epoch: event.epoch,
                loss: event.loss,
            });
        }

        if event.is_within_last(self.n_latest) {
            info!(
                epoch = event.epoch + 1,
                epochs = event.epochs,
                loss = event.loss,
                "epoch finished"
            );
        } else {
            debug!(epoch = event.epoch + 1, loss = event.loss, "epoch finished");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn end(epoch: usize, epochs: usize) -> EpochEnd {
        EpochEnd {
            epoch,
            epochs,
            loss: 1.0 / (epoch + 1) as f64,
            pairs: 10,
            alpha: 0.01,
        }
    }

    #[test]
    fn zero_capacity_rejected() {
        assert!(matches!(
            EpochLogger::new(0),
            Err(Product2VecError::Configuration(_))
        ));
    }

    #[test]
    fn keeps_latest_oldest_first() {
        let logger = EpochLogger::new(3).unwrap();
        logger.on_train_begin(5);
        for epoch in 0..5 {
            logger.on_epoch_end(&end(epoch, 5));
        }
        let epochs: Vec<usize> = logger.history().iter().map(|r| r.epoch).collect();
        assert_eq!(epochs, vec![2, 3, 4]);
        assert_eq!(logger.latest().map(|r| r.epoch), Some(4));
    }

    #[test]
    fn new_run_resets_history() {
        let logger = EpochLogger::new(2).unwrap();
        logger.on_epoch_end(&end(0, 1));
        assert_eq!(logger.len(), 1);
        logger.on_train_begin(4);
        assert!(logger.is_empty());
    }

    proptest! {
        #[test]
        fn history_never_exceeds_capacity(n_latest in 1usize..8, epochs in 0usize..40) {
            let logger = EpochLogger::new(n_latest).unwrap();
            logger.on_train_begin(epochs);
            for epoch in 0..epochs {
                logger.on_epoch_end(&end(epoch, epochs));
                prop_assert!(logger.len() <= n_latest);
            }
            prop_assert_eq!(logger.len(), epochs.min(n_latest));
        }
    }
}
