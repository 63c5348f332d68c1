/// Progress report handed to observers after every epoch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EpochEnd {
    /// Zero-based epoch index.
    pub epoch: usize,
    /// Total epochs of the current run.
    pub epochs: usize,
    /// Mean negative-sampling loss per positive pair in this epoch.
    pub loss: f64,
    /// Positive (product, context) pairs trained in this epoch.
    pub pairs: u64,
    /// Learning rate at the end of the epoch.
    pub alpha: f32,
}

impl EpochEnd {
    /// True when this is one of the final `n` epochs of the run.
    pub fn is_within_last(&self, n: usize) -> bool {
        self.epoch + n >= self.epochs
    }
}

/// Hooks invoked by the trainer, always from the thread that called `train`.
///
/// Observers only watch; nothing they do feeds back into the weights.
pub trait EpochObserver: Send + Sync {
    fn on_train_begin(&self, _epochs: usize) {}

    fn on_epoch_end(&self, event: &EpochEnd);

    fn on_train_end(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn last_epochs_window() {
        let ev = |epoch| EpochEnd {
            epoch,
            epochs: 20,
            loss: 0.0,
            pairs: 0,
            alpha: 0.0,
        };
        assert!(!ev(16).is_within_last(3));
        assert!(ev(17).is_within_last(3));
        assert!(ev(19).is_within_last(3));
        assert!(ev(0).is_within_last(20));
    }
}
