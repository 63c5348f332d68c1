//! Skip-gram with negative sampling over baskets.

use std::sync::Arc;
use std::time::Instant;

use core_types::Basket;
use core_types::config::ModelConfig;
use rand::distributions::WeightedIndex;
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use tracing::{debug, info};

use crate::observer::{EpochEnd, EpochObserver};
use crate::space::VectorSpace;
use crate::vocab::Vocabulary;
use crate::TrainerError;

/// Dot products are clamped to this range before the sigmoid.
const MAX_EXP: f32 = 6.0;

#[derive(Debug, Clone)]
struct Weights {
    dim: usize,
    input: Vec<f32>,
    output: Vec<f32>,
}

impl Weights {
    fn init(vocab_len: usize, dim: usize, rng: &mut ChaCha8Rng) -> Self {
        let bound = 0.5 / dim as f32;
        let input = (0..vocab_len * dim)
            .map(|_| rng.gen_range(-bound..bound))
            .collect();
        Self {
            dim,
            input,
            output: vec![0.0; vocab_len * dim],
        }
    }

    fn average(shards: Vec<Self>) -> Option<Self> {
        let count = shards.len() as f32;
        let mut iter = shards.into_iter();
        let mut acc = iter.next()?;
        for shard in iter {
            for (a, b) in acc.input.iter_mut().zip(&shard.input) {
                *a += b;
            }
            for (a, b) in acc.output.iter_mut().zip(&shard.output) {
                *a += b;
            }
        }
        acc.input.iter_mut().for_each(|v| *v /= count);
        acc.output.iter_mut().for_each(|v| *v /= count);
        Some(acc)
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct ShardStats {
    loss: f64,
    pairs: u64,
    alpha: f32,
}

impl ShardStats {
    fn merge(self, other: Self) -> Self {
        Self {
            loss: self.loss + other.loss,
            pairs: self.pairs + other.pairs,
            alpha: if other.pairs > 0 { other.alpha } else { self.alpha },
        }
    }
}

/// Linear decay from `alpha` to `min_alpha` over the whole run.
#[derive(Debug, Clone, Copy)]
struct Schedule {
    alpha: f32,
    min_alpha: f32,
    epochs: usize,
}

impl Schedule {
    fn at(&self, epoch: usize, within_epoch: f32) -> f32 {
        let progress = (epoch as f32 + within_epoch) / self.epochs as f32;
        (self.alpha - (self.alpha - self.min_alpha) * progress).max(self.min_alpha)
    }
}

/// Parameters shared by every shard of one epoch.
struct EpochPass<'a> {
    noise: &'a WeightedIndex<f64>,
    window: Option<usize>,
    negative: usize,
    schedule: Schedule,
    epoch: usize,
}

impl EpochPass<'_> {
    fn train(&self, baskets: &[Vec<usize>], weights: &mut Weights, rng: &mut ChaCha8Rng) -> ShardStats {
        let total = baskets.len().max(1) as f32;
        let mut stats = ShardStats::default();
        let mut grad = vec![0.0f32; weights.dim];

        for (pos, basket) in baskets.iter().enumerate() {
            let alpha = self.schedule.at(self.epoch, pos as f32 / total);
            stats.alpha = alpha;
            for (i, &center) in basket.iter().enumerate() {
                let (lo, hi) = match self.window {
                    Some(w) => (i.saturating_sub(w), (i + w).min(basket.len() - 1)),
                    None => (0, basket.len() - 1),
                };
                for (j, &context) in basket.iter().enumerate().take(hi + 1).skip(lo) {
                    if j == i {
                        continue;
                    }
                    stats.loss += train_pair(
                        weights,
                        center,
                        context,
                        self.noise,
                        self.negative,
                        alpha,
                        rng,
                        &mut grad,
                    );
                    stats.pairs += 1;
                }
            }
        }
        stats
    }
}

fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x.clamp(-MAX_EXP, MAX_EXP)).exp())
}

/// One SGD step for `center` predicting `target` plus `negative` noise samples.
/// Returns the pair's loss.
#[allow(clippy::too_many_arguments)]
fn train_pair(
    weights: &mut Weights,
    center: usize,
    target: usize,
    noise: &WeightedIndex<f64>,
    negative: usize,
    alpha: f32,
    rng: &mut ChaCha8Rng,
    grad: &mut [f32],
) -> f64 {
    let dim = weights.dim;
    let Weights { input, output, .. } = weights;
    let h = &input[center * dim..(center + 1) * dim];
    grad.fill(0.0);
    let mut loss = 0.0f64;

    let negatives = (0..negative).map(|_| (noise.sample(&mut *rng), false));
    for (t, positive) in std::iter::once((target, true)).chain(negatives) {
        if !positive && t == target {
            continue;
        }
        let out = &mut output[t * dim..(t + 1) * dim];
        let dot: f32 = h.iter().zip(out.iter()).map(|(a, b)| a * b).sum();
        let f = sigmoid(dot);
        let label = if positive { 1.0 } else { 0.0 };
        let g = (label - f) * alpha;

        let p = if positive { f } else { 1.0 - f };
        loss -= f64::from(p.max(f32::MIN_POSITIVE)).ln();

        for (gk, (ok, hk)) in grad.iter_mut().zip(out.iter_mut().zip(h)) {
            *gk += g * *ok;
            *ok += g * hk;
        }
    }

    for (v, g) in input[center * dim..(center + 1) * dim].iter_mut().zip(grad.iter()) {
        *v += g;
    }
    loss
}

fn noise_distribution(vocab: &Vocabulary, exponent: f64) -> Result<WeightedIndex<f64>, TrainerError> {
    let weights: Vec<f64> = vocab.counts().map(|c| (c as f64).powf(exponent)).collect();
    WeightedIndex::new(weights)
        .map_err(|e| TrainerError::InvalidConfig(format!("noise distribution: {e}")))
}

fn shard_rng(seed: u64, stream: u64) -> ChaCha8Rng {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    rng.set_stream(stream);
    rng
}

/// Build a vocabulary from `corpus` and train product vectors on it.
///
/// With `workers == 1` the result depends only on corpus and config. With more
/// workers each epoch trains contiguous shards in parallel and averages them;
/// the result is still reproducible for the same worker count.
pub fn train(
    corpus: &[Basket],
    config: &ModelConfig,
    observers: &[Arc<dyn EpochObserver>],
) -> Result<VectorSpace, TrainerError> {
    config
        .validate()
        .map_err(|e| TrainerError::InvalidConfig(e.to_string()))?;
    if corpus.is_empty() {
        return Err(TrainerError::EmptyCorpus);
    }

    let vocab = Vocabulary::build(corpus, config.min_count);
    if vocab.is_empty() {
        return Err(TrainerError::EmptyVocabulary {
            min_count: config.min_count,
        });
    }

    let started = Instant::now();
    let encoded = vocab.encode(corpus);
    let noise = noise_distribution(&vocab, config.ns_exponent)?;
    let mut init_rng = shard_rng(config.seed, 0);
    let mut weights = Weights::init(vocab.len(), config.vector_size, &mut init_rng);
    let schedule = Schedule {
        alpha: config.alpha,
        min_alpha: config.min_alpha,
        epochs: config.epochs,
    };

    let pool = if config.workers > 1 {
        Some(
            rayon::ThreadPoolBuilder::new()
                .num_threads(config.workers)
                .build()
                .map_err(|e| TrainerError::ThreadPool(e.to_string()))?,
        )
    } else {
        None
    };

    info!(
        baskets = corpus.len(),
        vocab = vocab.len(),
        vector_size = config.vector_size,
        epochs = config.epochs,
        workers = config.workers,
        "training product vectors"
    );
    for observer in observers {
        observer.on_train_begin(config.epochs);
    }

    let workers = config.workers as u64;
    for epoch in 0..config.epochs {
        let pass = EpochPass {
            noise: &noise,
            window: config.window,
            negative: config.negative,
            schedule,
            epoch,
        };
        let stream_base = 1 + epoch as u64 * workers;

        let stats = match &pool {
            None => {
                let mut rng = shard_rng(config.seed, stream_base);
                pass.train(&encoded, &mut weights, &mut rng)
            }
            Some(pool) => {
                let shard_len = encoded.len().div_ceil(config.workers);
                let trained: Vec<(Weights, ShardStats)> = pool.install(|| {
                    encoded
                        .par_chunks(shard_len)
                        .enumerate()
                        .map(|(shard, baskets)| {
                            let mut local = weights.clone();
                            let mut rng = shard_rng(config.seed, stream_base + shard as u64);
                            let stats = pass.train(baskets, &mut local, &mut rng);
                            (local, stats)
                        })
                        .collect()
                });
                let (shards, stats): (Vec<Weights>, Vec<ShardStats>) = trained.into_iter().unzip();
                if let Some(avg) = Weights::average(shards) {
                    weights = avg;
                }
                stats.into_iter().fold(ShardStats::default(), ShardStats::merge)
            }
        };

        let event = EpochEnd {
            epoch,
            epochs: config.epochs,
            loss: if stats.pairs > 0 {
                stats.loss / stats.pairs as f64
            } else {
                0.0
            },
            pairs: stats.pairs,
            alpha: stats.alpha,
        };
        debug!(epoch, loss = event.loss, pairs = event.pairs, alpha = event.alpha, "epoch done");
        for observer in observers {
            observer.on_epoch_end(&event);
        }
    }

    for observer in observers {
        observer.on_train_end();
    }
    info!(
        elapsed_ms = started.elapsed().as_millis() as u64,
        "training complete"
    );

    Ok(VectorSpace::new(
        vocab,
        config.vector_size,
        weights.input,
        weights.output,
    ))
}
