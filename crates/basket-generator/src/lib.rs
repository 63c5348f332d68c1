//! Synthetic basket generation.
//!
//! Categories are split into consecutive "missions" (e.g. breakfast, barbecue).
//! A basket follows one mission, so products of the same mission co-occur,
//! while the variants of one category compete for the same slot and rarely
//! appear together. That gives both complement and substitute structure for
//! the model to recover.

use core_types::config::{ConfigError, GeneratorConfig};
use core_types::{Basket, Corpus, ProductId};
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GeneratorError {
    #[error("invalid generator configuration: {0}")]
    Configuration(#[from] ConfigError),
}

/// Product id for a category/variant pair.
pub fn product_id(category: usize, variant: usize) -> ProductId {
    format!("c{category:02}_v{variant}")
}

/// Inverse of [`product_id`]; `None` for ids this generator never emits.
pub fn parse_product_id(id: &str) -> Option<(usize, usize)> {
    let rest = id.strip_prefix('c')?;
    let (category, variant) = rest.split_once("_v")?;
    Some((category.parse().ok()?, variant.parse().ok()?))
}

/// Seeded generator of shopping baskets.
#[derive(Debug, Clone, Default)]
pub struct BasketGenerator {
    config: GeneratorConfig,
}

impl BasketGenerator {
    pub fn new(config: GeneratorConfig) -> Result<Self, GeneratorError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    /// Number of missions the categories are grouped into.
    pub fn num_missions(&self) -> usize {
        self.config
            .num_categories
            .div_ceil(self.config.categories_per_mission)
    }

    /// Mission a category belongs to.
    pub fn mission_of(&self, category: usize) -> usize {
        category / self.config.categories_per_mission
    }

    /// Every product the generator can emit, ordered by category then variant.
    pub fn products(&self) -> Vec<ProductId> {
        (0..self.config.num_categories)
            .flat_map(|c| (0..self.config.variants_per_category).map(move |v| product_id(c, v)))
            .collect()
    }

    /// Produce the corpus. The same config always yields the same baskets.
    pub fn generate(&self) -> Corpus {
        let cfg = &self.config;
        let mut rng = ChaCha8Rng::seed_from_u64(cfg.seed);
        let missions = self.num_missions();

        let corpus: Corpus = (0..cfg.num_baskets)
            .map(|_| self.basket(&mut rng, missions))
            .collect();

        debug!(
            baskets = corpus.len(),
            products = cfg.vocab_size(),
            missions,
            seed = cfg.seed,
            "generated synthetic baskets"
        );
        corpus
    }

    fn basket(&self, rng: &mut ChaCha8Rng, missions: usize) -> Basket {
        let cfg = &self.config;
        let mission = rng.gen_range(0..missions);
        let first = mission * cfg.categories_per_mission;
        let last = (first + cfg.categories_per_mission).min(cfg.num_categories);
        let size = rng.gen_range(cfg.min_basket_size..=cfg.max_basket_size);

        // Mission categories are dealt without replacement so that variants
        // of one category only share a basket once the mission is exhausted.
        let mut deck: Vec<usize> = (first..last).collect();
        deck.shuffle(rng);

        (0..size)
            .map(|slot| {
                let category = if rng.gen_bool(cfg.noise) {
                    rng.gen_range(0..cfg.num_categories)
                } else {
                    deck[slot % deck.len()]
                };
                let variant = rng.gen_range(0..cfg.variants_per_category);
                product_id(category, variant)
            })
            .collect()
    }
}
