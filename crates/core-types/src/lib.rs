//! Core identifiers and shared lightweight types for product2vec.
//!
//! These types intentionally avoid heavy dependencies so every crate in the
//! workspace (generator, trainer, model, CLI) can share them.

use serde::{Deserialize, Serialize};

/// Identifier of a single product, e.g. `"c03_v1"`.
pub type ProductId = String;

/// Products bought together in one transaction. Order is kept, duplicates allowed.
pub type Basket = Vec<ProductId>;

/// Training data: a finite sequence of baskets.
pub type Corpus = Vec<Basket>;

/// A ranked query result: a product and its similarity to the focal product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Neighbor {
    pub product: ProductId,
    pub score: f32,
}

impl Neighbor {
    pub fn new(product: impl Into<ProductId>, score: f32) -> Self {
        Self {
            product: product.into(),
            score,
        }
    }
}

/// Count how many products appear across a corpus, duplicates included.
pub fn total_items(corpus: &[Basket]) -> usize {
    corpus.iter().map(Vec::len).sum()
}

pub mod config;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn total_items_counts_duplicates() {
        let corpus: Corpus = vec![
            vec!["a".into(), "b".into(), "a".into()],
            vec![],
            vec!["c".into()],
        ];
        assert_eq!(total_items(&corpus), 4);
    }

    #[test]
    fn neighbor_new_accepts_str() {
        let n = Neighbor::new("c00_v1", 0.5);
        assert_eq!(n.product, "c00_v1");
        assert!((n.score - 0.5).abs() < f32::EPSILON);
    }
}
