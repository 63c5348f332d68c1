use std::collections::HashMap;

use core_types::Basket;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Ordered product vocabulary with occurrence counts.
///
/// Index 0 is the most frequent product; equal counts keep the order in which
/// the products first appeared in the corpus.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vocabulary {
    counts: IndexMap<String, u64>,
}

impl Vocabulary {
    /// Count products and keep those seen at least `min_count` times.
    pub fn build(corpus: &[Basket], min_count: usize) -> Self {
        let mut seen: IndexMap<&str, u64> = IndexMap::new();
        for product in corpus.iter().flatten() {
            *seen.entry(product.as_str()).or_insert(0) += 1;
        }

        let mut kept: Vec<(&str, u64)> = seen
            .into_iter()
            .filter(|(_, count)| *count >= min_count as u64)
            .collect();
        // Stable sort keeps first-seen order among equal counts.
        kept.sort_by(|a, b| b.1.cmp(&a.1));

        Self {
            counts: kept
                .into_iter()
                .map(|(key, count)| (key.to_string(), count))
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    pub fn index_of(&self, key: &str) -> Option<usize> {
        self.counts.get_index_of(key)
    }

    pub fn key(&self, index: usize) -> Option<&str> {
        self.counts.get_index(index).map(|(k, _)| k.as_str())
    }

    pub fn count(&self, index: usize) -> Option<u64> {
        self.counts.get_index(index).map(|(_, c)| *c)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> + '_ {
        self.counts.keys().map(String::as_str)
    }

    pub fn counts(&self) -> impl Iterator<Item = u64> + '_ {
        self.counts.values().copied()
    }

    /// Map baskets to vocabulary indices, dropping unknown products.
    pub(crate) fn encode(&self, corpus: &[Basket]) -> Vec<Vec<usize>> {
        let lookup: HashMap<&str, usize> = self.keys().enumerate().map(|(i, k)| (k, i)).collect();
        corpus
            .iter()
            .map(|basket| {
                basket
                    .iter()
                    .filter_map(|p| lookup.get(p.as_str()).copied())
                    .collect()
            })
            .collect()
    }
}
