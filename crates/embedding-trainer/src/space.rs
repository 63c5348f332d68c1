use serde::{Deserialize, Serialize};

use crate::TrainerError;
use crate::vocab::Vocabulary;

/// Which of the two trained matrices to read.
///
/// SGNS learns an input ("word") vector and an output ("context") vector per
/// product; `Input` is what most tools call *the* embedding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    Input,
    Output,
}

/// Trained product vectors. Immutable once returned by the trainer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorSpace {
    vocab: Vocabulary,
    vector_size: usize,
    input: Vec<f32>,
    output: Vec<f32>,
}

impl VectorSpace {
    pub(crate) fn new(vocab: Vocabulary, vector_size: usize, input: Vec<f32>, output: Vec<f32>) -> Self {
        debug_assert_eq!(input.len(), vocab.len() * vector_size);
        debug_assert_eq!(output.len(), vocab.len() * vector_size);
        Self {
            vocab,
            vector_size,
            input,
            output,
        }
    }

    /// Verify both matrices hold exactly one row per vocabulary entry.
    ///
    /// Spaces produced by [`train`](crate::train) always pass; this guards
    /// spaces decoded from outside sources.
    pub fn check(&self) -> Result<(), TrainerError> {
        if self.vector_size == 0 {
            return Err(TrainerError::InconsistentSpace("vector size is zero".into()));
        }
        let expected = self
            .vocab
            .len()
            .checked_mul(self.vector_size)
            .ok_or_else(|| TrainerError::InconsistentSpace("matrix size overflows".into()))?;
        for (name, matrix) in [("input", &self.input), ("output", &self.output)] {
            if matrix.len() != expected {
                return Err(TrainerError::InconsistentSpace(format!(
                    "{name} matrix has {} values, expected {expected} ({} products x {})",
                    matrix.len(),
                    self.vocab.len(),
                    self.vector_size
                )));
            }
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.vocab.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vocab.is_empty()
    }

    pub fn vector_size(&self) -> usize {
        self.vector_size
    }

    pub fn vocabulary(&self) -> &Vocabulary {
        &self.vocab
    }

    /// Products in index order.
    pub fn index_to_key(&self) -> Vec<&str> {
        self.vocab.keys().collect()
    }

    pub fn key_to_index(&self, key: &str) -> Option<usize> {
        self.vocab.index_of(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.key_to_index(key).is_some()
    }

    /// Row `index` of the chosen matrix. Panics when `index >= len()`.
    pub fn vector(&self, index: usize, side: Side) -> &[f32] {
        let start = index * self.vector_size;
        let matrix = match side {
            Side::Input => &self.input,
            Side::Output => &self.output,
        };
        &matrix[start..start + self.vector_size]
    }

    pub fn get_vector(&self, key: &str) -> Option<&[f32]> {
        self.key_to_index(key).map(|i| self.vector(i, Side::Input))
    }

    pub fn get_output_vector(&self, key: &str) -> Option<&[f32]> {
        self.key_to_index(key).map(|i| self.vector(i, Side::Output))
    }

    /// Rank rows of `side` by cosine similarity to `query`.
    ///
    /// Indices in `exclude` are skipped. Results are sorted by descending score,
    /// equal scores by ascending index, and cut to `topn`.
    pub fn most_similar_by_vector(
        &self,
        query: &[f32],
        side: Side,
        topn: usize,
        exclude: &[usize],
    ) -> Vec<(usize, f32)> {
        if topn == 0 {
            return Vec::new();
        }
        let mut scored: Vec<(usize, f32)> = (0..self.len())
            .filter(|i| !exclude.contains(i))
            .map(|i| (i, cosine_similarity(query, self.vector(i, side))))
            .collect();
        scored.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
        scored.truncate(topn);
        scored
    }
}

/// Cosine similarity; `0.0` when either vector has zero norm or lengths differ.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}
