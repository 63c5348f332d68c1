use std::fmt;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;
use std::sync::Arc;

use core_types::config::ModelConfig;
use core_types::{Basket, Neighbor};
use embedding_trainer::{EpochObserver, Side, VectorSpace};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{Product2VecError, Result};

/// Bumped whenever the snapshot layout changes.
const SNAPSHOT_VERSION: u32 = 1;

/// How candidates are compared against the focal product.
///
/// Both relations start from the focal product's input vector.
/// `Complement` scores candidates by their output vectors: SGNS trains
/// `input(p) . output(q)` to be high exactly when `q` shows up in `p`'s
/// baskets. `Substitute` scores candidates by their input vectors: products
/// whose contexts look alike end up close even if they never share a basket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relation {
    Complement,
    Substitute,
}

impl Relation {
    fn candidate_side(self) -> Side {
        match self {
            Self::Complement => Side::Output,
            Self::Substitute => Side::Input,
        }
    }
}

#[derive(Serialize, Deserialize)]
struct Snapshot {
    version: u32,
    config: ModelConfig,
    space: VectorSpace,
}

/// Product embedding model over shopping baskets.
///
/// Lifecycle: [`Product2Vec::new`] (unfitted) → [`fit`](Product2Vec::fit) →
/// any number of queries. Fitting again retrains from scratch.
pub struct Product2Vec {
    config: ModelConfig,
    callbacks: Vec<Arc<dyn EpochObserver>>,
    space: Option<VectorSpace>,
}

impl fmt::Debug for Product2Vec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Product2Vec")
            .field("config", &self.config)
            .field("callbacks", &self.callbacks.len())
            .field("vocab_size", &self.space.as_ref().map(VectorSpace::len))
            .finish()
    }
}

impl Product2Vec {
    pub fn new(config: ModelConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            callbacks: Vec::new(),
            space: None,
        })
    }

    /// Attach an epoch observer; observers run in the order they were added.
    pub fn with_callback(mut self, callback: Arc<dyn EpochObserver>) -> Self {
        self.callbacks.push(callback);
        self
    }

    pub fn with_callbacks<I>(mut self, callbacks: I) -> Self
    where
        I: IntoIterator<Item = Arc<dyn EpochObserver>>,
    {
        self.callbacks.extend(callbacks);
        self
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    pub fn is_fitted(&self) -> bool {
        self.space.is_some()
    }

    /// Train on `corpus`, replacing any previous fit.
    ///
    /// On error the previously fitted state, if any, is kept.
    pub fn fit(&mut self, corpus: &[Basket]) -> Result<&mut Self> {
        if corpus.is_empty() {
            return Err(Product2VecError::EmptyCorpus);
        }
        let replacing = self.space.is_some();
        let space = embedding_trainer::train(corpus, &self.config, &self.callbacks)?;
        info!(
            vocab = space.len(),
            vector_size = space.vector_size(),
            replacing,
            "product2vec fitted"
        );
        self.space = Some(space);
        Ok(self)
    }

    pub fn vector_space(&self) -> Result<&VectorSpace> {
        self.space.as_ref().ok_or(Product2VecError::ModelNotFitted)
    }

    /// Vocabulary in index order (most frequent product first).
    pub fn index_to_key(&self) -> Result<Vec<&str>> {
        Ok(self.vector_space()?.index_to_key())
    }

    pub fn vocab_size(&self) -> Result<usize> {
        Ok(self.vector_space()?.len())
    }

    /// Products most often bought together with `product`.
    pub fn show_complements(&self, product: &str, topn: usize) -> Result<Vec<Neighbor>> {
        self.neighbors(product, topn, Relation::Complement)
    }

    /// Products that can replace `product`.
    pub fn show_substitutes(&self, product: &str, topn: usize) -> Result<Vec<Neighbor>> {
        self.neighbors(product, topn, Relation::Substitute)
    }

    /// Rank every other vocabulary product under `relation`.
    ///
    /// `topn` is clamped to `vocab_size - 1`; the focal product is never
    /// returned. Ties are ordered by vocabulary index.
    pub fn neighbors(&self, product: &str, topn: usize, relation: Relation) -> Result<Vec<Neighbor>> {
        let space = self.vector_space()?;
        let focal = space
            .key_to_index(product)
            .ok_or_else(|| Product2VecError::UnknownProduct(product.to_string()))?;
        let topn = topn.min(space.len() - 1);

        let query = space.vector(focal, Side::Input);
        let hits = space.most_similar_by_vector(query, relation.candidate_side(), topn, &[focal]);
        debug!(product, ?relation, topn, hits = hits.len(), "neighbour query");

        let vocab = space.vocabulary();
        Ok(hits
            .into_iter()
            .filter_map(|(index, score)| vocab.key(index).map(|key| Neighbor::new(key, score)))
            .collect())
    }

    /// Write config and vectors to `path`. Callbacks are not saved.
    pub fn save(&self, path: &Path) -> Result<()> {
        let space = self.vector_space()?;
        let snapshot = SnapshotRef {
            version: SNAPSHOT_VERSION,
            config: &self.config,
            space,
        };
        let mut writer = BufWriter::new(File::create(path)?);
        bincode::serialize_into(&mut writer, &snapshot)?;
        writer.flush()?;
        info!(path = %path.display(), vocab = space.len(), "model saved");
        Ok(())
    }

    /// Restore a fitted model written by [`save`](Product2Vec::save).
    pub fn load(path: &Path) -> Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        let snapshot: Snapshot = bincode::deserialize_from(reader)?;
        if snapshot.version != SNAPSHOT_VERSION {
            return Err(Product2VecError::Persistence(format!(
                "unsupported snapshot version {} (expected {SNAPSHOT_VERSION})",
                snapshot.version
            )));
        }
        snapshot.config.validate()?;
        snapshot.space.check()?;
        if snapshot.space.vector_size() != snapshot.config.vector_size {
            return Err(Product2VecError::Persistence(
                "vector size does not match config".into(),
            ));
        }
        debug!(path = %path.display(), vocab = snapshot.space.len(), "model loaded");
        Ok(Self {
            config: snapshot.config,
            callbacks: Vec::new(),
            space: Some(snapshot.space),
        })
    }
}

/// Borrowing twin of [`Snapshot`] so saving does not clone the vectors.
#[derive(Serialize)]
struct SnapshotRef<'a> {
    version: u32,
    config: &'a ModelConfig,
    space: &'a VectorSpace,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn corpus() -> Vec<Basket> {
        let raw: [&[&str]; 4] = [
            &["milk", "bread", "butter"],
            &["milk", "bread"],
            &["beer", "chips"],
            &["beer", "chips", "salsa"],
        ];
        raw.iter()
            .cycle()
            .take(80)
            .map(|b| b.iter().map(|p| (*p).to_string()).collect())
            .collect()
    }

    fn model() -> Product2Vec {
        Product2Vec::new(
            ModelConfig::default()
                .with_vector_size(8)
                .with_epochs(5)
                .with_seed(1),
        )
        .unwrap()
    }

    #[test]
    fn invalid_config_rejected() {
        let err = Product2Vec::new(ModelConfig::default().with_epochs(0)).unwrap_err();
        assert!(matches!(err, Product2VecError::Configuration(ref m) if m.contains("epochs")));
    }

    #[test]
    fn queries_before_fit_fail() {
        let m = model();
        assert!(!m.is_fitted());
        assert!(matches!(
            m.show_complements("milk", 3),
            Err(Product2VecError::ModelNotFitted)
        ));
        assert!(matches!(
            m.show_substitutes("milk", 3),
            Err(Product2VecError::ModelNotFitted)
        ));
        assert!(matches!(m.index_to_key(), Err(Product2VecError::ModelNotFitted)));
    }

    #[test]
    fn empty_corpus_rejected_and_state_kept() {
        let mut m = model();
        assert!(matches!(m.fit(&[]), Err(Product2VecError::EmptyCorpus)));
        assert!(!m.is_fitted());

        m.fit(&corpus()).unwrap();
        assert!(matches!(m.fit(&[]), Err(Product2VecError::EmptyCorpus)));
        assert!(m.is_fitted());
    }

    #[test]
    fn unknown_product_rejected() {
        let mut m = model();
        m.fit(&corpus()).unwrap();
        let err = m.show_complements("caviar", 3).unwrap_err();
        assert!(matches!(err, Product2VecError::UnknownProduct(ref p) if p == "caviar"));
    }

    #[test]
    fn topn_clamped_and_focal_excluded() {
        let mut m = model();
        m.fit(&corpus()).unwrap();
        let vocab = m.vocab_size().unwrap();
        assert_eq!(vocab, 6);

        for relation in [Relation::Complement, Relation::Substitute] {
            let hits = m.neighbors("milk", 100, relation).unwrap();
            assert_eq!(hits.len(), vocab - 1);
            assert!(hits.iter().all(|n| n.product != "milk"));
            assert!(hits.windows(2).all(|w| w[0].score >= w[1].score));
            assert!(m.neighbors("milk", 0, relation).unwrap().is_empty());
            assert_eq!(m.neighbors("milk", 2, relation).unwrap().len(), 2);
        }
    }

    #[test]
    fn refit_replaces_vocabulary() {
        let mut m = model();
        m.fit(&corpus()).unwrap();
        assert!(m.vector_space().unwrap().contains("milk"));

        let other: Vec<Basket> = vec![vec!["tea".into(), "lemon".into()]; 10];
        m.fit(&other).unwrap();
        assert_eq!(m.index_to_key().unwrap(), vec!["tea", "lemon"]);
        assert!(matches!(
            m.show_complements("milk", 1),
            Err(Product2VecError::UnknownProduct(_))
        ));
    }

    #[test]
    fn single_product_vocabulary_has_no_neighbours() {
        let mut m = model();
        m.fit(&[vec!["solo".to_string()]]).unwrap();
        assert!(m.show_complements("solo", 5).unwrap().is_empty());
        assert!(m.show_substitutes("solo", 5).unwrap().is_empty());
    }

    #[test]
    fn min_count_can_empty_the_vocabulary() {
        let mut m = Product2Vec::new(ModelConfig::default().with_min_count(1_000)).unwrap();
        assert!(matches!(
            m.fit(&corpus()),
            Err(Product2VecError::EmptyVocabulary { min_count: 1_000 })
        ));
    }

    #[test]
    fn save_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.p2v");

        let mut m = model();
        assert!(matches!(m.save(&path), Err(Product2VecError::ModelNotFitted)));
        m.fit(&corpus()).unwrap();
        m.save(&path).unwrap();

        let loaded = Product2Vec::load(&path).unwrap();
        assert!(loaded.is_fitted());
        assert_eq!(loaded.config(), m.config());
        assert_eq!(loaded.index_to_key().unwrap(), m.index_to_key().unwrap());
        assert_eq!(
            loaded.show_substitutes("bread", 3).unwrap(),
            m.show_substitutes("bread", 3).unwrap()
        );
    }

    #[test]
    fn load_rejects_truncated_vectors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.p2v");
        let mut m = model();
        m.fit(&corpus()).unwrap();
        let space = m.vector_space().unwrap();

        // Keep the header and vocabulary but cut each matrix down to one row.
        let n = space.len();
        let d = space.vector_size();
        let truncated = TruncatedSnapshot {
            version: SNAPSHOT_VERSION,
            config: m.config(),
            vocab: space.vocabulary(),
            vector_size: d,
            input: space.vector(0, Side::Input),
            output: space.vector(0, Side::Output),
        };
        assert!(n > 1);
        std::fs::write(&path, bincode::serialize(&truncated).unwrap()).unwrap();

        let err = Product2Vec::load(&path).unwrap_err();
        assert!(matches!(err, Product2VecError::Persistence(ref msg) if msg.contains("matrix")));
    }

    /// Same field layout as [`Snapshot`], with the space spelled out.
    #[derive(Serialize)]
    struct TruncatedSnapshot<'a> {
        version: u32,
        config: &'a ModelConfig,
        vocab: &'a embedding_trainer::Vocabulary,
        vector_size: usize,
        input: &'a [f32],
        output: &'a [f32],
    }

    #[test]
    fn load_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("junk.p2v");
        std::fs::write(&path, b"not a model").unwrap();
        assert!(Product2Vec::load(&path).is_err());
        assert!(matches!(
            Product2Vec::load(&dir.path().join("missing.p2v")),
            Err(Product2VecError::Io(_))
        ));
    }
}
