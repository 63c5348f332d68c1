//! Product embeddings learned from shopping baskets.
//!
//! Each basket is treated like a sentence: products bought together become
//! each other's context, and a skip-gram model with negative sampling learns
//! one vector per product. From the fitted vectors the model answers two
//! questions about a product:
//!
//! - [`Product2Vec::show_complements`]: what is bought *with* it;
//! - [`Product2Vec::show_substitutes`]: what is bought *instead of* it.
//!
//! ```
//! use std::sync::Arc;
//! use product2vec::{BasketGenerator, EpochLogger, ModelConfig, Product2Vec};
//!
//! let baskets = BasketGenerator::default().generate();
//! let logger = Arc::new(EpochLogger::new(3).unwrap());
//! let mut model = Product2Vec::new(
//!     ModelConfig::default().with_vector_size(10).with_epochs(5),
//! )
//! .unwrap()
//! .with_callback(logger.clone());
//! model.fit(&baskets).unwrap();
//!
//! let focal = model.index_to_key().unwrap()[0].to_string();
//! let complements = model.show_complements(&focal, 5).unwrap();
//! assert_eq!(complements.len(), 5);
//! assert_eq!(logger.history().len(), 3);
//! ```

pub mod error;
pub mod logger;
pub mod model;

pub use basket_generator::{BasketGenerator, GeneratorError};
pub use core_types::config::{GeneratorConfig, ModelConfig};
pub use core_types::{Basket, Corpus, Neighbor, ProductId};
pub use embedding_trainer::{EpochEnd, EpochObserver, VectorSpace};
pub use error::{Product2VecError, Result};
pub use logger::{EpochLogger, EpochRecord};
pub use model::{Product2Vec, Relation};
