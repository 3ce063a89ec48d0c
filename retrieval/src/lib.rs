pub mod config;
pub mod engine;
pub mod error;
pub mod index;
pub mod persist;
pub mod store;
pub mod tokenizer;

pub use config::{EngineConfig, TokenizerConfig};
pub use engine::Engine;
pub use error::{EngineError, Result};
pub use index::{Posting, ScoringIndex};
pub use store::{Document, DocumentStore, Metadata, NewDocument};
pub use tokenizer::{Script, Tokenizer};
