//! LedgerLens Core Library
//!
//! Turns raw bank statement rows into classified transactions and
//! behavioural insights:
//! - Narration classification (payment method, counterparty, category)
//! - Spending profiles and recurring payment detection
//! - Anomaly engine with suppression, detectors, scoring and alert text
//! - Engine configuration with threshold presets
//! - Chunk store and embedding client for the retrieval pipeline

pub mod anomaly;
pub mod cancel;
pub mod classify;
pub mod config;
pub mod dates;
pub mod embed;
pub mod error;
pub mod models;
pub mod parse;
pub mod profile;
pub mod recurring;
pub mod store;

/// Test utilities including mock Ollama server
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use anomaly::{Alert, AnomalyEngine, AnomalyRecord, AnomalyResult, AnomalySignal, Severity};
pub use cancel::CancelToken;
pub use classify::Classifier;
pub use config::{EngineConfig, Preset, Thresholds};
pub use embed::{embed_batch, Embedder, OllamaEmbedder};
pub use error::{Error, Result};
pub use models::{Category, ClassifiedTransaction, Method, RawTransaction, RULE_VERSION};
pub use profile::UserProfile;
pub use recurring::{RecurringDetector, RecurringGroup};
pub use store::{Chunk, ChunkStore, MemoryChunkStore, SqliteChunkStore};
