//! Anomaly detection
//!
//! Evaluates classified transactions against the user's behavioural profile
//! and renders the outcome as a plain-language alert.
//!
//! ## Pipeline
//!
//! - **Suppressor** skips or caps trusted transactions
//! - **Detectors** (rule, statistical, duplicate, pattern, income, ML stub)
//!   each emit signals
//! - **Scorer** aggregates signals into a score, severity and risk flags
//! - **AlertFormatter** writes the title, message and suggested action
//!
//! Signal and context types live in [`types`], which depends on nothing in
//! this module, so detectors never import the engine.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use ledgerlens_core::anomaly::AnomalyEngine;
//! use ledgerlens_core::config::EngineConfig;
//!
//! let mut engine = AnomalyEngine::new(EngineConfig::default())?;
//! engine.update_profile(&history);
//! let result = engine.evaluate(&tx);
//! let alert = engine.alert_for(&result, &tx);
//! ```

pub mod alert;
pub mod detectors;
pub mod engine;
pub mod scorer;
pub mod suppress;
pub mod types;

pub use alert::{format_inr, format_inr_compact, Alert, AlertFormatter};
pub use detectors::{Detector, DetectorKind};
pub use engine::{AnomalyEngine, AnomalyRecord};
pub use scorer::Scorer;
pub use suppress::{SuppressionRule, Suppressor};
pub use types::{
    AnomalyResult, AnomalySignal, RiskFlag, Severity, SignalCategory, SignalCode,
    TransactionContext,
};
