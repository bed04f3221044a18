//! Anomaly detectors
//!
//! Each detector is a pure function of a [`TransactionContext`] and the
//! read-only [`UserProfile`]. Detectors never mutate the profile, and they
//! check the cancellation token between signals.

pub mod duplicate;
pub mod income;
pub mod ml;
pub mod pattern;
pub mod rule;
pub mod statistical;

pub use duplicate::DuplicateDetector;
pub use income::IncomeDetector;
pub use ml::MlDetector;
pub use pattern::PatternDetector;
pub use rule::RuleDetector;
pub use statistical::StatisticalDetector;

use serde::{Deserialize, Serialize};

use super::types::{AnomalySignal, TransactionContext};
use crate::config::{DetectorToggles, Thresholds};
use crate::profile::UserProfile;
use crate::Result;

/// Identifies a detector implementation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectorKind {
    Rule,
    Statistical,
    Duplicate,
    Pattern,
    Income,
    Ml,
}

impl DetectorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Rule => "rule",
            Self::Statistical => "statistical",
            Self::Duplicate => "duplicate",
            Self::Pattern => "pattern",
            Self::Income => "income",
            Self::Ml => "ml",
        }
    }

    pub fn is_enabled(&self, toggles: &DetectorToggles) -> bool {
        match self {
            Self::Rule => toggles.rule,
            Self::Statistical => toggles.statistical,
            Self::Duplicate => toggles.duplicate,
            Self::Pattern => toggles.pattern,
            Self::Income => toggles.income,
            Self::Ml => toggles.ml,
        }
    }
}

impl std::fmt::Display for DetectorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Produces signals for one transaction
pub trait Detector: Send + Sync {
    fn kind(&self) -> DetectorKind;

    /// Inspect `ctx` against `profile`. An `Err` is logged by the engine and
    /// treated as no signals.
    fn detect(&self, ctx: &TransactionContext<'_>, profile: &UserProfile)
        -> Result<Vec<AnomalySignal>>;
}

/// Built-in detectors enabled by `toggles`, in evaluation order
pub fn build_detectors(
    thresholds: &Thresholds,
    toggles: &DetectorToggles,
    duplicate_scan_window: usize,
) -> Vec<Box<dyn Detector>> {
    let all: Vec<Box<dyn Detector>> = vec![
        Box::new(RuleDetector::new(thresholds.clone())),
        Box::new(StatisticalDetector::new(thresholds.clone())),
        Box::new(DuplicateDetector::new(thresholds.clone(), duplicate_scan_window)),
        Box::new(PatternDetector::new(thresholds.clone())),
        Box::new(IncomeDetector::new(thresholds.clone())),
        Box::new(MlDetector::new()),
    ];
    all.into_iter()
        .filter(|d| d.kind().is_enabled(toggles))
        .collect()
}

/// Linear interpolation of `value` from `[lo, hi]` onto `[from, to]`, clamped
pub(crate) fn interpolate(value: f64, lo: f64, hi: f64, from: f64, to: f64) -> f64 {
    if hi <= lo {
        return to;
    }
    let t = ((value - lo) / (hi - lo)).clamp(0.0, 1.0);
    from + t * (to - from)
}
