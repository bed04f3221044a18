//! Detector orchestration
//!
//! For each transaction the engine asks the [`Suppressor`] first, fans out
//! across the enabled detectors, scores the combined signals and applies the
//! severity ceiling. The profile and recent history are set up front with
//! [`AnomalyEngine::update_profile`] and are read-only afterwards, so
//! evaluation needs no locks and batches run on the rayon pool.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::alert::{Alert, AlertFormatter};
use super::detectors::{build_detectors, Detector, DetectorKind};
use super::scorer::Scorer;
use super::suppress::Suppressor;
use super::types::{AnomalyResult, TransactionContext};
use crate::cancel::CancelToken;
use crate::config::EngineConfig;
use crate::dates;
use crate::error::{Error, Result};
use crate::models::ClassifiedTransaction;
use crate::profile::UserProfile;

const DEFAULT_USER: &str = "default";

/// Anomaly document keyed by transaction id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnomalyRecord {
    pub transaction_id: String,
    pub user_id: String,
    pub result: AnomalyResult,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alert: Option<Alert>,
}

pub struct AnomalyEngine {
    config: EngineConfig,
    detectors: Vec<Box<dyn Detector>>,
    suppressor: Suppressor,
    scorer: Scorer,
    formatter: AlertFormatter,
    profile: UserProfile,
    /// Most recent transactions, oldest first
    history: Vec<ClassifiedTransaction>,
}

impl AnomalyEngine {
    /// Engine with the built-in detectors enabled in `config`
    pub fn new(config: EngineConfig) -> Result<Self> {
        config.validate()?;
        let detectors = build_detectors(
            &config.thresholds,
            &config.detectors,
            config.duplicate_scan_window,
        );
        Ok(Self::assemble(config, detectors))
    }

    /// Engine with a caller-chosen detector set
    pub fn with_detectors(config: EngineConfig, detectors: Vec<Box<dyn Detector>>) -> Result<Self> {
        config.validate()?;
        Ok(Self::assemble(config, detectors))
    }

    fn assemble(config: EngineConfig, detectors: Vec<Box<dyn Detector>>) -> Self {
        debug!(
            detectors = detectors.len(),
            preset = %config.preset,
            rule_version = %config.rule_version,
            "Anomaly engine ready"
        );
        Self {
            config,
            detectors,
            suppressor: Suppressor::new(),
            scorer: Scorer::new(),
            formatter: AlertFormatter::new(),
            profile: UserProfile::default(),
            history: Vec::new(),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn profile(&self) -> &UserProfile {
        &self.profile
    }

    pub fn detector_kinds(&self) -> Vec<DetectorKind> {
        self.detectors.iter().map(|d| d.kind()).collect()
    }

    /// Rebuild the profile from `history` and keep its most recent window
    pub fn update_profile(&mut self, history: &[ClassifiedTransaction]) {
        self.profile = UserProfile::build(history);
        let start = history.len().saturating_sub(self.config.history_window);
        self.history = history[start..].to_vec();
        info!(
            transactions = history.len(),
            expenses = self.profile.expense_count,
            window = self.history.len(),
            "Profile updated"
        );
    }

    /// Evaluate one live transaction against the stored history.
    ///
    /// If `tx` is part of the stored window only the transactions before it
    /// count as history.
    pub fn evaluate(&self, tx: &ClassifiedTransaction) -> AnomalyResult {
        let history = match self.history.iter().position(|h| h.id == tx.id) {
            Some(i) => &self.history[..i],
            None => &self.history[..],
        };
        let cancel = CancelToken::new();
        let (timestamp, timestamp_parsed) = dates::timestamp_or_now(&tx.raw.date);
        self.evaluate_context(&TransactionContext {
            tx,
            history,
            timestamp,
            timestamp_parsed,
            user_id: DEFAULT_USER,
            cancel: &cancel,
        })
    }

    /// Suppress, detect, score and cap. Never fails: detector errors are
    /// logged and dropped.
    pub fn evaluate_context(&self, ctx: &TransactionContext<'_>) -> AnomalyResult {
        let rule = self.suppressor.check(ctx.tx);
        if rule.skip {
            let reason = rule.reason.unwrap_or_else(|| "Trusted transaction".to_string());
            let mut result = AnomalyResult::empty(reason);
            result.suppressed = true;
            return result;
        }

        let mut signals = Vec::new();
        for detector in &self.detectors {
            if ctx.cancel.is_cancelled() {
                debug!(transaction = %ctx.tx.id, "Evaluation cancelled");
                break;
            }
            match detector.detect(ctx, &self.profile) {
                Ok(found) => signals.extend(found),
                Err(e) => {
                    warn!(
                        detector = %detector.kind(),
                        transaction = %ctx.tx.id,
                        error = %e,
                        "Detector failed"
                    );
                }
            }
        }

        let mut result = self.scorer.score(signals);
        self.scorer.apply_cap(&mut result, &rule);
        debug!(
            transaction = %ctx.tx.id,
            user = ctx.user_id,
            score = result.final_score,
            severity = %result.severity,
            signals = result.signals.len(),
            "Evaluated transaction"
        );
        result
    }

    /// Evaluate a chronological batch in parallel. Each transaction sees the
    /// batch items before it as history. Output order equals input order.
    pub fn evaluate_batch(
        &self,
        txs: &[ClassifiedTransaction],
        user_id: &str,
        cancel: &CancelToken,
    ) -> Result<Vec<AnomalyRecord>> {
        let window = self.config.history_window;
        let records: Vec<AnomalyRecord> = txs
            .par_iter()
            .enumerate()
            .map(|(i, tx)| {
                let (timestamp, timestamp_parsed) = dates::timestamp_or_now(&tx.raw.date);
                let ctx = TransactionContext {
                    tx,
                    history: &txs[i.saturating_sub(window)..i],
                    timestamp,
                    timestamp_parsed,
                    user_id,
                    cancel,
                };
                let result = self.evaluate_context(&ctx);
                let alert = self.alert_for(&result, tx);
                AnomalyRecord {
                    transaction_id: tx.id.clone(),
                    user_id: user_id.to_string(),
                    result,
                    alert,
                }
            })
            .collect();

        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        let flagged = records
            .iter()
            .filter(|r| !r.result.signals.is_empty())
            .count();
        info!(user = user_id, evaluated = records.len(), flagged, "Batch evaluated");
        Ok(records)
    }

    pub fn alert_for(&self, result: &AnomalyResult, tx: &ClassifiedTransaction) -> Option<Alert> {
        self.formatter.format(result, tx, &self.profile)
    }
}
