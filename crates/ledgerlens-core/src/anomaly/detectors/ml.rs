//! Placeholder for a learned detector
//!
//! Registered like any other detector so a trained model can replace it
//! without touching the engine.

use super::{Detector, DetectorKind};
use crate::anomaly::types::{AnomalySignal, TransactionContext};
use crate::profile::UserProfile;
use crate::Result;

#[derive(Debug, Clone, Copy, Default)]
pub struct MlDetector;

impl MlDetector {
    pub fn new() -> Self {
        Self
    }
}

impl Detector for MlDetector {
    fn kind(&self) -> DetectorKind {
        DetectorKind::Ml
    }

    fn detect(
        &self,
        _ctx: &TransactionContext<'_>,
        _profile: &UserProfile,
    ) -> Result<Vec<AnomalySignal>> {
        Ok(Vec::new())
    }
}
