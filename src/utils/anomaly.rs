//! Collection point for non-fatal trace anomalies.

use super::error::ReconstructionAnomaly;
use log::warn;

/// Ordered record of every anomaly reported while processing one trace
#[derive(Debug, Clone, Default)]
pub struct AnomalyLog {
    entries: Vec<ReconstructionAnomaly>,
}

impl AnomalyLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Log the anomaly and keep it for later inspection
    pub fn report(&mut self, anomaly: ReconstructionAnomaly) {
        warn!("{}", anomaly);
        self.entries.push(anomaly);
    }

    /// Append anomalies already logged elsewhere
    pub fn extend(&mut self, other: AnomalyLog) {
        self.entries.extend(other.entries);
    }

    pub fn entries(&self) -> &[ReconstructionAnomaly] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
