use crate::models::signal::{HealthStatus, Severity};
use serde::Serialize;

/// Score delta per severity for one signal category.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SeverityWeights {
    pub critical: f64,
    pub high: f64,
    pub medium: f64,
    pub low: f64,
    pub info: f64,
    /// Applied to classifications the table has no row for.
    pub unmapped: f64,
}

impl SeverityWeights {
    pub fn weight(&self, severity: &Severity) -> f64 {
        match severity {
            Severity::Critical => self.critical,
            Severity::High => self.high,
            Severity::Medium => self.medium,
            Severity::Low => self.low,
            Severity::Info => self.info,
            Severity::Other(_) => self.unmapped,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct HealthWeights {
    pub online: f64,
    pub offline: f64,
    pub degraded: f64,
    pub unknown: f64,
    pub unmapped: f64,
}

impl HealthWeights {
    pub fn weight(&self, status: &HealthStatus) -> f64 {
        match status {
            HealthStatus::Online => self.online,
            HealthStatus::Offline => self.offline,
            HealthStatus::Degraded => self.degraded,
            HealthStatus::Unknown => self.unknown,
            HealthStatus::Other(_) => self.unmapped,
        }
    }
}

/// Immutable, versioned weight tables. Shared by reference; never mutated.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct WeightTables {
    pub version: u32,
    pub vulnerability: SeverityWeights,
    pub threat: SeverityWeights,
    pub event: SeverityWeights,
    pub health: HealthWeights,
}

/// Threat and event tables have no INFO row, so INFO falls to `unmapped` (0).
pub const STANDARD_WEIGHTS: WeightTables = WeightTables {
    version: 1,
    vulnerability: SeverityWeights {
        critical: -10.0,
        high: -5.0,
        medium: -2.0,
        low: -1.0,
        info: 0.0,
        unmapped: 0.0,
    },
    threat: SeverityWeights {
        critical: -15.0,
        high: -7.0,
        medium: -3.0,
        low: -1.0,
        info: 0.0,
        unmapped: 0.0,
    },
    event: SeverityWeights {
        critical: -5.0,
        high: -2.0,
        medium: -0.5,
        low: -0.1,
        info: 0.0,
        unmapped: 0.0,
    },
    health: HealthWeights {
        online: 0.0,
        offline: -3.0,
        degraded: -3.0,
        unknown: -1.0,
        unmapped: -1.0,
    },
};

impl Default for WeightTables {
    fn default() -> Self {
        STANDARD_WEIGHTS
    }
}
