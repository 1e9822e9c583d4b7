use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The four signal categories that feed the posture score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalKind {
    Vulnerabilities,
    Threats,
    Events,
    SystemHealth,
}

impl fmt::Display for SignalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SignalKind::Vulnerabilities => "vulnerabilities",
            SignalKind::Threats => "threats",
            SignalKind::Events => "events",
            SignalKind::SystemHealth => "system_health",
        };
        f.write_str(name)
    }
}

/// Severity shared by vulnerabilities, threats and events.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Critical,
    High,
    Medium,
    Low,
    Info,
    /// Classification text this crate does not recognise.
    Other(String),
}

impl Severity {
    /// Case-insensitive parse; anything unknown is kept as `Other`.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "critical" => Severity::Critical,
            "high" => Severity::High,
            "medium" => Severity::Medium,
            "low" => Severity::Low,
            "info" => Severity::Info,
            _ => Severity::Other(raw.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Online,
    Offline,
    Degraded,
    Unknown,
    Other(String),
}

impl HealthStatus {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "online" => HealthStatus::Online,
            "offline" => HealthStatus::Offline,
            "degraded" => HealthStatus::Degraded,
            "unknown" => HealthStatus::Unknown,
            _ => HealthStatus::Other(raw.to_string()),
        }
    }
}

/// An open vulnerability.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VulnerabilityRecord {
    pub severity: Severity,
}

/// An active threat.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThreatRecord {
    pub severity: Severity,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    pub severity: Severity,
    pub timestamp: DateTime<Utc>,
}

/// One heartbeat of a monitored system. Several may exist per `system_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthRecord {
    pub system_id: String,
    pub status: HealthStatus,
    pub last_heartbeat: DateTime<Utc>,
}

/// Point-in-time read of all four signal categories.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SignalSnapshot {
    pub vulnerabilities: Vec<VulnerabilityRecord>,
    pub threats: Vec<ThreatRecord>,
    pub events: Vec<EventRecord>,
    pub systems: Vec<HealthRecord>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_classifications_case_insensitively() {
        assert_eq!(Severity::parse("CRITICAL"), Severity::Critical);
        assert_eq!(Severity::parse(" low "), Severity::Low);
        assert_eq!(HealthStatus::parse("Degraded"), HealthStatus::Degraded);
    }

    #[test]
    fn keeps_unrecognised_text() {
        assert_eq!(Severity::parse("severe"), Severity::Other("severe".to_string()));
        assert_eq!(
            HealthStatus::parse("maintenance"),
            HealthStatus::Other("maintenance".to_string())
        );
    }
}
