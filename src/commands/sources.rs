use crate::analysis::day::DayWindow;
use crate::errors::{PostureError, PostureResult, SourceError};
use crate::models::signal::*;
use crate::models::snapshot::ScoreSnapshot;
use chrono::{DateTime, Utc};

/// Read-only access to current security state.
pub trait SignalReader: Send + Sync {
    /// Only vulnerabilities that are open at call time.
    fn read_open_vulnerabilities(&self) -> Result<Vec<VulnerabilityRecord>, SourceError>;

    fn read_active_threats(&self) -> Result<Vec<ThreatRecord>, SourceError>;

    /// Events with `window_start <= timestamp < window_end`.
    fn read_recent_events(
        &self,
        window_start: DateTime<Utc>,
        window_end: DateTime<Utc>,
    ) -> Result<Vec<EventRecord>, SourceError>;

    fn read_system_health(&self) -> Result<Vec<HealthRecord>, SourceError>;
}

/// Append-only score history.
pub trait HistoryStore: Send + Sync {
    /// Most recent snapshot inside `day`, if any.
    fn find_latest_for_day(&self, day: &DayWindow) -> Result<Option<ScoreSnapshot>, SourceError>;

    fn find_latest(&self) -> Result<Option<ScoreSnapshot>, SourceError>;

    /// Snapshots with `start <= timestamp < end`, oldest first.
    fn list_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<ScoreSnapshot>, SourceError>;

    fn append(&self, score: f64, timestamp: DateTime<Utc>) -> Result<ScoreSnapshot, SourceError>;
}

/// Read all four categories. Any single failure aborts the whole read.
pub fn read_signals(
    reader: &dyn SignalReader,
    window_start: DateTime<Utc>,
    window_end: DateTime<Utc>,
) -> PostureResult<SignalSnapshot> {
    let vulnerabilities = reader
        .read_open_vulnerabilities()
        .map_err(|e| PostureError::signal(SignalKind::Vulnerabilities, e))?;
    let threats = reader
        .read_active_threats()
        .map_err(|e| PostureError::signal(SignalKind::Threats, e))?;
    let events = reader
        .read_recent_events(window_start, window_end)
        .map_err(|e| PostureError::signal(SignalKind::Events, e))?;
    let systems = reader
        .read_system_health()
        .map_err(|e| PostureError::signal(SignalKind::SystemHealth, e))?;

    Ok(SignalSnapshot {
        vulnerabilities,
        threats,
        events,
        systems,
    })
}
