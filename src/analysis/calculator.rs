use crate::analysis::health::latest_per_system;
use crate::analysis::weights::WeightTables;
use crate::models::signal::SignalSnapshot;

pub const BASE_SCORE: f64 = 100.0;
pub const MIN_SCORE: f64 = 0.0;
pub const MAX_SCORE: f64 = 100.0;

/// Posture score (0–100, one decimal) for a signal snapshot.
pub fn calculate_score(signals: &SignalSnapshot, weights: &WeightTables) -> f64 {
    let mut score = BASE_SCORE;

    score += signals
        .vulnerabilities
        .iter()
        .map(|v| weights.vulnerability.weight(&v.severity))
        .sum::<f64>();

    score += signals
        .threats
        .iter()
        .map(|t| weights.threat.weight(&t.severity))
        .sum::<f64>();

    score += signals
        .events
        .iter()
        .map(|e| weights.event.weight(&e.severity))
        .sum::<f64>();

    score += latest_per_system(&signals.systems)
        .into_iter()
        .map(|s| weights.health.weight(&s.status))
        .sum::<f64>();

    round_score(score)
}

/// Clamp to [0, 100], then round to tenths: 73.449999 -> 73.4.
pub fn round_score(raw: f64) -> f64 {
    if raw.is_nan() {
        return MIN_SCORE;
    }
    let clamped = raw.clamp(MIN_SCORE, MAX_SCORE);
    (clamped * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::weights::STANDARD_WEIGHTS;
    use crate::models::signal::*;
    use chrono::{TimeZone, Utc};

    fn health(id: &str, status: HealthStatus, secs: i64) -> HealthRecord {
        HealthRecord {
            system_id: id.to_string(),
            status,
            last_heartbeat: Utc.timestamp_opt(secs, 0).unwrap(),
        }
    }

    fn event(severity: Severity) -> EventRecord {
        EventRecord {
            severity,
            timestamp: Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
        }
    }

    #[test]
    fn empty_signals_score_exactly_one_hundred() {
        assert_eq!(calculate_score(&SignalSnapshot::default(), &STANDARD_WEIGHTS), 100.0);
    }

    #[test]
    fn single_offline_system_scores_ninety_seven() {
        let signals = SignalSnapshot {
            systems: vec![health("sys-a", HealthStatus::Offline, 10)],
            ..Default::default()
        };
        assert_eq!(calculate_score(&signals, &STANDARD_WEIGHTS), 97.0);
    }

    #[test]
    fn duplicate_system_records_apply_only_the_latest() {
        let signals = SignalSnapshot {
            systems: vec![
                health("sys-a", HealthStatus::Online, 10),
                health("sys-a", HealthStatus::Offline, 20),
            ],
            ..Default::default()
        };
        assert_eq!(calculate_score(&signals, &STANDARD_WEIGHTS), 97.0);
    }

    #[test]
    fn mixes_all_categories() {
        let signals = SignalSnapshot {
            vulnerabilities: vec![
                VulnerabilityRecord { severity: Severity::High },
                VulnerabilityRecord { severity: Severity::Info },
            ],
            threats: vec![ThreatRecord { severity: Severity::Medium }],
            events: vec![event(Severity::Medium), event(Severity::Low)],
            systems: vec![
                health("sys-a", HealthStatus::Degraded, 1),
                health("sys-b", HealthStatus::Other("patching".to_string()), 1),
            ],
        };
        // 100 - 5 - 3 - 0.5 - 0.1 - 3 - 1
        assert_eq!(calculate_score(&signals, &STANDARD_WEIGHTS), 87.4);
    }

    #[test]
    fn worst_case_clamps_to_zero() {
        let signals = SignalSnapshot {
            vulnerabilities: vec![VulnerabilityRecord { severity: Severity::Critical }; 20],
            threats: vec![ThreatRecord { severity: Severity::Critical }; 20],
            events: vec![event(Severity::Critical); 20],
            systems: (0..20)
                .map(|i| health(&format!("sys-{i}"), HealthStatus::Offline, 1))
                .collect(),
        };
        assert_eq!(calculate_score(&signals, &STANDARD_WEIGHTS), 0.0);
    }

    #[test]
    fn score_stays_within_bounds_for_growing_event_counts() {
        for count in 0..300 {
            let signals = SignalSnapshot {
                events: vec![event(Severity::Low); count],
                ..Default::default()
            };
            let score = calculate_score(&signals, &STANDARD_WEIGHTS);
            assert!((MIN_SCORE..=MAX_SCORE).contains(&score), "{count} events gave {score}");
        }
    }

    #[test]
    fn rounds_half_up_on_tenths() {
        assert_eq!(round_score(73.449999), 73.4);
        assert_eq!(round_score(73.46), 73.5);
        assert_eq!(round_score(-4.0), 0.0);
        assert_eq!(round_score(120.0), 100.0);
        assert_eq!(round_score(f64::NAN), 0.0);
    }
}
