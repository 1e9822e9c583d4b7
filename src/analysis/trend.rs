use crate::analysis::day::{DayBoundary, DayWindow};
use crate::models::snapshot::Trend;
use chrono::{DateTime, Duration, Utc};

/// Default hysteresis band, in score points.
pub const DEFAULT_TREND_BAND: f64 = 1.0;

/// Calendar day holding `now - 24h`. Near midnight this is not always
/// "yesterday"; keep it that way.
pub fn reference_window(now: DateTime<Utc>, boundary: DayBoundary) -> DayWindow {
    boundary.window_containing(now - Duration::hours(24))
}

/// Compare `current` to the reference score with an exclusive band.
pub fn classify_trend(current: f64, reference: Option<f64>, band: f64) -> Trend {
    let Some(reference) = reference else {
        return Trend::Stable;
    };

    if current > reference + band {
        Trend::Up
    } else if current < reference - band {
        Trend::Down
    } else {
        Trend::Stable
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_around_the_band() {
        assert_eq!(classify_trend(81.5, Some(80.0), DEFAULT_TREND_BAND), Trend::Up);
        assert_eq!(classify_trend(80.5, Some(80.0), DEFAULT_TREND_BAND), Trend::Stable);
        assert_eq!(classify_trend(78.9, Some(80.0), DEFAULT_TREND_BAND), Trend::Down);
    }

    #[test]
    fn band_edges_are_stable() {
        assert_eq!(classify_trend(81.0, Some(80.0), DEFAULT_TREND_BAND), Trend::Stable);
        assert_eq!(classify_trend(79.0, Some(80.0), DEFAULT_TREND_BAND), Trend::Stable);
    }

    #[test]
    fn missing_reference_is_stable() {
        assert_eq!(classify_trend(0.0, None, DEFAULT_TREND_BAND), Trend::Stable);
        assert_eq!(classify_trend(100.0, None, DEFAULT_TREND_BAND), Trend::Stable);
    }

    #[test]
    fn reference_is_lookback_day_not_previous_calendar_day() {
        let now = DateTime::parse_from_rfc3339("2024-05-02T00:30:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let window = reference_window(now, DayBoundary::Utc);
        assert_eq!(window.day.to_string(), "2024-05-01");

        let now = DateTime::parse_from_rfc3339("2024-05-02T23:59:00Z")
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(reference_window(now, DayBoundary::Utc).day.to_string(), "2024-05-01");
    }
}
