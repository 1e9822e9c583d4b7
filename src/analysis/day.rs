use chrono::{DateTime, Duration, Local, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Which midnight splits history into calendar days.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DayBoundary {
    #[default]
    Local,
    Utc,
}

/// Half-open span `[start, end)` covering one calendar day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DayWindow {
    pub day: NaiveDate,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl DayWindow {
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.start <= at && at < self.end
    }
}

impl DayBoundary {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "local" => Some(DayBoundary::Local),
            "utc" => Some(DayBoundary::Utc),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DayBoundary::Local => "local",
            DayBoundary::Utc => "utc",
        }
    }

    /// The calendar day containing `at`, with its bounds.
    pub fn window_containing(&self, at: DateTime<Utc>) -> DayWindow {
        let day = match self {
            DayBoundary::Local => at.with_timezone(&Local).date_naive(),
            DayBoundary::Utc => at.date_naive(),
        };
        let next = day.succ_opt().unwrap_or(day);
        DayWindow {
            day,
            start: self.midnight(day),
            end: self.midnight(next),
        }
    }

    fn midnight(&self, day: NaiveDate) -> DateTime<Utc> {
        let naive: NaiveDateTime = day.and_hms_opt(0, 0, 0).unwrap_or_default();
        match self {
            DayBoundary::Utc => Utc.from_utc_datetime(&naive),
            // A DST gap can swallow midnight; fall forward an hour in that case.
            DayBoundary::Local => Local
                .from_local_datetime(&naive)
                .earliest()
                .or_else(|| Local.from_local_datetime(&(naive + Duration::hours(1))).earliest())
                .map(|dt| dt.with_timezone(&Utc))
                .unwrap_or_else(|| Utc.from_utc_datetime(&naive)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    #[test]
    fn utc_window_spans_midnight_to_midnight() {
        let window = DayBoundary::Utc.window_containing(at("2024-03-10T15:30:00Z"));
        assert_eq!(window.day, NaiveDate::from_ymd_opt(2024, 3, 10).unwrap());
        assert_eq!(window.start, at("2024-03-10T00:00:00Z"));
        assert_eq!(window.end, at("2024-03-11T00:00:00Z"));
    }

    #[test]
    fn window_is_half_open() {
        let window = DayBoundary::Utc.window_containing(at("2024-03-10T00:00:00Z"));
        assert!(window.contains(at("2024-03-10T00:00:00Z")));
        assert!(window.contains(at("2024-03-10T23:59:59Z")));
        assert!(!window.contains(at("2024-03-11T00:00:00Z")));
    }

    #[test]
    fn local_window_contains_its_instant() {
        let now = at("2024-07-01T12:00:00Z");
        let window = DayBoundary::Local.window_containing(now);
        assert!(window.contains(now));
        assert!(window.end > window.start);
    }

    #[test]
    fn parses_known_names_only() {
        assert_eq!(DayBoundary::parse("utc"), Some(DayBoundary::Utc));
        assert_eq!(DayBoundary::parse("local"), Some(DayBoundary::Local));
        assert_eq!(DayBoundary::parse("mars"), None);
    }
}
