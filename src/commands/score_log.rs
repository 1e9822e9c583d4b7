use crate::analysis::day::DayBoundary;
use crate::commands::sources::HistoryStore;
use crate::errors::{HistoryOp, PostureError, PostureResult};
use crate::models::snapshot::LogOutcome;
use chrono::{DateTime, Utc};
use std::sync::{Arc, Mutex, PoisonError};

/// Appends a history entry when today's latest entry is missing or differs.
/// With `serialize` on, the read and the append share one critical section.
pub struct ScoreLogger {
    history: Arc<dyn HistoryStore>,
    boundary: DayBoundary,
    guard: Option<Mutex<()>>,
}

impl ScoreLogger {
    pub fn new(history: Arc<dyn HistoryStore>, boundary: DayBoundary, serialize: bool) -> Self {
        Self {
            history,
            boundary,
            guard: serialize.then(|| Mutex::new(())),
        }
    }

    pub fn log_if_changed(&self, score: f64, now: DateTime<Utc>) -> PostureResult<LogOutcome> {
        match &self.guard {
            Some(guard) => {
                // The mutex guards no data, so a poisoned lock is still usable.
                let _held = guard.lock().unwrap_or_else(PoisonError::into_inner);
                self.check_then_append(score, now)
            }
            None => self.check_then_append(score, now),
        }
    }

    fn check_then_append(&self, score: f64, now: DateTime<Utc>) -> PostureResult<LogOutcome> {
        let today = self.boundary.window_containing(now);
        let today_log = self
            .history
            .find_latest_for_day(&today)
            .map_err(|e| PostureError::history(HistoryOp::FindForDay, e))?;

        if let Some(existing) = &today_log {
            if existing.score == score {
                log::debug!("score {score} unchanged since {}; not logging", existing.timestamp);
                return Ok(LogOutcome::Unchanged);
            }
        }

        let written = self
            .history
            .append(score, now)
            .map_err(|e| PostureError::history(HistoryOp::Append, e))?;
        log::info!(
            "logged security score {} at {} (previous today: {})",
            written.score,
            written.timestamp,
            today_log
                .map(|s| s.score.to_string())
                .unwrap_or_else(|| "none".to_string())
        );
        Ok(LogOutcome::Appended)
    }
}
