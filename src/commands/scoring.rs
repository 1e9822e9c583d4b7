use crate::analysis::calculator::calculate_score;
use crate::analysis::health::latest_per_system;
use crate::analysis::trend::{classify_trend, reference_window};
use crate::analysis::weights::{WeightTables, STANDARD_WEIGHTS};
use crate::commands::db::SqliteStore;
use crate::commands::score_log::ScoreLogger;
use crate::commands::settings::{load_engine_settings, EngineSettings};
use crate::commands::sources::{read_signals, HistoryStore, SignalReader};
use crate::errors::{HistoryOp, PostureError, PostureResult};
use crate::models::signal::{Severity, SignalKind, SignalSnapshot};
use crate::models::snapshot::*;
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;

/// Computes the posture score, keeps its history and derives the trend.
pub struct ScoreEngine {
    signals: Arc<dyn SignalReader>,
    history: Arc<dyn HistoryStore>,
    weights: WeightTables,
    settings: EngineSettings,
    logger: ScoreLogger,
}

impl ScoreEngine {
    pub fn new(
        signals: Arc<dyn SignalReader>,
        history: Arc<dyn HistoryStore>,
        settings: EngineSettings,
    ) -> Self {
        let logger = ScoreLogger::new(
            history.clone(),
            settings.day_boundary,
            settings.serialize_score_logging,
        );
        Self {
            signals,
            history,
            weights: STANDARD_WEIGHTS,
            settings,
            logger,
        }
    }

    pub fn with_weights(mut self, weights: WeightTables) -> Self {
        self.weights = weights;
        self
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Current score with no side effects.
    pub fn get_score(&self) -> PostureResult<CurrentScore> {
        self.get_score_at(Utc::now())
    }

    pub fn get_score_at(&self, now: DateTime<Utc>) -> PostureResult<CurrentScore> {
        let signals = self.read_signals_at(now)?;
        Ok(CurrentScore {
            score: self.score(&signals),
            evaluated_at: now,
        })
    }

    /// Current score and trend; may append to history.
    pub fn get_score_with_trend(&self) -> PostureResult<ScoreReport> {
        self.get_score_with_trend_at(Utc::now())
    }

    pub fn get_score_with_trend_at(&self, now: DateTime<Utc>) -> PostureResult<ScoreReport> {
        let signals = self.read_signals_at(now)?;
        self.evaluate(&signals, now)
    }

    /// Counts behind the dashboard header plus a full score evaluation.
    pub fn dashboard_overview(&self) -> PostureResult<DashboardOverview> {
        self.dashboard_overview_at(Utc::now())
    }

    pub fn dashboard_overview_at(&self, now: DateTime<Utc>) -> PostureResult<DashboardOverview> {
        let signals = self.read_signals_at(now)?;
        let report = self.evaluate(&signals, now)?;

        Ok(DashboardOverview {
            total_events: signals.events.len(),
            active_threats: signals.threats.len(),
            open_vulnerabilities: signals.vulnerabilities.len(),
            monitored_systems: latest_per_system(&signals.systems).len(),
            security_score: report.score,
            trend: report.trend,
        })
    }

    /// Open vulnerabilities per named severity, critical first. Unrecognised
    /// severities are left out.
    pub fn vulnerability_distribution(&self) -> PostureResult<Vec<SeverityCount>> {
        let open = self
            .signals
            .read_open_vulnerabilities()
            .map_err(|e| PostureError::signal(SignalKind::Vulnerabilities, e))?;

        let buckets = [
            Severity::Critical,
            Severity::High,
            Severity::Medium,
            Severity::Low,
            Severity::Info,
        ];
        Ok(buckets
            .into_iter()
            .map(|severity| {
                let count = open.iter().filter(|v| v.severity == severity).count();
                SeverityCount { severity, count }
            })
            .collect())
    }

    pub fn latest_logged_score(&self) -> PostureResult<Option<ScoreSnapshot>> {
        self.history
            .find_latest()
            .map_err(|e| PostureError::history(HistoryOp::FindLatest, e))
    }

    pub fn score_history(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> PostureResult<Vec<ScoreSnapshot>> {
        self.history
            .list_between(start, end)
            .map_err(|e| PostureError::history(HistoryOp::ListRange, e))
    }

    fn read_signals_at(&self, now: DateTime<Utc>) -> PostureResult<SignalSnapshot> {
        let window_start = now - Duration::hours(i64::from(self.settings.event_window_hours));
        read_signals(self.signals.as_ref(), window_start, now).map_err(|e| {
            log::error!("score evaluation aborted: {e}");
            e
        })
    }

    fn score(&self, signals: &SignalSnapshot) -> f64 {
        let score = calculate_score(signals, &self.weights);
        log::debug!(
            "computed score {score} from {} vulnerabilities, {} threats, {} events, {} health records",
            signals.vulnerabilities.len(),
            signals.threats.len(),
            signals.events.len(),
            signals.systems.len()
        );
        score
    }

    fn evaluate(&self, signals: &SignalSnapshot, now: DateTime<Utc>) -> PostureResult<ScoreReport> {
        let score = self.score(signals);

        let log_outcome = match self.logger.log_if_changed(score, now) {
            Ok(outcome) => outcome,
            Err(e) => {
                log::warn!("score {score} was computed but not logged: {e}");
                LogOutcome::Failed
            }
        };

        let trend = self.trend(score, now)?;
        Ok(ScoreReport {
            score,
            trend,
            evaluated_at: now,
            log: log_outcome,
        })
    }

    fn trend(&self, current: f64, now: DateTime<Utc>) -> PostureResult<Trend> {
        let window = reference_window(now, self.settings.day_boundary);
        let reference = self.history.find_latest_for_day(&window).map_err(|e| {
            let err = PostureError::history(HistoryOp::FindForDay, e);
            log::error!("cannot determine trend for {}: {err}", window.day);
            err
        })?;

        if reference.is_none() {
            log::debug!("no score history for {}; trend is stable", window.day);
        }

        Ok(classify_trend(
            current,
            reference.map(|s| s.score),
            self.settings.trend_band,
        ))
    }
}

/// Async entry points for request handlers. Work runs on the blocking pool.
#[derive(Clone)]
pub struct PostureService {
    engine: Arc<ScoreEngine>,
}

impl PostureService {
    pub fn new(engine: ScoreEngine) -> Self {
        Self {
            engine: Arc::new(engine),
        }
    }

    /// Engine over `<data_dir>/.posture/state.db` using `<data_dir>/.posture/settings.json`.
    pub fn open(data_dir: &str) -> PostureResult<Self> {
        let settings = load_engine_settings(data_dir)?;
        let store = Arc::new(SqliteStore::open(data_dir)?);
        log::info!("posture engine ready at {data_dir} ({settings:?})");
        Ok(Self::new(ScoreEngine::new(store.clone(), store, settings)))
    }

    pub fn engine(&self) -> &Arc<ScoreEngine> {
        &self.engine
    }

    pub async fn get_score(&self) -> PostureResult<CurrentScore> {
        let engine = self.engine.clone();
        tokio::task::spawn_blocking(move || engine.get_score()).await?
    }

    pub async fn get_score_with_trend(&self) -> PostureResult<ScoreReport> {
        let engine = self.engine.clone();
        tokio::task::spawn_blocking(move || engine.get_score_with_trend()).await?
    }

    pub async fn dashboard_overview(&self) -> PostureResult<DashboardOverview> {
        let engine = self.engine.clone();
        tokio::task::spawn_blocking(move || engine.dashboard_overview()).await?
    }

    pub async fn vulnerability_distribution(&self) -> PostureResult<Vec<SeverityCount>> {
        let engine = self.engine.clone();
        tokio::task::spawn_blocking(move || engine.vulnerability_distribution()).await?
    }

    pub async fn score_history(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> PostureResult<Vec<ScoreSnapshot>> {
        let engine = self.engine.clone();
        tokio::task::spawn_blocking(move || engine.score_history(start, end)).await?
    }
}
