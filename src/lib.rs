pub mod analysis;
pub mod commands;
pub mod errors;
pub mod models;

pub use analysis::weights::{WeightTables, STANDARD_WEIGHTS};
pub use commands::db::SqliteStore;
pub use commands::scoring::{PostureService, ScoreEngine};
pub use commands::settings::EngineSettings;
pub use commands::sources::{HistoryStore, SignalReader};
pub use errors::{PostureError, PostureResult, SourceError};
pub use models::snapshot::{DashboardOverview, ScoreReport, ScoreSnapshot, SeverityCount, Trend};

/// Install env_logger with an `info` default. Later calls are ignored.
pub fn init_logging() {
    let env = env_logger::Env::default().default_filter_or("info");
    let _ = env_logger::Builder::from_env(env).format_timestamp_millis().try_init();
}
