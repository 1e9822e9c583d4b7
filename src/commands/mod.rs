pub mod db;
pub mod score_log;
pub mod scoring;
pub mod settings;
pub mod sources;
