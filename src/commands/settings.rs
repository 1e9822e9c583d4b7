use crate::analysis::day::DayBoundary;
use crate::analysis::trend::DEFAULT_TREND_BAND;
use crate::commands::db::DATA_DIR_NAME;
use crate::errors::{PostureError, PostureResult};
use serde_json::{json, Map, Value};
use std::fs;
use std::path::{Path, PathBuf};

const SETTINGS_SCHEMA_VERSION: i64 = 2;

#[derive(Debug, Clone, PartialEq)]
pub struct EngineSettings {
    pub trend_band: f64,
    pub event_window_hours: u32,
    pub day_boundary: DayBoundary,
    /// Run the score logger's check-then-append under a lock.
    pub serialize_score_logging: bool,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            trend_band: DEFAULT_TREND_BAND,
            event_window_hours: 24,
            day_boundary: DayBoundary::Local,
            serialize_score_logging: true,
        }
    }
}

impl EngineSettings {
    /// Build typed settings from an already sanitized settings document.
    pub fn from_value(settings: &Value) -> Self {
        let defaults = Self::default();
        Self {
            trend_band: settings
                .get("trendBand")
                .and_then(Value::as_f64)
                .unwrap_or(defaults.trend_band),
            event_window_hours: settings
                .get("eventWindowHours")
                .and_then(Value::as_u64)
                .map(|h| h.clamp(1, 168) as u32)
                .unwrap_or(defaults.event_window_hours),
            day_boundary: settings
                .get("dayBoundary")
                .and_then(Value::as_str)
                .and_then(DayBoundary::parse)
                .unwrap_or(defaults.day_boundary),
            serialize_score_logging: settings
                .get("serializeScoreLogging")
                .and_then(Value::as_bool)
                .unwrap_or(defaults.serialize_score_logging),
        }
    }
}

pub fn get_settings(data_dir: &str) -> PostureResult<Value> {
    load_settings_from_disk(data_dir)
}

pub fn save_settings(data_dir: &str, settings: Value) -> PostureResult<Value> {
    save_settings_to_disk(data_dir, settings)
}

pub fn load_engine_settings(data_dir: &str) -> PostureResult<EngineSettings> {
    let settings = load_settings_from_disk(data_dir)?;
    Ok(EngineSettings::from_value(&settings))
}

pub fn load_settings_from_disk(data_dir: &str) -> PostureResult<Value> {
    let path = settings_path(data_dir);
    ensure_data_dir(data_dir)?;

    let original = if path.exists() {
        let raw = fs::read_to_string(&path).map_err(|e| PostureError::io(e, &path))?;
        serde_json::from_str::<Value>(&raw).unwrap_or_else(|e| {
            log::warn!("settings.json is not valid JSON ({e}); falling back to defaults");
            json!({})
        })
    } else {
        json!({})
    };

    let migrated = migrate_settings(original.clone());
    if migrated != original || !path.exists() {
        write_settings_file(&path, &migrated)?;
    }

    Ok(migrated)
}

pub fn save_settings_to_disk(data_dir: &str, settings: Value) -> PostureResult<Value> {
    if !settings.is_object() {
        return Err(PostureError::Settings(
            "settings update must be a JSON object".to_string(),
        ));
    }

    let path = settings_path(data_dir);
    ensure_data_dir(data_dir)?;

    let mut merged = load_settings_from_disk(data_dir).unwrap_or_else(|_| default_settings());
    merge_settings(&mut merged, &settings);

    let migrated = migrate_settings(merged);
    write_settings_file(&path, &migrated)?;
    Ok(migrated)
}

fn settings_path(data_dir: &str) -> PathBuf {
    Path::new(data_dir).join(DATA_DIR_NAME).join("settings.json")
}

fn ensure_data_dir(data_dir: &str) -> PostureResult<()> {
    let dir = Path::new(data_dir).join(DATA_DIR_NAME);
    fs::create_dir_all(&dir).map_err(|e| PostureError::io(e, dir))
}

fn write_settings_file(path: &Path, settings: &Value) -> PostureResult<()> {
    let raw = serde_json::to_string_pretty(settings)?;
    fs::write(path, raw).map_err(|e| PostureError::io(e, path))
}

fn migrate_settings(input: Value) -> Value {
    let defaults = default_settings();
    let mut out = match input {
        Value::Object(map) => Value::Object(map),
        _ => Value::Object(Map::new()),
    };

    let version = out
        .get("schema_version")
        .and_then(Value::as_i64)
        .unwrap_or(0);

    if version < 2 {
        // V1 named the hysteresis band "trendThreshold".
        migrate_trend_threshold(&mut out);
    }

    deep_merge_defaults(&mut out, &defaults);
    sanitize_settings(&mut out);
    if let Some(obj) = out.as_object_mut() {
        obj.insert("schema_version".to_string(), json!(SETTINGS_SCHEMA_VERSION));
    }

    out
}

fn default_settings() -> Value {
    let defaults = EngineSettings::default();
    json!({
        "schema_version": SETTINGS_SCHEMA_VERSION,
        "trendBand": defaults.trend_band,
        "eventWindowHours": defaults.event_window_hours,
        "dayBoundary": defaults.day_boundary.as_str(),
        "serializeScoreLogging": defaults.serialize_score_logging
    })
}

fn migrate_trend_threshold(settings: &mut Value) {
    let Some(obj) = settings.as_object_mut() else {
        return;
    };
    let Some(band) = obj.remove("trendThreshold").and_then(|v| v.as_f64()) else {
        return;
    };
    obj.entry("trendBand".to_string()).or_insert(json!(band));
}

fn deep_merge_defaults(target: &mut Value, defaults: &Value) {
    let (Some(target_obj), Some(default_obj)) = (target.as_object_mut(), defaults.as_object()) else {
        return;
    };

    for (key, default_value) in default_obj {
        match target_obj.get_mut(key) {
            Some(existing) => {
                if existing.is_object() && default_value.is_object() {
                    deep_merge_defaults(existing, default_value);
                }
            }
            None => {
                target_obj.insert(key.clone(), default_value.clone());
            }
        }
    }
}

fn merge_settings(target: &mut Value, incoming: &Value) {
    match (target, incoming) {
        (Value::Object(target_obj), Value::Object(incoming_obj)) => {
            for (key, value) in incoming_obj {
                if let Some(existing) = target_obj.get_mut(key) {
                    merge_settings(existing, value);
                } else {
                    target_obj.insert(key.clone(), value.clone());
                }
            }
        }
        (target_slot, incoming_value) => {
            *target_slot = incoming_value.clone();
        }
    }
}

fn sanitize_settings(settings: &mut Value) {
    let Some(obj) = settings.as_object_mut() else {
        return;
    };

    clamp_f64(obj, "trendBand", 0.0, 10.0, DEFAULT_TREND_BAND);
    clamp_u64(obj, "eventWindowHours", 1, 168, 24);
    sanitize_enum(obj, "dayBoundary", &["local", "utc"], "local");
    ensure_bool(obj, "serializeScoreLogging", true);
}

fn clamp_f64(map: &mut Map<String, Value>, key: &str, min: f64, max: f64, default: f64) {
    let raw = map
        .get(key)
        .and_then(Value::as_f64)
        .filter(|v| v.is_finite())
        .unwrap_or(default);
    map.insert(key.to_string(), json!(raw.clamp(min, max)));
}

fn clamp_u64(map: &mut Map<String, Value>, key: &str, min: u64, max: u64, default: u64) {
    let raw = map.get(key).and_then(Value::as_u64).unwrap_or(default);
    map.insert(key.to_string(), json!(raw.clamp(min, max)));
}

fn sanitize_enum(map: &mut Map<String, Value>, key: &str, allowed: &[&str], default: &str) {
    let valid = map
        .get(key)
        .and_then(Value::as_str)
        .filter(|value| allowed.contains(value))
        .unwrap_or(default);
    map.insert(key.to_string(), json!(valid));
}

fn ensure_bool(map: &mut Map<String, Value>, key: &str, default: bool) {
    let value = map.get(key).and_then(Value::as_bool).unwrap_or(default);
    map.insert(key.to_string(), json!(value));
}
