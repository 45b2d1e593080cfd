use crate::models::snapshot::TimestampPrecision;
use log::LevelFilter;
use serde_json::{json, Map, Value};
use std::fs;
use std::path::{Path, PathBuf};

const SETTINGS_SCHEMA_VERSION: i64 = 2;

#[derive(Debug, Clone, PartialEq)]
pub struct EffectiveRankingSettings {
    pub publish_max_attempts: u32,
    pub snapshot_history_limit: usize,
    pub timestamp_precision: TimestampPrecision,
    pub log_level: LevelFilter,
}

impl Default for EffectiveRankingSettings {
    fn default() -> Self {
        EffectiveRankingSettings {
            publish_max_attempts: 3,
            snapshot_history_limit: 100,
            timestamp_precision: TimestampPrecision::Millis,
            log_level: LevelFilter::Info,
        }
    }
}

pub async fn get_settings(data_dir: String) -> Result<Value, String> {
    load_settings_from_disk(&data_dir)
}

pub async fn save_settings(data_dir: String, settings: Value) -> Result<Value, String> {
    save_settings_to_disk(&data_dir, settings)
}

pub fn load_effective_settings(data_dir: &str) -> Result<EffectiveRankingSettings, String> {
    let settings = load_settings_from_disk(data_dir)?;
    Ok(effective_from_value(&settings))
}

fn effective_from_value(settings: &Value) -> EffectiveRankingSettings {
    let defaults = EffectiveRankingSettings::default();

    EffectiveRankingSettings {
        publish_max_attempts: settings
            .get("publishMaxAttempts")
            .and_then(Value::as_u64)
            .map(|v| v.clamp(1, 10) as u32)
            .unwrap_or(defaults.publish_max_attempts),
        snapshot_history_limit: settings
            .get("snapshotHistoryLimit")
            .and_then(Value::as_u64)
            .map(|v| v.clamp(1, 500) as usize)
            .unwrap_or(defaults.snapshot_history_limit),
        timestamp_precision: settings
            .get("timestampPrecision")
            .and_then(Value::as_str)
            .map(TimestampPrecision::from_setting)
            .unwrap_or(defaults.timestamp_precision),
        log_level: settings
            .get("logLevel")
            .and_then(Value::as_str)
            .and_then(|level| level.parse().ok())
            .unwrap_or(defaults.log_level),
    }
}

pub fn load_settings_from_disk(data_dir: &str) -> Result<Value, String> {
    let path = settings_path(data_dir);
    ensure_rankboard_dir(data_dir)?;

    let original = if path.exists() {
        let raw = fs::read_to_string(&path)
            .map_err(|e| format!("Failed to read settings.json: {e}"))?;
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

pub fn save_settings_to_disk(data_dir: &str, settings: Value) -> Result<Value, String> {
    let path = settings_path(data_dir);
    ensure_rankboard_dir(data_dir)?;

    let mut merged = load_settings_from_disk(data_dir).unwrap_or_else(|_| default_settings());
    merge_settings(&mut merged, &settings);

    let migrated = migrate_settings(merged);
    write_settings_file(&path, &migrated)?;
    Ok(migrated)
}

fn settings_path(data_dir: &str) -> PathBuf {
    Path::new(data_dir).join(".rankboard").join("settings.json")
}

fn ensure_rankboard_dir(data_dir: &str) -> Result<(), String> {
    let dir = Path::new(data_dir).join(".rankboard");
    fs::create_dir_all(&dir).map_err(|e| format!("Failed to create .rankboard directory: {e}"))
}

fn write_settings_file(path: &Path, settings: &Value) -> Result<(), String> {
    let raw = serde_json::to_string_pretty(settings)
        .map_err(|e| format!("Failed to serialize settings: {e}"))?;
    fs::write(path, raw).map_err(|e| format!("Failed to write settings.json: {e}"))
}

fn migrate_settings(input: Value) -> Value {
    let mut out = match input {
        Value::Object(map) => Value::Object(map),
        _ => Value::Object(Map::new()),
    };

    let version = out
        .get("schema_version")
        .and_then(Value::as_i64)
        .unwrap_or(0);

    if version < 2 {
        // V1 counted retries after the first attempt; V2 counts attempts.
        migrate_retries_to_attempts(&mut out);
    }

    deep_merge_defaults(&mut out, &default_settings());
    sanitize_settings(&mut out);
    if let Some(obj) = out.as_object_mut() {
        obj.insert("schema_version".to_string(), json!(SETTINGS_SCHEMA_VERSION));
    }

    out
}

fn default_settings() -> Value {
    json!({
        "schema_version": SETTINGS_SCHEMA_VERSION,
        "publishMaxAttempts": 3,
        "snapshotHistoryLimit": 100,
        "timestampPrecision": "millis",
        "logLevel": "info"
    })
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

fn migrate_retries_to_attempts(settings: &mut Value) {
    let Some(obj) = settings.as_object_mut() else {
        return;
    };

    if let Some(retries) = obj.remove("maxRetries").as_ref().and_then(Value::as_u64) {
        obj.entry("publishMaxAttempts".to_string())
            .or_insert(json!(retries + 1));
    }
}

fn sanitize_settings(settings: &mut Value) {
    let Some(obj) = settings.as_object_mut() else {
        return;
    };

    clamp_u64(obj, "publishMaxAttempts", 1, 10, 3);
    clamp_u64(obj, "snapshotHistoryLimit", 1, 500, 100);

    sanitize_enum(obj, "timestampPrecision", &["millis", "seconds"], "millis");
    sanitize_enum(obj, "logLevel", &["error", "warn", "info", "debug", "trace"], "info");
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
