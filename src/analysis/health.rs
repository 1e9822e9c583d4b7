use crate::models::signal::HealthRecord;
use std::collections::HashMap;

/// One record per `system_id`, the latest heartbeat winning (first seen on ties).
pub fn latest_per_system(records: &[HealthRecord]) -> Vec<&HealthRecord> {
    let mut latest: HashMap<&str, &HealthRecord> = HashMap::new();

    for record in records {
        match latest.get(record.system_id.as_str()) {
            Some(existing) if record.last_heartbeat <= existing.last_heartbeat => {}
            _ => {
                latest.insert(record.system_id.as_str(), record);
            }
        }
    }

    let mut kept: Vec<&HealthRecord> = latest.into_values().collect();
    kept.sort_by(|a, b| a.system_id.cmp(&b.system_id));
    kept
}
