//! History record type

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

use crate::types::Update;

/// One line of the history log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: u64,
    /// Time of the state change, in the configured timezone
    pub date: DateTime<FixedOffset>,
    pub state_id: u32,
    pub alert: bool,
}

impl Record {
    /// Build the record for `update`, stamped with `id`
    pub fn from_update(id: u64, update: &Update) -> Self {
        let region = &update.region;
        Self {
            id,
            date: region
                .changed_at
                .unwrap_or_else(|| chrono::Utc::now().fixed_offset()),
            state_id: region.id,
            alert: region.alert,
        }
    }

    pub fn to_json_line(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn from_json_line(line: &str) -> serde_json::Result<Self> {
        serde_json::from_str(line)
    }
}
