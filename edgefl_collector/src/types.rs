//! Report schema as the collector sees it. Mirrors edgefl's payload.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Reading<T> {
    Value(T),
    // any string, in practice "skipped"
    Marker(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub device_id: String,
    pub accuracy: Reading<f64>,
    pub battery: i32,
    pub cpu: i64,
    #[serde(rename = "maxCPU")]
    pub max_cpu: Reading<i64>,
}

impl Report {
    pub fn skipped(&self) -> bool {
        matches!(self.accuracy, Reading::Marker(_))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Received {
    pub received_at: DateTime<Utc>,
    #[serde(flatten)]
    pub report: Report,
}
