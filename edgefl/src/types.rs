//! Round data model and the JSON report sent to the collector.
//! Keep `ReportPayload` minimal and stable; it defines the wire format.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Battery value reported when the platform cannot answer.
pub const BATTERY_UNREADABLE: i32 = -1;

/// One instantaneous battery/CPU reading. Never cached past its sampling instant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResourceSnapshot {
    pub battery_percent: i32,
    pub cpu_percent: f64,
}

impl ResourceSnapshot {
    pub fn new(battery_percent: i32, cpu_percent: f64) -> Self {
        Self {
            battery_percent,
            cpu_percent,
        }
    }

    pub fn battery_known(&self) -> bool {
        self.battery_percent != BATTERY_UNREADABLE
    }

    // "Battery 80% | CPU 12.5%"
    pub fn status_line(&self) -> String {
        format!(
            "Battery {}% | CPU {:.1}%",
            self.battery_percent, self.cpu_percent
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    BatteryLow,
    CpuHigh,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::BatteryLow => f.write_str("battery low"),
            SkipReason::CpuHigh => f.write_str("cpu high"),
        }
    }
}

/// Resource thresholds a device must satisfy before a round may start.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GatePolicy {
    pub battery_min: i32,
    pub cpu_max: f64,
}

impl Default for GatePolicy {
    fn default() -> Self {
        Self {
            battery_min: 30,
            cpu_max: 50.0,
        }
    }
}

impl GatePolicy {
    /// Battery is checked first, so a snapshot failing both thresholds reports
    /// `BatteryLow`. An unreadable battery (-1) is always below the threshold.
    pub fn evaluate(&self, snapshot: &ResourceSnapshot) -> Result<(), SkipReason> {
        if snapshot.battery_percent < self.battery_min {
            return Err(SkipReason::BatteryLow);
        }
        if snapshot.cpu_percent > self.cpu_max {
            return Err(SkipReason::CpuHigh);
        }
        Ok(())
    }
}

/// Timing for one round.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RoundConfig {
    pub time_budget: Duration,
    pub monitor_interval: Duration,
    // how long each CPU read blocks
    pub cpu_sample_window: Duration,
}

impl Default for RoundConfig {
    fn default() -> Self {
        Self {
            time_budget: Duration::from_secs(3 * 60),
            monitor_interval: Duration::from_secs(60),
            cpu_sample_window: Duration::from_millis(500),
        }
    }
}

/// Outcome of a single attempt. Built once, reported once, then dropped by the controller.
#[derive(Debug, Clone, PartialEq)]
pub enum RoundResult {
    Skipped {
        snapshot: ResourceSnapshot,
        reason: SkipReason,
    },
    Completed {
        accuracy: f64,
        start: ResourceSnapshot,
        end: ResourceSnapshot,
        peak_cpu: f64,
    },
}

impl RoundResult {
    pub fn to_payload(&self, device_id: String) -> ReportPayload {
        match self {
            RoundResult::Skipped { snapshot, .. } => ReportPayload {
                device_id,
                accuracy: Reading::Skipped(SkippedTag::Skipped),
                battery: snapshot.battery_percent,
                cpu: snapshot.cpu_percent as i64,
                max_cpu: Reading::Skipped(SkippedTag::Skipped),
            },
            RoundResult::Completed {
                accuracy,
                end,
                peak_cpu,
                ..
            } => ReportPayload {
                device_id,
                accuracy: Reading::Value(round_to(*accuracy, 3)),
                battery: end.battery_percent,
                cpu: end.cpu_percent as i64,
                max_cpu: Reading::Value(*peak_cpu as i64),
            },
        }
    }
}

pub(crate) fn round_to(v: f64, decimals: i32) -> f64 {
    let scale = 10f64.powi(decimals);
    (v * scale).round() / scale
}

/// Serializes as the bare string `"skipped"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SkippedTag {
    Skipped,
}

/// A measured value, or the literal `"skipped"` when no round ran.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Reading<T> {
    Value(T),
    Skipped(SkippedTag),
}

impl<T> Reading<T> {
    pub fn is_skipped(&self) -> bool {
        matches!(self, Reading::Skipped(_))
    }
}

/// JSON body POSTed to the collector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportPayload {
    pub device_id: String,
    pub accuracy: Reading<f64>,
    pub battery: i32,
    pub cpu: i64,
    #[serde(rename = "maxCPU")]
    pub max_cpu: Reading<i64>,
}

/// Events posted to the UI context. Progress is advisory; the terminal event closes a round.
#[derive(Debug, Clone, PartialEq)]
pub enum RoundEvent {
    /// Gating passed and training is starting.
    Status(String),
    Progress { elapsed: Duration, cpu_percent: f64 },
    Terminal { text: String, enable_start: bool },
}

impl RoundEvent {
    pub fn text(&self) -> String {
        match self {
            RoundEvent::Status(text) => text.clone(),
            RoundEvent::Progress {
                elapsed,
                cpu_percent,
            } => format!(
                "Training… {} elapsed\nCPU now ≈ {:.1}%",
                fmt_elapsed(*elapsed),
                cpu_percent
            ),
            RoundEvent::Terminal { text, .. } => text.clone(),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, RoundEvent::Terminal { .. })
    }
}

fn fmt_elapsed(d: Duration) -> String {
    let secs = d.as_secs();
    if secs >= 60 && secs % 60 == 0 {
        format!("{} min", secs / 60)
    } else if secs >= 60 {
        format!("{}m{:02}s", secs / 60, secs % 60)
    } else {
        format!("{:.1}s", d.as_secs_f64())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn battery_is_checked_before_cpu() {
        let policy = GatePolicy::default();
        let both_bad = ResourceSnapshot::new(10, 90.0);
        assert_eq!(policy.evaluate(&both_bad), Err(SkipReason::BatteryLow));
        let cpu_bad = ResourceSnapshot::new(90, 50.1);
        assert_eq!(policy.evaluate(&cpu_bad), Err(SkipReason::CpuHigh));
    }

    #[test]
    fn thresholds_are_inclusive_on_the_passing_side() {
        let policy = GatePolicy::default();
        assert!(policy.evaluate(&ResourceSnapshot::new(30, 50.0)).is_ok());
        assert_eq!(
            policy.evaluate(&ResourceSnapshot::new(29, 0.0)),
            Err(SkipReason::BatteryLow)
        );
    }

    #[test]
    fn unreadable_battery_never_passes() {
        let policy = GatePolicy {
            battery_min: 0,
            cpu_max: 100.0,
        };
        let snap = ResourceSnapshot::new(BATTERY_UNREADABLE, 0.0);
        assert!(!snap.battery_known());
        assert_eq!(policy.evaluate(&snap), Err(SkipReason::BatteryLow));
    }

    #[test]
    fn gating_is_deterministic() {
        let policy = GatePolicy::default();
        for b in [-1, 0, 29, 30, 31, 100] {
            for c in [0.0, 49.9, 50.0, 50.1, 250.0] {
                let first = policy.evaluate(&ResourceSnapshot::new(b, c));
                let second = policy.evaluate(&ResourceSnapshot::new(b, c));
                assert_eq!(first, second);
            }
        }
    }

    #[test]
    fn skipped_payload_matches_wire_format() {
        let result = RoundResult::Skipped {
            snapshot: ResourceSnapshot::new(20, 10.0),
            reason: SkipReason::BatteryLow,
        };
        let body = serde_json::to_value(result.to_payload("acme-phone".into())).unwrap();
        assert_eq!(
            body,
            json!({
                "device_id": "acme-phone",
                "accuracy": "skipped",
                "battery": 20,
                "cpu": 10,
                "maxCPU": "skipped",
            })
        );
    }

    #[test]
    fn completed_payload_rounds_and_truncates() {
        let result = RoundResult::Completed {
            accuracy: 0.87654,
            start: ResourceSnapshot::new(90, 3.0),
            end: ResourceSnapshot::new(88, 97.9),
            peak_cpu: 101.7,
        };
        let body = serde_json::to_value(result.to_payload("dev".into())).unwrap();
        assert_eq!(body["accuracy"], json!(0.877));
        assert_eq!(body["battery"], json!(88));
        assert_eq!(body["cpu"], json!(97));
        assert_eq!(body["maxCPU"], json!(101));
    }

    #[test]
    fn skipped_literal_deserializes_back() {
        let p: ReportPayload = serde_json::from_str(
            r#"{"device_id":"x","accuracy":"skipped","battery":5,"cpu":1,"maxCPU":"skipped"}"#,
        )
        .unwrap();
        assert!(p.accuracy.is_skipped());
        assert!(p.max_cpu.is_skipped());
    }

    #[test]
    fn progress_text_uses_minutes_on_whole_minutes() {
        let ev = RoundEvent::Progress {
            elapsed: Duration::from_secs(120),
            cpu_percent: 12.34,
        };
        assert_eq!(ev.text(), "Training… 2 min elapsed\nCPU now ≈ 12.3%");
        assert!(!ev.is_terminal());
    }
}
