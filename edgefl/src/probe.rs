//! Battery and process-CPU probes. Failures surface as sentinel values, never errors,
//! so gating stays defined for every reading.

#[cfg(target_os = "linux")]
use std::fs;
#[cfg(target_os = "linux")]
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;
use tracing::{debug, warn};

use crate::types::{ResourceSnapshot, BATTERY_UNREADABLE};

/// Battery reported by hosts without a battery.
pub const BATTERY_ABSENT_DEFAULT: i32 = 100;

pub trait ResourceProbe: Send + Sync {
    /// 0..=100, `-1` when unreadable, `100` when the host has no battery.
    fn read_battery(&self) -> i32;

    /// Process CPU% over `window`. Blocks the calling thread for `window`.
    fn read_cpu_percent(&self, window: Duration) -> f64;

    fn snapshot(&self, window: Duration) -> ResourceSnapshot {
        let battery = self.read_battery();
        let cpu = self.read_cpu_percent(window);
        ResourceSnapshot::new(battery, cpu)
    }
}

/// Probe backed by the host OS.
pub struct SystemProbe {
    // non-Linux fallback: sysinfo's accumulated per-process CPU time
    #[cfg_attr(target_os = "linux", allow(dead_code))]
    sys: Mutex<sysinfo::System>,
}

impl SystemProbe {
    pub fn new() -> Self {
        Self {
            sys: Mutex::new(sysinfo::System::new()),
        }
    }
}

impl Default for SystemProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl ResourceProbe for SystemProbe {
    fn read_battery(&self) -> i32 {
        #[cfg(target_os = "linux")]
        {
            battery_from_power_supply(Path::new("/sys/class/power_supply"))
        }
        #[cfg(not(target_os = "linux"))]
        {
            BATTERY_ABSENT_DEFAULT
        }
    }

    fn read_cpu_percent(&self, window: Duration) -> f64 {
        let secs = window.as_secs_f64();
        if secs <= 0.0 {
            return 0.0;
        }
        let pct = self.cpu_over_window(window).unwrap_or_else(|| {
            warn!("process cpu probe unavailable; reporting 0");
            0.0
        });
        debug!(cpu = pct, window_ms = window.as_millis() as u64, "cpu sample");
        round1(pct)
    }
}

impl SystemProbe {
    // Linux: (process jiffies delta / total jiffies delta) * cores * 100.
    // Total jiffies tick once per core per clock tick, so this equals
    // cpu_seconds / window_seconds * 100 without needing CLK_TCK.
    #[cfg(target_os = "linux")]
    fn cpu_over_window(&self, window: Duration) -> Option<f64> {
        let (total0, cores) = read_total_jiffies()?;
        let proc0 = read_self_jiffies()?;
        std::thread::sleep(window);
        let (total1, _) = read_total_jiffies()?;
        let proc1 = read_self_jiffies()?;
        let dt = total1.saturating_sub(total0);
        if dt == 0 {
            return Some(0.0);
        }
        let dp = proc1.saturating_sub(proc0);
        Some(dp as f64 / dt as f64 * cores as f64 * 100.0)
    }

    #[cfg(not(target_os = "linux"))]
    fn cpu_over_window(&self, window: Duration) -> Option<f64> {
        use sysinfo::{ProcessRefreshKind, ProcessesToUpdate};

        let pid = sysinfo::get_current_pid().ok()?;
        let sample = |sys: &mut sysinfo::System| -> Option<u64> {
            sys.refresh_processes_specifics(
                ProcessesToUpdate::Some(&[pid]),
                true,
                ProcessRefreshKind::nothing().with_cpu(),
            );
            sys.process(pid).map(|p| p.accumulated_cpu_time())
        };
        let t0 = {
            let mut sys = self.sys.lock().ok()?;
            sample(&mut *sys)?
        };
        std::thread::sleep(window);
        let t1 = {
            let mut sys = self.sys.lock().ok()?;
            sample(&mut *sys)?
        };
        // accumulated_cpu_time is in CPU-milliseconds
        let cpu_secs = t1.saturating_sub(t0) as f64 / 1000.0;
        Some(cpu_secs / window.as_secs_f64() * 100.0)
    }
}

fn round1(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}

/// Scans a `power_supply` class directory for a `Battery` and returns its capacity.
/// No battery entry at all means a mains-powered host.
#[cfg(target_os = "linux")]
pub(crate) fn battery_from_power_supply(root: &Path) -> i32 {
    let entries = match fs::read_dir(root) {
        Ok(e) => e,
        Err(_) => return BATTERY_ABSENT_DEFAULT,
    };
    for entry in entries.flatten() {
        let dir = entry.path();
        let kind = fs::read_to_string(dir.join("type")).unwrap_or_default();
        if kind.trim() != "Battery" {
            continue;
        }
        return match fs::read_to_string(dir.join("capacity")) {
            Ok(s) => match s.trim().parse::<i32>() {
                Ok(v) => v.clamp(0, 100),
                Err(_) => {
                    warn!(path = %dir.display(), "unparseable battery capacity");
                    BATTERY_UNREADABLE
                }
            },
            Err(e) => {
                warn!(path = %dir.display(), "battery capacity unreadable: {e}");
                BATTERY_UNREADABLE
            }
        };
    }
    BATTERY_ABSENT_DEFAULT
}

// /proc/stat first line: "cpu  user nice system idle iowait irq softirq steal ..."
// Returns the summed jiffies and the number of per-core "cpuN" lines.
#[cfg(target_os = "linux")]
fn read_total_jiffies() -> Option<(u64, usize)> {
    let s = fs::read_to_string("/proc/stat").ok()?;
    let mut lines = s.lines();
    let first = lines.next()?;
    let mut it = first.split_whitespace();
    if it.next()? != "cpu" {
        return None;
    }
    let sum = it
        .take(8)
        .filter_map(|tok| tok.parse::<u64>().ok())
        .fold(0u64, |acc, v| acc.saturating_add(v));
    let cores = lines
        .take_while(|l| l.starts_with("cpu"))
        .filter(|l| l.as_bytes().get(3).is_some_and(u8::is_ascii_digit))
        .count()
        .max(1);
    Some((sum, cores))
}

#[cfg(target_os = "linux")]
fn read_self_jiffies() -> Option<u64> {
    let s = fs::read_to_string("/proc/self/stat").ok()?;
    parse_stat_jiffies(&s)
}

// utime + stime from a /proc/<pid>/stat line. The comm field may contain spaces,
// so fields are counted from the closing parenthesis.
#[cfg(target_os = "linux")]
fn parse_stat_jiffies(stat: &str) -> Option<u64> {
    let rpar = stat.rfind(')')?;
    let after = stat.get(rpar + 2..)?;
    let mut it = after.split_whitespace();
    // utime is 11 fields after "state", stime follows
    let utime = it.nth(11)?.parse::<u64>().ok()?;
    let stime = it.next()?.parse::<u64>().ok()?;
    Some(utime.saturating_add(stime))
}
