//! Layered settings: built-in defaults < JSON config file < EDGEFL_* env < CLI flags.
//! Config file: $XDG_CONFIG_HOME/edgefl/config.json (fallback ~/.config/edgefl/config.json)

use serde::{Deserialize, Serialize};
use std::{fs, path::Path, path::PathBuf, time::Duration};
use tracing::warn;
use url::Url;

use crate::error::ConfigError;
use crate::report::{DEFAULT_ENDPOINT, DEFAULT_TIMEOUT};
use crate::types::{GatePolicy, RoundConfig};

/// Optional values from one configuration layer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Overrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub battery_min: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cpu_max: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_budget_secs: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub monitor_secs: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cpu_window_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report_timeout_secs: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_id: Option<String>,
}

impl Overrides {
    /// Values set in `higher` win.
    pub fn merge(self, higher: Overrides) -> Overrides {
        Overrides {
            endpoint: higher.endpoint.or(self.endpoint),
            battery_min: higher.battery_min.or(self.battery_min),
            cpu_max: higher.cpu_max.or(self.cpu_max),
            time_budget_secs: higher.time_budget_secs.or(self.time_budget_secs),
            monitor_secs: higher.monitor_secs.or(self.monitor_secs),
            cpu_window_ms: higher.cpu_window_ms.or(self.cpu_window_ms),
            report_timeout_secs: higher.report_timeout_secs.or(self.report_timeout_secs),
            device_id: higher.device_id.or(self.device_id),
        }
    }

    /// Reads `EDGEFL_*` variables through `get`. Unparseable values are ignored.
    pub fn from_env_with<F>(get: F) -> Overrides
    where
        F: Fn(&str) -> Option<String>,
    {
        fn parsed<T: std::str::FromStr>(key: &str, v: Option<String>) -> Option<T> {
            let v = v?;
            match v.trim().parse() {
                Ok(x) => Some(x),
                Err(_) => {
                    warn!("ignoring {key}={v:?}: not a valid value");
                    None
                }
            }
        }
        Overrides {
            endpoint: get("EDGEFL_ENDPOINT").filter(|s| !s.is_empty()),
            battery_min: parsed("EDGEFL_BATTERY_MIN", get("EDGEFL_BATTERY_MIN")),
            cpu_max: parsed("EDGEFL_CPU_MAX", get("EDGEFL_CPU_MAX")),
            time_budget_secs: parsed("EDGEFL_TIME_BUDGET_SECS", get("EDGEFL_TIME_BUDGET_SECS")),
            monitor_secs: parsed("EDGEFL_MONITOR_SECS", get("EDGEFL_MONITOR_SECS")),
            cpu_window_ms: None,
            report_timeout_secs: None,
            device_id: get("EDGEFL_DEVICE_ID").filter(|s| !s.is_empty()),
        }
    }

    pub fn from_env() -> Overrides {
        Self::from_env_with(|k| std::env::var(k).ok())
    }
}

/// Fully resolved, validated settings.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub endpoint: Url,
    pub report_timeout: Duration,
    pub policy: GatePolicy,
    pub round: RoundConfig,
    pub device_id: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            endpoint: Url::parse(DEFAULT_ENDPOINT).expect("default endpoint is a valid URL"),
            report_timeout: DEFAULT_TIMEOUT,
            policy: GatePolicy::default(),
            round: RoundConfig::default(),
            device_id: None,
        }
    }
}

fn secs(field: &'static str, v: f64) -> Result<Duration, ConfigError> {
    Duration::try_from_secs_f64(v).map_err(|e| ConfigError::Invalid {
        field,
        reason: e.to_string(),
    })
}

impl Settings {
    pub fn from_overrides(o: Overrides) -> Result<Settings, ConfigError> {
        let mut s = Settings::default();

        if let Some(raw) = o.endpoint {
            s.endpoint = parse_endpoint(&raw)?;
        }
        if let Some(b) = o.battery_min {
            if !(0..=100).contains(&b) {
                return Err(ConfigError::Invalid {
                    field: "battery_min",
                    reason: format!("{b} is outside 0..=100"),
                });
            }
            s.policy.battery_min = b;
        }
        if let Some(c) = o.cpu_max {
            if !c.is_finite() || c < 0.0 {
                return Err(ConfigError::Invalid {
                    field: "cpu_max",
                    reason: format!("{c} must be a non-negative number"),
                });
            }
            s.policy.cpu_max = c;
        }
        if let Some(v) = o.time_budget_secs {
            s.round.time_budget = secs("time_budget_secs", v)?;
        }
        if let Some(v) = o.monitor_secs {
            s.round.monitor_interval = secs("monitor_secs", v)?;
        }
        if s.round.monitor_interval.is_zero() {
            return Err(ConfigError::Invalid {
                field: "monitor_secs",
                reason: "must be greater than zero".into(),
            });
        }
        if let Some(ms) = o.cpu_window_ms {
            s.round.cpu_sample_window = Duration::from_millis(ms);
        }
        if let Some(v) = o.report_timeout_secs {
            s.report_timeout = secs("report_timeout_secs", v)?;
        }
        s.device_id = o.device_id;
        Ok(s)
    }
}

pub fn parse_endpoint(raw: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(raw).map_err(|e| ConfigError::Endpoint {
        url: raw.to_string(),
        reason: e.to_string(),
    })?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(ConfigError::Endpoint {
            url: raw.to_string(),
            reason: format!("unsupported scheme {other:?}"),
        }),
    }
}

pub fn config_dir() -> PathBuf {
    if let Some(xdg) = std::env::var_os("XDG_CONFIG_HOME") {
        PathBuf::from(xdg).join("edgefl")
    } else {
        dirs_next::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("edgefl")
    }
}

pub fn config_path() -> PathBuf {
    config_dir().join("config.json")
}

/// A missing file is only an error when it was asked for explicitly.
pub fn load_file(path: &Path, required: bool) -> Result<Overrides, ConfigError> {
    let text = match fs::read_to_string(path) {
        Ok(t) => t,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound && !required => {
            return Ok(Overrides::default())
        }
        Err(source) => {
            return Err(ConfigError::Io {
                path: path.to_path_buf(),
                source,
            })
        }
    };
    serde_json::from_str(&text).map_err(|source| ConfigError::Json {
        path: path.to_path_buf(),
        source,
    })
}

pub const USAGE: &str = "Usage: edgefl [--endpoint URL|-e URL] [--config PATH|-c PATH] \
[--battery-min N] [--cpu-max N] [--budget-secs N] [--monitor-secs N] \
[--device-id ID] [--once] [--dry-run] [--help|-h]";

#[derive(Debug, Default, PartialEq)]
pub struct ParsedArgs {
    pub overrides: Overrides,
    pub config: Option<PathBuf>,
    pub once: bool,
    pub dry_run: bool,
    pub help: bool,
}

pub fn parse_args<I: IntoIterator<Item = String>>(args: I) -> Result<ParsedArgs, ConfigError> {
    fn value(flag: &str, v: Option<String>) -> Result<String, ConfigError> {
        v.ok_or_else(|| ConfigError::Usage(format!("{flag} needs a value\n{USAGE}")))
    }
    fn number<T: std::str::FromStr>(flag: &'static str, v: Option<String>) -> Result<T, ConfigError> {
        let raw = value(flag, v)?;
        raw.trim().parse().map_err(|_| ConfigError::Invalid {
            field: flag,
            reason: format!("{raw:?} is not a number"),
        })
    }

    let mut it = args.into_iter();
    let _prog = it.next();
    let mut out = ParsedArgs::default();

    while let Some(arg) = it.next() {
        // --flag=value is accepted for every valued flag
        let (flag, inline) = match arg.split_once('=') {
            Some((f, v)) if f.starts_with("--") => (f.to_string(), Some(v.to_string())),
            _ => (arg.clone(), None),
        };
        let mut next = || inline.clone().or_else(|| it.next());
        match flag.as_str() {
            "-h" | "--help" => out.help = true,
            "--once" => out.once = true,
            "--dry-run" => out.dry_run = true,
            "--endpoint" | "-e" => out.overrides.endpoint = Some(value("--endpoint", next())?),
            "--config" | "-c" => out.config = Some(PathBuf::from(value("--config", next())?)),
            "--battery-min" => out.overrides.battery_min = Some(number("--battery-min", next())?),
            "--cpu-max" => out.overrides.cpu_max = Some(number("--cpu-max", next())?),
            "--budget-secs" => {
                out.overrides.time_budget_secs = Some(number("--budget-secs", next())?)
            }
            "--monitor-secs" => out.overrides.monitor_secs = Some(number("--monitor-secs", next())?),
            "--device-id" => out.overrides.device_id = Some(value("--device-id", next())?),
            _ => {
                return Err(ConfigError::Usage(format!(
                    "Unexpected argument {arg:?}. {USAGE}"
                )))
            }
        }
    }
    Ok(out)
}
