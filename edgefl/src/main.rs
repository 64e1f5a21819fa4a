//! Entry point for the edgefl client. Resolves settings and runs the console App.

mod app;

use std::env;
use std::sync::Arc;

use app::App;
use edgefl::config::{config_path, load_file, parse_args, Overrides, Settings, USAGE};
use edgefl::device::{DeviceResolver, FixedDevice, SystemDevice};
use edgefl::probe::SystemProbe;
use edgefl::report::{HttpReporter, LogReporter, Reporter};
use edgefl::trainer::LogisticTrainer;
use edgefl::RoundController;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let parsed = match parse_args(env::args()) {
        Ok(v) => v,
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(2);
        }
    };
    if parsed.help {
        eprintln!("{USAGE}");
        return Ok(());
    }

    // Logs go to stderr; stdout is the UI.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let file = match parsed.config.as_deref() {
        Some(path) => load_file(path, true)?,
        None => load_file(&config_path(), false)?,
    };
    let settings = Settings::from_overrides(file.merge(Overrides::from_env()).merge(parsed.overrides))?;
    info!(
        endpoint = %settings.endpoint,
        battery_min = settings.policy.battery_min,
        cpu_max = settings.policy.cpu_max,
        budget_s = settings.round.time_budget.as_secs_f64(),
        monitor_s = settings.round.monitor_interval.as_secs_f64(),
        "settings resolved"
    );

    let reporter: Arc<dyn Reporter> = if parsed.dry_run {
        Arc::new(LogReporter)
    } else {
        Arc::new(HttpReporter::new(settings.endpoint.clone(), settings.report_timeout)?)
    };
    let device: Arc<dyn DeviceResolver> = match settings.device_id.clone() {
        Some(id) => Arc::new(FixedDevice(id)),
        None => Arc::new(SystemDevice),
    };

    let (ctl, events) = RoundController::new(
        settings.policy,
        settings.round,
        Arc::new(SystemProbe::new()),
        LogisticTrainer::from_entropy(),
        reporter,
        device,
    );

    let mut app = App::new(ctl, events);
    if parsed.once {
        app.run_once().await
    } else {
        app.run().await
    }
}
