//! Round controller: resource gating, the time-boxed training loop, and exactly-once
//! reporting of every attempt.
//!
//! Threading:
//! - `attempt_round` is called from the UI context. Gating reads run on Tokio's
//!   blocking pool so the caller's executor never sleeps inside a CPU sample.
//! - An accepted round runs on a spawned task; its CPU-bound loop runs via
//!   `spawn_blocking`.
//! - All UI-facing output goes through one unbounded channel, so progress events
//!   are never blocked on a slow consumer and always precede the terminal event.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::device::DeviceResolver;
use crate::error::RoundError;
use crate::probe::ResourceProbe;
use crate::report::Reporter;
use crate::trainer::Trainer;
use crate::types::{
    GatePolicy, ResourceSnapshot, RoundConfig, RoundEvent, RoundResult, BATTERY_UNREADABLE,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundState {
    Idle,
    Gating,
    Running,
}

/// What a call to [`RoundController::attempt_round`] did.
#[derive(Debug)]
pub enum Attempt {
    /// A round was already in flight; nothing happened.
    Ignored,
    /// Gating rejected the round. Already reported.
    Skipped(RoundResult),
    /// Training is running in the background.
    Started(RoundHandle),
}

/// Completion handle for a running round.
#[derive(Debug)]
pub struct RoundHandle(JoinHandle<Result<RoundResult, RoundError>>);

impl RoundHandle {
    /// Resolves after the report was sent and the terminal event emitted.
    pub async fn join(self) -> Result<RoundResult, RoundError> {
        match self.0.await {
            Ok(res) => res,
            Err(e) => Err(RoundError::Aborted(e.to_string())),
        }
    }
}

// Controller-owned fields shared with the background task.
struct Shared {
    state: Mutex<RoundState>,
    status: Mutex<String>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Shared {
    fn set_status(&self, text: &str) {
        *lock(&self.status) = text.to_string();
    }
}

// Holds the single-flight slot. Dropping it returns the controller to Idle, so the
// slot is released even if the background task panics.
struct InFlight(Arc<Shared>);

impl InFlight {
    fn acquire(shared: &Arc<Shared>) -> Option<Self> {
        let mut state = lock(&shared.state);
        if *state != RoundState::Idle {
            return None;
        }
        *state = RoundState::Gating;
        Some(Self(shared.clone()))
    }

    fn enter(&self, next: RoundState) {
        *lock(&self.0.state) = next;
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        *lock(&self.0.state) = RoundState::Idle;
    }
}

pub struct RoundController {
    policy: GatePolicy,
    config: RoundConfig,
    probe: Arc<dyn ResourceProbe>,
    trainer: Arc<Mutex<Box<dyn Trainer>>>,
    reporter: Arc<dyn Reporter>,
    device: Arc<dyn DeviceResolver>,
    events: UnboundedSender<RoundEvent>,
    shared: Arc<Shared>,
}

impl RoundController {
    /// Returns the controller and the receiving end of its UI event channel.
    pub fn new(
        policy: GatePolicy,
        config: RoundConfig,
        probe: Arc<dyn ResourceProbe>,
        trainer: impl Trainer + 'static,
        reporter: Arc<dyn Reporter>,
        device: Arc<dyn DeviceResolver>,
    ) -> (Self, UnboundedReceiver<RoundEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let ctl = Self {
            policy,
            config,
            probe,
            trainer: Arc::new(Mutex::new(Box::new(trainer))),
            reporter,
            device,
            events: tx,
            shared: Arc::new(Shared {
                state: Mutex::new(RoundState::Idle),
                status: Mutex::new("Tap START when ready".into()),
            }),
        };
        (ctl, rx)
    }

    pub fn state(&self) -> RoundState {
        *lock(&self.shared.state)
    }

    /// Last text the UI should be showing.
    pub fn status(&self) -> String {
        lock(&self.shared.status).clone()
    }

    pub fn policy(&self) -> &GatePolicy {
        &self.policy
    }

    pub fn config(&self) -> &RoundConfig {
        &self.config
    }

    /// Gates and, if allowed, starts a round. A no-op while another round is in flight.
    pub async fn attempt_round(&self) -> Attempt {
        let Some(flight) = InFlight::acquire(&self.shared) else {
            debug!("attempt ignored: round already in flight");
            return Attempt::Ignored;
        };

        let snapshot = self.gate_snapshot().await;
        let status = snapshot.status_line();
        info!(
            battery = snapshot.battery_percent,
            cpu = snapshot.cpu_percent,
            "gating"
        );

        if let Err(reason) = self.policy.evaluate(&snapshot) {
            info!(%reason, "round skipped");
            let result = RoundResult::Skipped { snapshot, reason };
            self.reporter
                .send(result.to_payload(self.device.resolve()))
                .await;
            let text = format!("{status}\nSkipped – conditions not met");
            self.shared.set_status(&text);
            let _ = self.events.send(RoundEvent::Terminal {
                text,
                enable_start: true,
            });
            drop(flight);
            return Attempt::Skipped(result);
        }

        flight.enter(RoundState::Running);
        let text = format!("{status}\nTraining…");
        self.shared.set_status(&text);
        let _ = self.events.send(RoundEvent::Status(text));
        info!(
            budget_ms = self.config.time_budget.as_millis() as u64,
            "round started"
        );
        Attempt::Started(self.spawn_round(flight, snapshot))
    }

    async fn gate_snapshot(&self) -> ResourceSnapshot {
        let probe = self.probe.clone();
        let window = self.config.cpu_sample_window;
        match tokio::task::spawn_blocking(move || probe.snapshot(window)).await {
            Ok(s) => s,
            Err(e) => {
                warn!("gating probe failed: {e}");
                ResourceSnapshot::new(BATTERY_UNREADABLE, 0.0)
            }
        }
    }

    fn spawn_round(&self, flight: InFlight, start: ResourceSnapshot) -> RoundHandle {
        let probe = self.probe.clone();
        let trainer = self.trainer.clone();
        let reporter = self.reporter.clone();
        let device = self.device.clone();
        let events = self.events.clone();
        let shared = self.shared.clone();
        let config = self.config;

        RoundHandle(tokio::spawn(async move {
            let bg_events = events.clone();
            let bg_shared = shared.clone();
            let outcome = tokio::task::spawn_blocking(move || {
                let mut trainer = lock(&trainer);
                let began = Instant::now();
                run_training(
                    probe.as_ref(),
                    trainer.as_mut(),
                    config,
                    || began.elapsed(),
                    &bg_events,
                    &bg_shared,
                )
            })
            .await;

            let trained = match outcome {
                Ok(trained) => trained,
                Err(e) => {
                    error!("training task failed: {e}");
                    let text = "Training failed".to_string();
                    shared.set_status(&text);
                    let _ = events.send(RoundEvent::Terminal {
                        text,
                        enable_start: true,
                    });
                    drop(flight);
                    return Err(RoundError::Aborted(e.to_string()));
                }
            };

            let text = format!(
                "{}\n✓ Finished – acc ≈ {:.2}",
                trained.end.status_line(),
                trained.accuracy
            );
            let result = RoundResult::Completed {
                accuracy: trained.accuracy,
                start,
                end: trained.end,
                peak_cpu: trained.peak_cpu,
            };
            reporter.send(result.to_payload(device.resolve())).await;

            shared.set_status(&text);
            let _ = events.send(RoundEvent::Terminal {
                text,
                enable_start: true,
            });
            info!("round completed");
            drop(flight);
            Ok(result)
        }))
    }
}

// What a finished training loop hands back to the round task.
#[derive(Debug, Clone, Copy)]
struct Trained {
    accuracy: f64,
    end: ResourceSnapshot,
    peak_cpu: f64,
}

// Runs until `time_budget` has elapsed, resampling CPU at every monitor boundary
// since the round began. Boundaries crossed during a single long step produce one
// sample, not several. `elapsed` is read once per step so the sample decision and
// the exit decision see the same instant.
fn run_training(
    probe: &dyn ResourceProbe,
    trainer: &mut dyn Trainer,
    config: RoundConfig,
    mut elapsed: impl FnMut() -> Duration,
    events: &UnboundedSender<RoundEvent>,
    shared: &Shared,
) -> Trained {
    trainer.reset();
    let mut accuracy = trainer.accuracy();
    let mut peak_cpu = 0.0_f64;
    let interval = config.monitor_interval;
    let mut next_sample = interval;

    let mut now = elapsed();
    while now < config.time_budget {
        accuracy = trainer.step();
        now = elapsed();
        if now < next_sample {
            continue;
        }
        let cpu = probe.read_cpu_percent(config.cpu_sample_window);
        peak_cpu = peak_cpu.max(cpu);
        let ev = RoundEvent::Progress {
            elapsed: now,
            cpu_percent: cpu,
        };
        shared.set_status(&ev.text());
        debug!(elapsed_ms = now.as_millis() as u64, cpu, "monitor sample");
        let _ = events.send(ev);
        next_sample = next_boundary(now, interval);
    }

    Trained {
        accuracy,
        end: probe.snapshot(config.cpu_sample_window),
        peak_cpu,
    }
}

// First multiple of `interval` strictly after `elapsed`. A zero interval samples
// after every step.
fn next_boundary(elapsed: Duration, interval: Duration) -> Duration {
    if interval.is_zero() {
        return Duration::ZERO;
    }
    let n = elapsed.as_nanos() / interval.as_nanos() + 1;
    Duration::from_nanos((interval.as_nanos() * n).min(u64::MAX as u128) as u64)
}
