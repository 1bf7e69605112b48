//! Direct-processing alert engine.
//!
//! Milk booked against the Direct-Processing pseudo-tank is supposed to be
//! transient. Each positive receipt there is tracked independently: once
//! its age crosses the policy threshold and it still has attributable
//! volume left, the engine raises an audible-plus-visual alert and keeps
//! re-raising it at a fixed interval until the milk is moved or consumed.
//!
//! Attribution is FIFO: negative Direct-Processing movements are matched
//! against positive receipts oldest-first, so a receipt's remaining volume
//! is whatever later offloads have not yet consumed. The live alert set is
//! re-derived from scratch on every ledger refresh, scoped to the
//! Direct-Processing subset of the snapshot; every refresh cancels all
//! pending timers and reschedules them fresh, so no timer outlives the
//! record it was scheduled for.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, RwLock};

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::balance;
use crate::ledger::Ledger;
use crate::models::{MovementRecord, Tank};

// ---

/// Alerting policy: when the first alert fires and how often it repeats.
///
/// Thresholds are fixed policy constants, not user-configurable.
#[derive(Debug, Clone)]
pub struct AlertPolicy {
    pub threshold: Duration,
    pub repeat_interval: Duration,
    /// Include a transfer-target suggestion (extended-holding variant only).
    pub suggest_transfer: bool,
}

impl AlertPolicy {
    /// Standard policy: alert 30 minutes after reception, repeat every 30.
    pub fn standard() -> Self {
        Self {
            threshold: Duration::minutes(30),
            repeat_interval: Duration::minutes(30),
            suggest_transfer: false,
        }
    }

    /// Extended-holding policy: alert after 3 hours, repeat every 30
    /// minutes, and suggest a storage tank with spare capacity.
    pub fn extended_holding() -> Self {
        Self {
            threshold: Duration::hours(3),
            repeat_interval: Duration::minutes(30),
            suggest_transfer: true,
        }
    }
}

/// Wall-clock source, swappable for tests.
pub trait Clock: Send + Sync + 'static {
    fn now(&self) -> DateTime<Utc>;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Where raised alerts go. `notify` is the visual, primary channel;
/// `beep` is the audible one, whose failure the engine swallows.
pub trait AlertSink: Send + Sync {
    fn notify(&self, alert: &ActiveAlert);

    fn beep(&self) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Production sink: structured log lines. The audible channel is a no-op
/// here; a UI host supplies its own sink.
pub struct LogSink;

impl AlertSink for LogSink {
    fn notify(&self, alert: &ActiveAlert) {
        warn!(
            supplier = %alert.supplier_name,
            remaining_liters = alert.remaining_liters,
            minutes_overdue = alert.minutes_overdue,
            "milk still awaiting direct processing"
        );
    }
}

// ---

/// A Direct-Processing receipt with unconsumed volume, due or soon due.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingAlert {
    pub record_id: String,
    pub supplier_name: String,
    pub remaining_liters: f64,
    pub submitted_at: DateTime<Utc>,
    pub due_at: DateTime<Utc>,
    pub suggested_tank: Option<Tank>,
}

impl PendingAlert {
    fn to_active(&self, now: DateTime<Utc>) -> ActiveAlert {
        ActiveAlert {
            record_id: self.record_id.clone(),
            supplier_name: self.supplier_name.clone(),
            remaining_liters: self.remaining_liters,
            submitted_at: self.submitted_at,
            due_at: self.due_at,
            minutes_overdue: (now - self.due_at).num_minutes().max(0),
            suggested_tank: self.suggested_tank.clone(),
        }
    }
}

/// An alert that has fired and is still unresolved.
#[derive(Debug, Clone, Serialize)]
pub struct ActiveAlert {
    pub record_id: String,
    pub supplier_name: String,
    pub remaining_liters: f64,
    pub submitted_at: DateTime<Utc>,
    pub due_at: DateTime<Utc>,
    /// Wall-clock delta at the last evaluation, never negative.
    pub minutes_overdue: i64,
    pub suggested_tank: Option<Tank>,
}

// ---

/// Remaining attributable volume per positive Direct-Processing receipt,
/// oldest first. Offloaded volume is consumed FIFO against the receipts.
pub fn remaining_by_receipt(records: &[MovementRecord]) -> Vec<(MovementRecord, f64)> {
    let mut receipts: Vec<&MovementRecord> = records
        .iter()
        .filter(|r| r.tank == Tank::DirectProcessing && r.volume_liters > 0.0)
        .collect();
    receipts.sort_by_key(|r| r.recorded_at);

    let mut offloaded: f64 = records
        .iter()
        .filter(|r| r.tank == Tank::DirectProcessing && r.volume_liters < 0.0)
        .map(|r| -r.volume_liters)
        .sum();

    receipts
        .into_iter()
        .map(|receipt| {
            let consumed = offloaded.min(receipt.volume_liters);
            offloaded -= consumed;
            (receipt.clone(), receipt.volume_liters - consumed)
        })
        .collect()
}

/// Derive the live alert set from a snapshot. Presence is strict: a
/// receipt with exactly zero remaining volume is resolved, not pending.
pub fn pending_alerts(records: &[MovementRecord], policy: &AlertPolicy) -> Vec<PendingAlert> {
    remaining_by_receipt(records)
        .into_iter()
        .filter(|(_, remaining)| *remaining > 0.0)
        .map(|(receipt, remaining)| PendingAlert {
            record_id: receipt.id,
            supplier_name: receipt.supplier_name,
            remaining_liters: remaining,
            submitted_at: receipt.recorded_at,
            due_at: receipt.recorded_at + policy.threshold,
            suggested_tank: policy
                .suggest_transfer
                .then(|| balance::suggest_transfer_target(records, remaining))
                .flatten(),
        })
        .collect()
}

// ---

/// Owned map of record id to timer task. Nothing outside the engine
/// touches it; every refresh goes through `cancel_all` + `schedule`.
///
/// `epoch` counts reschedules. Timer tasks carry the epoch they were
/// scheduled under and fire through the registry lock, so a task whose
/// epoch is stale (aborted mid-wakeup by a refresh) can never re-insert a
/// resolved alert.
#[derive(Default)]
struct TimerRegistry {
    epoch: u64,
    handles: HashMap<String, JoinHandle<()>>,
}

impl TimerRegistry {
    fn schedule(&mut self, record_id: String, handle: JoinHandle<()>) {
        if let Some(stale) = self.handles.insert(record_id, handle) {
            stale.abort();
        }
    }

    fn cancel_all(&mut self) {
        for (_, handle) in self.handles.drain() {
            handle.abort();
        }
    }
}

/// The timer-driven watcher over the Direct-Processing pseudo-tank.
pub struct AlertEngine {
    ledger: Arc<Ledger>,
    policy: AlertPolicy,
    sink: Arc<dyn AlertSink>,
    clock: Arc<dyn Clock>,
    active: RwLock<HashMap<String, ActiveAlert>>,
    timers: Mutex<TimerRegistry>,
}

impl AlertEngine {
    pub fn new(
        ledger: Arc<Ledger>,
        policy: AlertPolicy,
        sink: Arc<dyn AlertSink>,
        clock: Arc<dyn Clock>,
    ) -> Arc<Self> {
        Arc::new(Self {
            ledger,
            policy,
            sink,
            clock,
            active: RwLock::new(HashMap::new()),
            timers: Mutex::new(TimerRegistry::default()),
        })
    }

    /// Alerts that have fired and are not yet resolved, oldest due first.
    pub fn active_alerts(&self) -> Vec<ActiveAlert> {
        let mut alerts: Vec<ActiveAlert> = self
            .active
            .read()
            .expect("active alert lock poisoned")
            .values()
            .cloned()
            .collect();
        alerts.sort_by_key(|a| a.due_at);
        alerts
    }

    /// Recompute the live set from the current snapshot, drop resolved
    /// alerts, and reschedule every timer from scratch.
    ///
    /// The registry lock is held across the epoch bump, the prune and the
    /// reschedule. A timer task waking concurrently blocks in [`Self::fire`]
    /// on the same lock, then observes the stale epoch and exits instead of
    /// re-inserting an alert that was just resolved.
    pub fn resync(self: &Arc<Self>) {
        let snapshot = self.ledger.snapshot();
        let pending = pending_alerts(&snapshot, &self.policy);

        let mut timers = self.timers.lock().expect("timer registry lock poisoned");
        timers.cancel_all();
        timers.epoch += 1;

        // Lock order is always registry, then active set.
        {
            let live: HashSet<&str> = pending.iter().map(|p| p.record_id.as_str()).collect();
            let mut active = self.active.write().expect("active alert lock poisoned");
            active.retain(|id, _| live.contains(id.as_str()));
            for p in &pending {
                if let Some(alert) = active.get_mut(&p.record_id) {
                    alert.remaining_liters = p.remaining_liters;
                    alert.suggested_tank = p.suggested_tank.clone();
                }
            }
        }

        let epoch = timers.epoch;
        for p in pending {
            let id = p.record_id.clone();
            timers.schedule(id, self.spawn_timer(p, epoch));
        }
    }

    /// Drive the engine: resync once, then again on every ledger refresh.
    /// Returns when the ledger is dropped; all timers are cancelled.
    pub async fn run(self: Arc<Self>) {
        let mut generation = self.ledger.subscribe();
        self.resync();
        while generation.changed().await.is_ok() {
            self.resync();
        }
        self.shutdown();
    }

    /// Cancel every outstanding timer and clear the active set.
    pub fn shutdown(&self) {
        let mut timers = self.timers.lock().expect("timer registry lock poisoned");
        timers.cancel_all();
        timers.epoch += 1;
        self.active
            .write()
            .expect("active alert lock poisoned")
            .clear();
    }

    fn spawn_timer(self: &Arc<Self>, pending: PendingAlert, epoch: u64) -> JoinHandle<()> {
        let engine = Arc::downgrade(self);
        let now = self.clock.now();
        // Past-due receipts fire immediately at discovery.
        let initial = (pending.due_at - now)
            .to_std()
            .unwrap_or(std::time::Duration::ZERO);
        let repeat = self
            .policy
            .repeat_interval
            .to_std()
            .unwrap_or(std::time::Duration::from_secs(30 * 60));

        tokio::spawn(async move {
            tokio::time::sleep(initial).await;
            loop {
                let Some(engine) = engine.upgrade() else {
                    return;
                };
                if !engine.fire(&pending, epoch) {
                    return;
                }
                drop(engine);
                tokio::time::sleep(repeat).await;
            }
        })
    }

    /// Raise the alert, unless the scheduling epoch has been superseded by
    /// a refresh or shutdown in the meantime. Returns false when stale.
    fn fire(&self, pending: &PendingAlert, epoch: u64) -> bool {
        let timers = self.timers.lock().expect("timer registry lock poisoned");
        if timers.epoch != epoch {
            return false;
        }

        let alert = pending.to_active(self.clock.now());
        self.active
            .write()
            .expect("active alert lock poisoned")
            .insert(pending.record_id.clone(), alert.clone());
        self.sink.notify(&alert);
        if let Err(err) = self.sink.beep() {
            // Audio is best-effort; the visual alert already went out.
            debug!("audible alert unavailable: {err:#}");
        }
        true
    }
}

impl Drop for AlertEngine {
    fn drop(&mut self) {
        if let Ok(timers) = self.timers.get_mut() {
            timers.cancel_all();
        }
    }
}
