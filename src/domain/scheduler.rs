//! Periodic driver for a [`TradingEngine`].
//!
//! Ticks come from a tokio interval. A tick first claims the [`CycleGuard`];
//! if a cycle is still in flight the tick is skipped, so cycles of one
//! scheduler never overlap. Several schedulers, each with its own engine and
//! interval, can run side by side.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{Mutex, broadcast};
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, error, info, warn};

use crate::domain::engine::{CycleReport, TradingEngine};
use crate::domain::ledger::ManageReport;

/// Exclusive "cycle in progress" flag; released when the permit drops.
#[derive(Debug, Default)]
pub struct CycleGuard {
    busy: AtomicBool,
}

pub struct CyclePermit<'a> {
    guard: &'a CycleGuard,
}

impl CycleGuard {
    pub fn try_acquire(&self) -> Option<CyclePermit<'_>> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| CyclePermit { guard: self })
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }
}

impl Drop for CyclePermit<'_> {
    fn drop(&mut self) {
        self.guard.busy.store(false, Ordering::Release);
    }
}

pub struct Scheduler {
    engine: Arc<Mutex<TradingEngine>>,
    period: Duration,
    max_cycles: Option<u64>,
    guard: CycleGuard,
    completed: AtomicU64,
    skipped: AtomicU64,
    stopped: AtomicBool,
    shutdown: broadcast::Sender<()>,
}

impl Scheduler {
    pub fn new(engine: Arc<Mutex<TradingEngine>>, period: Duration) -> Self {
        let (shutdown, _) = broadcast::channel(4);
        Scheduler {
            engine,
            period,
            max_cycles: None,
            guard: CycleGuard::default(),
            completed: AtomicU64::new(0),
            skipped: AtomicU64::new(0),
            stopped: AtomicBool::new(false),
            shutdown,
        }
    }

    /// Stop on its own after `cycles` completed cycles.
    pub fn with_max_cycles(mut self, cycles: u64) -> Self {
        self.max_cycles = Some(cycles);
        self
    }

    pub fn engine(&self) -> &Arc<Mutex<TradingEngine>> {
        &self.engine
    }

    pub fn completed_cycles(&self) -> u64 {
        self.completed.load(Ordering::Relaxed)
    }

    pub fn skipped_ticks(&self) -> u64 {
        self.skipped.load(Ordering::Relaxed)
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }

    /// Run one cycle now unless one is already running.
    pub async fn try_cycle(&self) -> Option<CycleReport> {
        let Some(_permit) = self.guard.try_acquire() else {
            self.skipped.fetch_add(1, Ordering::Relaxed);
            debug!("Previous cycle still running, tick skipped");
            return None;
        };
        let report = self.engine.lock().await.run_cycle(Utc::now()).await;
        self.completed.fetch_add(1, Ordering::Relaxed);

        for failure in &report.failures {
            if failure.is_transient() {
                warn!(cycle = report.cycle, error = %failure, "Cycle failure");
            } else {
                error!(cycle = report.cycle, error = %failure, "Cycle failure");
            }
        }
        Some(report)
    }

    /// Drive cycles until [`Scheduler::stop`] is called or the cycle limit
    /// is reached. Returns the number of completed cycles.
    pub async fn run(&self) -> u64 {
        let mut shutdown = self.shutdown.subscribe();
        let mut ticker = interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!(
            interval_ms = self.period.as_millis() as u64,
            max_cycles = ?self.max_cycles,
            "Scheduler started"
        );

        while !self.is_stopped() {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Some(report) = self.try_cycle().await {
                        info!(
                            cycle = report.cycle,
                            opened = report.opened.len(),
                            closed = report.closed.len(),
                            failures = report.failures.len(),
                            "Cycle finished"
                        );
                    }
                    if self
                        .max_cycles
                        .is_some_and(|max| self.completed_cycles() >= max)
                    {
                        self.stopped.store(true, Ordering::Release);
                    }
                }
                _ = shutdown.recv() => {
                    break;
                }
            }
        }

        info!(
            completed = self.completed_cycles(),
            skipped = self.skipped_ticks(),
            "Scheduler stopped"
        );
        self.completed_cycles()
    }

    /// Halt future ticks. A cycle already running finishes normally.
    pub fn stop(&self) {
        self.stopped.store(true, Ordering::Release);
        let _ = self.shutdown.send(());
    }

    /// Stop, wait for any in-flight cycle, then close every open position.
    pub async fn emergency_stop(&self) -> ManageReport {
        self.stop();
        let mut engine = self.engine.lock().await;
        let report = engine.emergency_close_all(Utc::now()).await;
        if report.failures.is_empty() {
            info!(closed = report.closed.len(), "Emergency stop complete");
        } else {
            for failure in &report.failures {
                error!(error = %failure, "Emergency close failed");
            }
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guard_is_exclusive_until_released() {
        let guard = CycleGuard::default();
        let permit = guard.try_acquire();
        assert!(permit.is_some());
        assert!(guard.is_busy());
        assert!(guard.try_acquire().is_none());

        drop(permit);
        assert!(!guard.is_busy());
        assert!(guard.try_acquire().is_some());
    }
}
