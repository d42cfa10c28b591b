//! Timer thread driving the reconciler.

use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::app::{ProposalBook, Reconciler};
use crate::domain::{AppError, ScheduleConfig};

const THREAD_NAME: &str = "propsync-reconciler";

/// Running reconciliation loop.
///
/// Cycles run one after another on a single thread, so two cycles never
/// overlap. Stopping only prevents further ticks; a cycle already in flight
/// finishes first.
pub struct SyncHandle {
    stop: Sender<()>,
    thread: JoinHandle<Reconciler>,
    book: ProposalBook,
}

impl SyncHandle {
    /// Start ticking: first cycle after `startup_delay`, then `interval` after
    /// each cycle ends.
    pub fn spawn(reconciler: Reconciler, schedule: &ScheduleConfig) -> Result<Self, AppError> {
        let (stop, stop_rx) = mpsc::channel::<()>();
        let book = reconciler.book();
        let startup_delay = schedule.startup_delay();
        let interval = schedule.interval();

        let thread = thread::Builder::new()
            .name(THREAD_NAME.to_string())
            .spawn(move || run_loop(reconciler, stop_rx, startup_delay, interval))?;

        log::info!(
            "sync service started (first cycle in {:?}, then every {:?})",
            startup_delay,
            interval
        );
        Ok(Self { stop, thread, book })
    }

    /// Query surface of the running reconciler.
    pub fn book(&self) -> &ProposalBook {
        &self.book
    }

    /// Stop scheduling, wait for the current cycle and hand the reconciler back.
    pub fn shutdown(self) -> Result<Reconciler, AppError> {
        log::info!("stopping sync service");
        // A send error means the loop already exited.
        let _ = self.stop.send(());
        self.join_thread()
    }

    /// Block until the loop exits. It only exits on shutdown, so for a host
    /// that never shuts down this waits forever.
    pub fn wait(self) -> Result<Reconciler, AppError> {
        let SyncHandle { stop, thread, .. } = self;
        let result = thread.join();
        drop(stop);
        result.map_err(|_| thread_panicked())
    }

    fn join_thread(self) -> Result<Reconciler, AppError> {
        self.thread.join().map_err(|_| thread_panicked())
    }
}

fn thread_panicked() -> AppError {
    AppError::Io(std::io::Error::other("reconciler thread panicked"))
}

fn run_loop(
    mut reconciler: Reconciler,
    stop: mpsc::Receiver<()>,
    startup_delay: Duration,
    interval: Duration,
) -> Reconciler {
    let mut delay = startup_delay;
    loop {
        match stop.recv_timeout(delay) {
            Err(RecvTimeoutError::Timeout) => {}
            Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
        }

        match reconciler.run_cycle() {
            Ok(report) => log::debug!("cycle ok: {} events", report.events()),
            Err(e) => log::warn!("cycle aborted, retrying next tick: {}", e),
        }

        delay = interval;
    }

    log::info!("sync service stopped");
    reconciler
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::MemoryProposalStore;
    use crate::domain::ReconcileConfig;
    use crate::testing::{FakePortal, RecordingSink, raw_proposal};
    use std::sync::Arc;
    use std::time::Instant;

    fn reconciler(portal: &FakePortal, sink: &RecordingSink) -> Reconciler {
        Reconciler::new(
            Box::new(portal.clone()),
            Arc::new(MemoryProposalStore::new()),
            Arc::new(sink.clone()),
            ReconcileConfig::default(),
        )
    }

    fn wait_for(condition: impl Fn() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if condition() {
                return true;
            }
            thread::sleep(Duration::from_millis(10));
        }
        false
    }

    #[test]
    fn first_tick_publishes_and_book_is_queryable() {
        let portal = FakePortal::new();
        portal.set_open(vec![raw_proposal(1, "open")]);
        let sink = RecordingSink::new();
        let schedule = ScheduleConfig { startup_delay_secs: 0, interval_secs: 3_600 };

        let handle = SyncHandle::spawn(reconciler(&portal, &sink), &schedule).unwrap();
        assert!(wait_for(|| handle.book().contains(1)));

        handle.shutdown().unwrap();
        assert_eq!(RecordingSink::kinds(&sink.take()), vec!["published"]);
    }

    #[test]
    fn shutdown_before_first_tick_runs_no_cycle() {
        let portal = FakePortal::new();
        portal.set_open(vec![raw_proposal(1, "open")]);
        let sink = RecordingSink::new();
        let schedule = ScheduleConfig { startup_delay_secs: 3_600, interval_secs: 3_600 };

        let handle = SyncHandle::spawn(reconciler(&portal, &sink), &schedule).unwrap();
        let reconciler = handle.shutdown().unwrap();

        assert!(reconciler.book().is_empty());
        assert!(sink.take().is_empty());
    }
}
