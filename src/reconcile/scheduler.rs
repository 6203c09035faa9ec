//! The polling loop: one cycle over all stations, a randomized nap, repeat

use std::{
    ops::RangeInclusive,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use rand::Rng;

use crate::reconcile::Engine;

/// Cooperative cancellation shared between the loop and whoever stops it
#[derive(Clone)]
pub struct Shutdown {
    triggered: Arc<AtomicBool>,
    tx: Sender<()>,
    rx: Receiver<()>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, rx) = crossbeam_channel::bounded(1);
        Self {
            triggered: Arc::new(AtomicBool::new(false)),
            tx,
            rx,
        }
    }

    pub fn trigger(&self) {
        self.triggered.store(true, Ordering::SeqCst);
        // wakes a sleeping loop; a full channel already means "wake up"
        let _ = self.tx.try_send(());
    }

    pub fn is_triggered(&self) -> bool {
        self.triggered.load(Ordering::SeqCst)
    }

    /// Sleeps up to `timeout`. Returns true if shutdown was triggered.
    pub fn wait(&self, timeout: Duration) -> bool {
        if self.is_triggered() {
            return true;
        }
        match self.rx.recv_timeout(timeout) {
            Ok(()) => {
                // leave the wake-up for other waiters
                let _ = self.tx.try_send(());
                true
            }
            Err(RecvTimeoutError::Timeout) => self.is_triggered(),
            Err(RecvTimeoutError::Disconnected) => true,
        }
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

pub struct Scheduler<'a> {
    engine: Engine<'a>,
    sleep_secs: RangeInclusive<u64>,
}

impl<'a> Scheduler<'a> {
    pub fn new(engine: Engine<'a>, sleep_secs: RangeInclusive<u64>) -> Self {
        Self { engine, sleep_secs }
    }

    /// Runs cycles until `shutdown` is triggered. Returns the number of
    /// completed cycles.
    pub fn run(&self, shutdown: &Shutdown) -> usize {
        let mut cycles = 0;

        while !shutdown.is_triggered() {
            match self.engine.run_cycle(shutdown) {
                Ok(report) => {
                    log::info!(
                        "cycle {cycles}: {} stations visited, {} plays recorded",
                        report.outcomes.len(),
                        report.recorded()
                    );
                }
                Err(e) => log::error!("cycle {cycles}: could not read stations: {e}"),
            }
            cycles += 1;

            let nap = self.next_sleep();
            log::info!("sleeping for {} seconds", nap.as_secs());
            if shutdown.wait(nap) {
                break;
            }
        }

        log::info!("polling stopped after {cycles} cycles");
        cycles
    }

    fn next_sleep(&self) -> Duration {
        let secs = rand::rng().random_range(self.sleep_secs.clone());
        Duration::from_secs(secs)
    }
}

#[cfg(test)]
mod tests {
    use std::{
        thread,
        time::{Duration, Instant},
    };

    use super::*;
    use crate::{
        domain::track::NowPlaying,
        reconcile::fakes::{FakeGateway, FakeScraper},
        storage::operations::tests::{add_station, setup_store},
    };

    #[test]
    fn wait_returns_early_when_triggered() {
        let shutdown = Shutdown::new();
        let remote = shutdown.clone();

        let started = Instant::now();
        let waiter = thread::spawn(move || remote.wait(Duration::from_secs(30)));
        thread::sleep(Duration::from_millis(50));
        shutdown.trigger();

        assert!(waiter.join().unwrap());
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn wait_times_out_without_trigger() {
        let shutdown = Shutdown::new();
        assert!(!shutdown.wait(Duration::from_millis(10)));
        assert!(!shutdown.is_triggered());
    }

    #[test]
    fn trigger_is_sticky() {
        let shutdown = Shutdown::new();
        shutdown.trigger();
        shutdown.trigger();

        assert!(shutdown.wait(Duration::from_secs(5)));
        assert!(shutdown.wait(Duration::from_secs(5)));
    }

    #[test]
    fn already_triggered_loop_runs_no_cycle() {
        let store = setup_store();
        add_station(&store, "KROQ");
        let scraper = FakeScraper::default();
        let gateway = FakeGateway::default();
        let engine = Engine::new(&store, &scraper, &gateway, &gateway);
        let shutdown = Shutdown::new();
        shutdown.trigger();

        let cycles = Scheduler::new(engine, 100..=140).run(&shutdown);

        assert_eq!(cycles, 0);
        assert_eq!(scraper.calls(), 0);
    }

    #[test]
    fn loop_stops_within_a_second_of_trigger() {
        let store = setup_store();
        add_station(&store, "KROQ");
        let scraper = FakeScraper::default();
        scraper.set("KROQ", NowPlaying::new("A", "B", ""));
        let gateway = FakeGateway::default();
        gateway.add_search_result("A B", "vid1");
        let shutdown = Shutdown::new();

        let remote = shutdown.clone();
        let stopper = thread::spawn(move || {
            thread::sleep(Duration::from_millis(200));
            remote.trigger();
            Instant::now()
        });

        let engine = Engine::new(&store, &scraper, &gateway, &gateway);
        let cycles = Scheduler::new(engine, 100..=140).run(&shutdown);
        let stopped = Instant::now();
        let triggered = stopper.join().unwrap();

        assert_eq!(cycles, 1);
        assert!(stopped.duration_since(triggered) < Duration::from_secs(1));
        assert_eq!(gateway.appends().len(), 1);
    }
}
