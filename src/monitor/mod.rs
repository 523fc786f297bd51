//! Background pollers.
//!
//! Both pollers share the same life cycle: a dedicated thread ticks on a
//! fixed interval between `start()` and `stop()`, replaces the shared
//! snapshot and pushes it to every subscriber.

pub mod containers;
pub mod performance;

use std::{
    ops::ControlFlow,
    sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError},
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};

use tracing::{debug, error, info, warn};

pub use containers::{CommandOutcome, ContainerPoller, ContainerSnapshot};
pub use performance::{PerformanceMonitor, PerformanceSnapshot};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorState {
    Stopped,
    Polling,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSettings {
    pub interval: Duration,
    /// How long `stop()` waits for the thread before detaching it.
    pub join_timeout: Duration,
}

impl Default for PollSettings {
    fn default() -> Self {
        PollSettings {
            interval: Duration::from_secs(5),
            join_timeout: Duration::from_secs(1),
        }
    }
}

#[derive(Default)]
struct Ticker {
    stopped: Mutex<bool>,
    cvar: Condvar,
}

impl Ticker {
    /// Sleeps for `timeout` or until stopped. Returns true when stopped.
    fn wait(&self, timeout: Duration) -> bool {
        let guard = lock(&self.stopped);
        let (guard, _) = self
            .cvar
            .wait_timeout_while(guard, timeout, |stopped| !*stopped)
            .unwrap_or_else(PoisonError::into_inner);
        *guard
    }

    fn stop(&self) {
        *lock(&self.stopped) = true;
        self.cvar.notify_all();
    }
}

struct Running {
    ticker: Arc<Ticker>,
    handle: JoinHandle<()>,
}

/// Runs a tick function on its own thread until stopped, or until the
/// tick returns `ControlFlow::Break`.
pub struct PollLoop {
    name: &'static str,
    settings: PollSettings,
    running: Mutex<Option<Running>>,
}

impl PollLoop {
    pub fn new(name: &'static str, settings: PollSettings) -> Self {
        PollLoop {
            name,
            settings,
            running: Mutex::new(None),
        }
    }

    pub fn state(&self) -> MonitorState {
        match &*lock(&self.running) {
            Some(running) if !running.handle.is_finished() => MonitorState::Polling,
            _ => MonitorState::Stopped,
        }
    }

    /// Starts ticking right away. Returns false if the loop was already polling.
    pub fn start(&self, mut tick: impl FnMut() -> ControlFlow<()> + Send + 'static) -> bool {
        let mut running = lock(&self.running);
        if let Some(current) = running.as_ref() {
            if !current.handle.is_finished() {
                debug!(poller = self.name, "Already polling");
                return false;
            }
        }

        let ticker = Arc::new(Ticker::default());
        let thread_ticker = ticker.clone();
        let interval = self.settings.interval;
        let name = self.name;
        let spawned = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                loop {
                    if tick().is_break() {
                        debug!(poller = name, "Poll loop finished");
                        break;
                    }
                    if thread_ticker.wait(interval) {
                        break;
                    }
                }
            });

        match spawned {
            Ok(handle) => {
                info!(poller = self.name, interval = ?interval, "Polling started");
                *running = Some(Running { ticker, handle });
                true
            }
            Err(e) => {
                error!(poller = self.name, error = %e, "Failed to spawn poll thread");
                false
            }
        }
    }

    /// Signals the loop and waits up to the join timeout. Returns false when
    /// the thread had to be detached because a tick was still running.
    pub fn stop(&self) -> bool {
        let Some(Running { ticker, handle }) = lock(&self.running).take() else {
            return true;
        };
        ticker.stop();

        if handle.thread().id() == thread::current().id() {
            // stopped from inside a tick, the loop exits on its own
            return true;
        }

        let deadline = Instant::now() + self.settings.join_timeout;
        while !handle.is_finished() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }

        if handle.is_finished() {
            if handle.join().is_err() {
                error!(poller = self.name, "Poll thread panicked");
            }
            info!(poller = self.name, "Polling stopped");
            true
        } else {
            warn!(
                poller = self.name,
                timeout = ?self.settings.join_timeout,
                "Poll thread did not stop in time, detaching it"
            );
            false
        }
    }
}

impl Drop for PollLoop {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Fan-out of snapshots over unbounded channels.
pub struct Publisher<T> {
    subscribers: Mutex<Vec<async_channel::Sender<T>>>,
}

impl<T> Default for Publisher<T> {
    fn default() -> Self {
        Publisher {
            subscribers: Mutex::new(vec![]),
        }
    }
}

impl<T: Clone> Publisher<T> {
    pub fn subscribe(&self) -> async_channel::Receiver<T> {
        let (tx, rx) = async_channel::unbounded();
        lock(&self.subscribers).push(tx);
        rx
    }

    /// Sends `value` to every subscriber, dropping the ones that went away.
    pub fn publish(&self, value: T) {
        lock(&self.subscribers).retain(|tx| tx.try_send(value.clone()).is_ok());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn fast() -> PollSettings {
        PollSettings {
            interval: Duration::from_millis(10),
            join_timeout: Duration::from_secs(1),
        }
    }

    #[test]
    fn start_stop_state_machine() {
        let ticks = Arc::new(AtomicUsize::new(0));
        let poll_loop = PollLoop::new("test", fast());
        assert_eq!(poll_loop.state(), MonitorState::Stopped);

        let counter = ticks.clone();
        assert!(poll_loop.start(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            ControlFlow::Continue(())
        }));
        assert_eq!(poll_loop.state(), MonitorState::Polling);
        assert!(!poll_loop.start(|| ControlFlow::Continue(())));

        thread::sleep(Duration::from_millis(50));
        assert!(poll_loop.stop());
        assert_eq!(poll_loop.state(), MonitorState::Stopped);
        let after_stop = ticks.load(Ordering::SeqCst);
        assert!(after_stop >= 1);

        thread::sleep(Duration::from_millis(30));
        assert_eq!(ticks.load(Ordering::SeqCst), after_stop);
        // stopping twice is a no-op
        assert!(poll_loop.stop());
    }

    #[test]
    fn stop_wakes_a_long_interval() {
        let poll_loop = PollLoop::new(
            "slow",
            PollSettings {
                interval: Duration::from_secs(60),
                join_timeout: Duration::from_secs(1),
            },
        );
        poll_loop.start(|| ControlFlow::Continue(()));
        let started = Instant::now();
        assert!(poll_loop.stop());
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn stuck_tick_is_detached_after_join_timeout() {
        let poll_loop = PollLoop::new(
            "stuck",
            PollSettings {
                interval: Duration::from_millis(10),
                join_timeout: Duration::from_millis(50),
            },
        );
        poll_loop.start(|| {
            thread::sleep(Duration::from_millis(500));
            ControlFlow::Continue(())
        });
        thread::sleep(Duration::from_millis(10));
        let started = Instant::now();
        assert!(!poll_loop.stop());
        assert!(started.elapsed() < Duration::from_millis(400));
        assert_eq!(poll_loop.state(), MonitorState::Stopped);
    }

    #[test]
    fn break_ends_the_loop() {
        let poll_loop = PollLoop::new("once", fast());
        poll_loop.start(|| ControlFlow::Break(()));
        thread::sleep(Duration::from_millis(50));
        assert_eq!(poll_loop.state(), MonitorState::Stopped);
        // can be restarted after finishing
        assert!(poll_loop.start(|| ControlFlow::Break(())));
    }

    #[test]
    fn publisher_prunes_closed_subscribers() {
        let publisher = Publisher::<u32>::default();
        let kept = publisher.subscribe();
        let dropped = publisher.subscribe();
        drop(dropped);
        publisher.publish(1);
        assert_eq!(lock(&publisher.subscribers).len(), 1);
        assert_eq!(kept.try_recv().unwrap(), 1);
    }
}
