//! Background expiry of participants who stopped sending updates.
//!
//! Each cycle captures `now`, asks the registry to drop everything older than
//! the staleness timeout, and emits a `Leave` event per departure. Staleness is
//! therefore detected at cycle granularity, which is why the interval must be
//! strictly shorter than the timeout.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info};

use crate::events::{EventBus, LifecycleEvent};
use crate::registry::{Departure, Registry};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ReaperConfigError {
    #[error("Reap interval must be greater than zero")]
    ZeroInterval,
    #[error("Reap interval ({interval:?}) must be shorter than the staleness timeout ({timeout:?})")]
    IntervalNotShorter { interval: Duration, timeout: Duration },
    #[error("Staleness timeout {0:?} is out of range")]
    TimeoutOutOfRange(Duration),
}

/// Timing for the reaper.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReaperConfig {
    /// Silence after which a participant is considered gone (default: 8s)
    pub timeout: Duration,
    /// How often to sweep (default: 2s)
    pub interval: Duration,
}

impl Default for ReaperConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(8),
            interval: Duration::from_secs(2),
        }
    }
}

impl ReaperConfig {
    pub fn validate(&self) -> Result<(), ReaperConfigError> {
        if self.interval.is_zero() {
            return Err(ReaperConfigError::ZeroInterval);
        }
        if self.interval >= self.timeout {
            return Err(ReaperConfigError::IntervalNotShorter {
                interval: self.interval,
                timeout: self.timeout,
            });
        }
        Ok(())
    }
}

pub struct Reaper {
    registry: Arc<Registry>,
    events: Arc<EventBus>,
    timeout: chrono::Duration,
    interval: Duration,
}

impl Reaper {
    pub fn new(
        registry: Arc<Registry>,
        events: Arc<EventBus>,
        config: ReaperConfig,
    ) -> Result<Self, ReaperConfigError> {
        config.validate()?;
        let timeout = chrono::Duration::from_std(config.timeout)
            .map_err(|_| ReaperConfigError::TimeoutOutOfRange(config.timeout))?;

        Ok(Self {
            registry,
            events,
            timeout,
            interval: config.interval,
        })
    }

    /// Run one sweep and report who was removed.
    ///
    /// Every departure gets its `Leave` event even if an observer panics on an
    /// earlier one; the records are already gone from the registry by then.
    pub fn run_cycle(&self) -> Vec<Departure> {
        let now = self.registry.now();
        let departed = self.registry.expire_older_than(self.timeout, now);

        for departure in &departed {
            let event = LifecycleEvent::Leave {
                id: departure.id.clone(),
                name: departure.name.clone(),
            };
            if panic::catch_unwind(AssertUnwindSafe(|| self.events.emit(event))).is_err() {
                error!(
                    "Observer panicked on [LEAVE] {} ({})",
                    departure.name, departure.id
                );
            }
        }
        departed
    }

    /// Sweep on every interval until `shutdown` turns true or its sender is dropped.
    ///
    /// A panic inside a cycle is logged and the loop carries on.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately; nothing can be stale yet.
        ticker.tick().await;

        info!(
            "Reaper started (timeout {:?}, interval {:?})",
            self.timeout.to_std().unwrap_or_default(),
            self.interval
        );

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match panic::catch_unwind(AssertUnwindSafe(|| self.run_cycle())) {
                        Ok(departed) if !departed.is_empty() => {
                            debug!(
                                "Reaped {} participant(s), {} remaining",
                                departed.len(),
                                self.registry.count()
                            );
                        }
                        Ok(_) => {}
                        Err(_) => error!("Reap cycle panicked, retrying next interval"),
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        info!("Reaper stopped");
    }

    pub fn spawn(self, shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(self.run(shutdown))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::update::ParticipantUpdate;
    use serde_json::json;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    struct Fixture {
        registry: Arc<Registry>,
        events: Arc<EventBus>,
        clock: Arc<ManualClock>,
    }

    fn fixture() -> Fixture {
        let clock = Arc::new(ManualClock::default());
        Fixture {
            registry: Arc::new(Registry::with_clock(clock.clone())),
            events: Arc::new(EventBus::new()),
            clock,
        }
    }

    impl Fixture {
        fn reaper(&self) -> Reaper {
            Reaper::new(
                Arc::clone(&self.registry),
                Arc::clone(&self.events),
                ReaperConfig::default(),
            )
            .unwrap()
        }

        fn join(&self, id: &str, name: &str) {
            self.registry
                .upsert(id, ParticipantUpdate::new(name, None, json!({})));
        }
    }

    // ==================== Config ====================

    #[test]
    fn test_default_config_valid() {
        let config = ReaperConfig::default();
        assert_eq!(config.timeout, Duration::from_secs(8));
        assert_eq!(config.interval, Duration::from_secs(2));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rejects_interval_not_shorter_than_timeout() {
        let config = ReaperConfig {
            timeout: Duration::from_secs(2),
            interval: Duration::from_secs(2),
        };
        assert!(matches!(
            config.validate(),
            Err(ReaperConfigError::IntervalNotShorter { .. })
        ));
    }

    #[test]
    fn test_rejects_zero_interval() {
        let config = ReaperConfig {
            timeout: Duration::from_secs(8),
            interval: Duration::ZERO,
        };
        assert_eq!(config.validate(), Err(ReaperConfigError::ZeroInterval));
    }

    // ==================== Cycles ====================

    #[test]
    fn test_cycle_removes_stale_and_emits_leave() {
        let f = fixture();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = Arc::clone(&seen);
        let _sub = f.events.subscribe(move |e| seen_clone.lock().unwrap().push(e.clone()));

        f.join("old", "Alice");
        f.clock.advance(chrono::Duration::seconds(5));
        f.join("new", "Bob");
        f.clock.advance(chrono::Duration::seconds(4));

        let departed = f.reaper().run_cycle();

        assert_eq!(departed.len(), 1);
        assert_eq!(departed[0].id, "old");
        assert_eq!(f.registry.count(), 1);
        assert_eq!(
            *seen.lock().unwrap(),
            vec![LifecycleEvent::Leave {
                id: "old".into(),
                name: "Alice".into()
            }]
        );
    }

    #[test]
    fn test_panicking_observer_does_not_swallow_later_leaves() {
        let f = fixture();
        let delivered = Arc::new(Mutex::new(Vec::new()));
        let delivered_clone = Arc::clone(&delivered);
        let panicked = Arc::new(AtomicBool::new(false));
        let panicked_clone = Arc::clone(&panicked);
        let _sub = f.events.subscribe(move |e| {
            if !panicked_clone.swap(true, Ordering::SeqCst) {
                panic!("observer failure");
            }
            delivered_clone.lock().unwrap().push(e.clone());
        });

        f.join("a", "Alice");
        f.join("b", "Bob");
        f.join("c", "Carol");
        f.clock.advance(chrono::Duration::seconds(9));

        let departed = f.reaper().run_cycle();

        assert_eq!(departed.len(), 3);
        assert_eq!(f.registry.count(), 0);
        assert!(panicked.load(Ordering::SeqCst));

        // The first Leave hit the panic; the other two still arrive.
        let delivered = delivered.lock().unwrap();
        assert_eq!(delivered.len(), 2);
        for event in delivered.iter() {
            assert!(matches!(event, LifecycleEvent::Leave { .. }));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_loop_delivers_every_leave_after_observer_panic() {
        let f = fixture();
        let leaves = Arc::new(AtomicUsize::new(0));
        let leaves_clone = Arc::clone(&leaves);
        let panicked = Arc::new(AtomicBool::new(false));
        let panicked_clone = Arc::clone(&panicked);
        let _sub = f.events.subscribe(move |_| {
            if !panicked_clone.swap(true, Ordering::SeqCst) {
                panic!("observer failure");
            }
            leaves_clone.fetch_add(1, Ordering::SeqCst);
        });

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = f.reaper().spawn(shutdown_rx);

        f.join("a", "Alice");
        f.join("b", "Bob");
        f.join("c", "Carol");
        f.clock.advance(chrono::Duration::seconds(9));
        tokio::time::sleep(Duration::from_secs(3)).await;

        assert_eq!(f.registry.count(), 0);
        assert_eq!(leaves.load(Ordering::SeqCst), 2);

        shutdown_tx.send(true).unwrap();
        handle.await.unwrap();
    }

    #[test]
    fn test_cycle_with_nothing_stale() {
        let f = fixture();
        f.join("a", "Alice");
        f.clock.advance(chrono::Duration::seconds(8));

        assert!(f.reaper().run_cycle().is_empty());
        assert_eq!(f.registry.count(), 1);
    }

    // ==================== Background loop ====================

    #[tokio::test(start_paused = true)]
    async fn test_background_loop_expires() {
        let f = fixture();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = f.reaper().spawn(shutdown_rx);

        f.join("a", "Alice");
        f.clock.advance(chrono::Duration::seconds(9));
        tokio::time::sleep(Duration::from_secs(3)).await;

        assert_eq!(f.registry.count(), 0);

        shutdown_tx.send(true).unwrap();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_loop_survives_panicking_cycle() {
        let f = fixture();
        let panicked = Arc::new(AtomicBool::new(false));
        let panicked_clone = Arc::clone(&panicked);
        let _sub = f.events.subscribe(move |_| {
            if !panicked_clone.swap(true, Ordering::SeqCst) {
                panic!("observer failure");
            }
        });

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = f.reaper().spawn(shutdown_rx);

        f.join("a", "Alice");
        f.clock.advance(chrono::Duration::seconds(9));
        tokio::time::sleep(Duration::from_secs(3)).await;
        assert!(panicked.load(Ordering::SeqCst));
        assert!(!handle.is_finished());

        f.join("b", "Bob");
        f.clock.advance(chrono::Duration::seconds(9));
        tokio::time::sleep(Duration::from_secs(3)).await;
        assert_eq!(f.registry.count(), 0);

        shutdown_tx.send(true).unwrap();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_loop_stops_when_sender_dropped() {
        let f = fixture();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = f.reaper().spawn(shutdown_rx);

        drop(shutdown_tx);
        handle.await.unwrap();
    }
}
