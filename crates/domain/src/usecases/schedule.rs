//! Cadence scheduler - fires a cycle on a fixed interval until shutdown

use std::panic::AssertUnwindSafe;

use async_trait::async_trait;
use futures::FutureExt;
use tokio::time::{Duration, Instant, sleep};
use tokio_util::sync::CancellationToken;

use crate::usecases::bot::panic_message;

/// Something the scheduler can fire
#[async_trait]
pub trait CycleRunner: Send {
    /// Run one cycle, returning whether it succeeded
    async fn run_cycle(&mut self) -> bool;
}

/// Configuration for the cadence scheduler
#[derive(Debug, Clone)]
pub struct ScheduleConfig {
    /// Time between cycles
    pub interval: Duration,
    /// How often the trigger is checked
    pub poll_interval: Duration,
    /// Pause after a cycle fails unexpectedly
    pub error_backoff: Duration,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(3600),
            poll_interval: Duration::from_secs(60),
            error_backoff: Duration::from_secs(300),
        }
    }
}

/// Interval trigger tracked against the monotonic clock
#[derive(Debug, Clone)]
struct Trigger {
    interval: Duration,
    next_fire: Instant,
}

impl Trigger {
    fn new(interval: Duration, registered_at: Instant) -> Self {
        Self {
            interval,
            next_fire: registered_at + interval,
        }
    }

    fn is_due(&self, now: Instant) -> bool {
        now >= self.next_fire
    }

    /// Move to the next slot; if cycles overran, restart from `now` instead of bursting
    fn advance(&mut self, now: Instant) {
        self.next_fire += self.interval;
        if self.next_fire <= now {
            self.next_fire = now + self.interval;
        }
    }
}

/// Polls an interval trigger and fires the runner when due
#[derive(Debug, Clone, Default)]
pub struct CadenceScheduler {
    config: ScheduleConfig,
}

impl CadenceScheduler {
    pub fn new(config: ScheduleConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ScheduleConfig {
        &self.config
    }

    /// Loop until `shutdown` is cancelled, returning the number of cycles fired.
    ///
    /// The first cycle fires one interval after the call. Cancellation is only
    /// observed between cycles, so a running cycle always completes.
    pub async fn run<R>(&self, runner: &mut R, shutdown: &CancellationToken) -> u64
    where
        R: CycleRunner + ?Sized,
    {
        let mut trigger = Trigger::new(self.config.interval, Instant::now());
        let mut fired = 0;

        tracing::info!(
            interval_secs = self.config.interval.as_secs(),
            poll_secs = self.config.poll_interval.as_secs(),
            "Scheduled posting cycle"
        );

        loop {
            if shutdown.is_cancelled() {
                break;
            }

            let mut pause = self.config.poll_interval;

            if trigger.is_due(Instant::now()) {
                fired += 1;
                match AssertUnwindSafe(runner.run_cycle()).catch_unwind().await {
                    Ok(true) => tracing::debug!(cycle = fired, "Scheduled cycle succeeded"),
                    Ok(false) => tracing::warn!(cycle = fired, "Scheduled cycle did not publish"),
                    Err(panic) => {
                        tracing::error!(
                            cycle = fired,
                            error = %panic_message(&*panic),
                            backoff_secs = self.config.error_backoff.as_secs(),
                            "Unexpected error in scheduler loop, backing off"
                        );
                        pause = self.config.error_backoff;
                    }
                }
                trigger.advance(Instant::now());
            }

            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = sleep(pause) => {}
            }
        }

        tracing::info!(cycles = fired, "Scheduler stopped");
        fired
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    const HOUR: Duration = Duration::from_secs(3600);

    /// Records when each cycle started, relative to `origin`
    struct RecordingRunner {
        origin: Instant,
        starts: Vec<Duration>,
        cycle_duration: Duration,
        panic_on_first: bool,
        finished: Arc<AtomicBool>,
    }

    impl RecordingRunner {
        fn new(origin: Instant) -> Self {
            Self {
                origin,
                starts: vec![],
                cycle_duration: Duration::ZERO,
                panic_on_first: false,
                finished: Arc::new(AtomicBool::new(false)),
            }
        }
    }

    #[async_trait]
    impl CycleRunner for RecordingRunner {
        async fn run_cycle(&mut self) -> bool {
            self.starts.push(Instant::now() - self.origin);
            if self.panic_on_first && self.starts.len() == 1 {
                panic!("cycle blew up");
            }
            if !self.cycle_duration.is_zero() {
                sleep(self.cycle_duration).await;
            }
            self.finished.store(true, Ordering::SeqCst);
            true
        }
    }

    fn cancel_after(shutdown: &CancellationToken, after: Duration) -> tokio::task::JoinHandle<()> {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            sleep(after).await;
            shutdown.cancel();
        })
    }

    #[tokio::test(start_paused = true)]
    async fn test_fires_once_per_interval() {
        let origin = Instant::now();
        let mut runner = RecordingRunner::new(origin);
        let shutdown = CancellationToken::new();
        let canceller = cancel_after(&shutdown, 3 * HOUR + Duration::from_secs(30));

        let fired = CadenceScheduler::default().run(&mut runner, &shutdown).await;
        canceller.await.unwrap();

        assert_eq!(fired, 3);
        assert_eq!(runner.starts, vec![HOUR, 2 * HOUR, 3 * HOUR]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_is_observed_during_sleep() {
        let origin = Instant::now();
        let mut runner = RecordingRunner::new(origin);
        let shutdown = CancellationToken::new();
        let canceller = cancel_after(&shutdown, Duration::from_secs(90));

        let fired = CadenceScheduler::default().run(&mut runner, &shutdown).await;
        canceller.await.unwrap();

        assert_eq!(fired, 0);
        assert_eq!(Instant::now() - origin, Duration::from_secs(90));
    }

    #[tokio::test(start_paused = true)]
    async fn test_already_cancelled_returns_immediately() {
        let mut runner = RecordingRunner::new(Instant::now());
        let shutdown = CancellationToken::new();
        shutdown.cancel();

        let fired = CadenceScheduler::default().run(&mut runner, &shutdown).await;

        assert_eq!(fired, 0);
        assert!(runner.starts.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_in_flight_cycle_completes_before_exit() {
        let origin = Instant::now();
        let mut runner = RecordingRunner::new(origin);
        runner.cycle_duration = Duration::from_secs(600);
        let finished = Arc::clone(&runner.finished);
        let shutdown = CancellationToken::new();
        let canceller = cancel_after(&shutdown, HOUR + Duration::from_secs(60));

        let fired = CadenceScheduler::default().run(&mut runner, &shutdown).await;
        canceller.await.unwrap();

        assert_eq!(fired, 1);
        assert!(finished.load(Ordering::SeqCst));
        assert_eq!(Instant::now() - origin, HOUR + Duration::from_secs(600));
    }

    #[tokio::test(start_paused = true)]
    async fn test_overrunning_cycle_does_not_burst() {
        let origin = Instant::now();
        let mut runner = RecordingRunner::new(origin);
        runner.cycle_duration = Duration::from_secs(9000);
        let shutdown = CancellationToken::new();
        let canceller = cancel_after(&shutdown, Duration::from_secs(17_000));

        CadenceScheduler::default().run(&mut runner, &shutdown).await;
        canceller.await.unwrap();

        // first cycle ends at 12600s; the next slot restarts from there
        assert_eq!(
            runner.starts,
            vec![Duration::from_secs(3600), Duration::from_secs(16_200)]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_panicking_cycle_backs_off_and_recovers() {
        let origin = Instant::now();
        let mut runner = RecordingRunner::new(origin);
        runner.panic_on_first = true;
        let scheduler = CadenceScheduler::new(ScheduleConfig {
            interval: Duration::from_secs(60),
            poll_interval: Duration::from_secs(10),
            error_backoff: Duration::from_secs(300),
        });
        let shutdown = CancellationToken::new();
        let canceller = cancel_after(&shutdown, Duration::from_secs(375));

        let fired = scheduler.run(&mut runner, &shutdown).await;
        canceller.await.unwrap();

        assert_eq!(fired, 2);
        assert_eq!(
            runner.starts,
            vec![Duration::from_secs(60), Duration::from_secs(360)]
        );
    }

    #[test]
    fn test_trigger_advances_by_interval() {
        let start = Instant::now();
        let mut trigger = Trigger::new(HOUR, start);

        assert!(!trigger.is_due(start));
        assert!(trigger.is_due(start + HOUR));

        trigger.advance(start + HOUR + Duration::from_secs(5));
        assert_eq!(trigger.next_fire, start + 2 * HOUR);
    }
}
