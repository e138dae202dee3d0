//! Timer-driven stepping of a session

use std::time::Duration;

use anyhow::ensure;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info};

use gridlearn_core::Environment;

use crate::session::{Session, TickOutcome};

/// Why the driver returned
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StopReason {
    /// The learner asked to stop
    NeedsStop,
    /// A stop signal arrived or every sender was dropped
    Signalled,
    /// The episode budget was used up
    EpisodeBudget,
}

/// What a driver run did
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriverReport {
    /// Ticks performed
    pub ticks: usize,
    /// Episodes finished
    pub episodes: usize,
    /// Why the run ended
    pub reason: StopReason,
}

/// Calls [`Session::tick`] on a fixed interval
///
/// The interval can be changed while [`TickDriver::run`] is in progress; the
/// next tick is scheduled one new interval after the change.
#[derive(Debug)]
pub struct TickDriver {
    interval: watch::Sender<Duration>,
    max_episodes: Option<usize>,
}

impl TickDriver {
    /// Create a driver ticking every `interval`, with no episode budget
    #[must_use]
    pub fn new(interval: Duration) -> Self {
        let (interval, _) = watch::channel(interval);
        Self {
            interval,
            max_episodes: None,
        }
    }

    /// Stop after `episodes` finished episodes
    #[must_use]
    pub fn with_max_episodes(mut self, episodes: usize) -> Self {
        self.max_episodes = Some(episodes);
        self
    }

    /// Change the tick interval, taking effect immediately in a running loop
    pub fn set_interval(&self, interval: Duration) -> anyhow::Result<()> {
        ensure!(!interval.is_zero(), "tick interval must be non-zero");
        self.interval.send_replace(interval);
        debug!(interval_ms = interval.as_millis(), "tick interval changed");
        Ok(())
    }

    /// Tick interval
    #[must_use]
    pub fn interval(&self) -> Duration {
        *self.interval.borrow()
    }

    /// Drive `session` until the learner stops, `stop` turns `true` or the
    /// episode budget runs out
    pub async fn run<E: Environment>(
        &self,
        session: &mut Session<E>,
        mut stop: watch::Receiver<bool>,
    ) -> anyhow::Result<DriverReport> {
        let mut speed = self.interval.subscribe();
        let period = *speed.borrow_and_update();
        ensure!(!period.is_zero(), "tick interval must be non-zero");

        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut ticks = 0;
        let mut episodes = 0;

        info!(interval_ms = period.as_millis(), max_episodes = ?self.max_episodes, "tick driver started");

        let reason = loop {
            if *stop.borrow() {
                break StopReason::Signalled;
            }
            if self.max_episodes.is_some_and(|max| episodes >= max) {
                break StopReason::EpisodeBudget;
            }

            tokio::select! {
                changed = stop.changed() => {
                    if changed.is_err() {
                        break StopReason::Signalled;
                    }
                }
                Ok(()) = speed.changed() => {
                    let period = *speed.borrow_and_update();
                    interval = tokio::time::interval_at(Instant::now() + period, period);
                    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
                }
                _ = interval.tick() => {
                    ticks += 1;
                    match session.tick() {
                        TickOutcome::Continued(_) => {}
                        TickOutcome::EpisodeFinished { .. } => episodes += 1,
                        TickOutcome::Stopped => break StopReason::NeedsStop,
                    }
                }
            }
        };

        info!(ticks, episodes, ?reason, "tick driver stopped");
        Ok(DriverReport {
            ticks,
            episodes,
            reason,
        })
    }
}

impl Default for TickDriver {
    fn default() -> Self {
        Self::new(Duration::from_millis(50))
    }
}
