//! Fixed-cadence stepping, decoupled from any particular timer.
//!
//! Hosts feed elapsed wall-clock time into [`StepScheduler::advance`] (or call
//! [`StepScheduler::fire`] directly from their own interval callback). Tests
//! call `fire` to step deterministically.

use std::time::Duration;

/// Something that can be advanced one generation at a time.
pub trait LifeStepper {
    type Error;

    /// `false` while the backing context is lost or not yet initialized.
    fn is_ready(&self) -> bool {
        true
    }
    /// One compute pass followed by whatever presentation the stepper does.
    fn step(&mut self) -> Result<(), Self::Error>;
    /// Completed steps so far.
    fn steps(&self) -> u64;
}

/// A stepper that may not exist yet. Ticks before initialization are
/// skipped like any other not-ready tick.
impl<S: LifeStepper> LifeStepper for Option<S> {
    type Error = S::Error;

    fn is_ready(&self) -> bool {
        self.as_ref().is_some_and(|s| s.is_ready())
    }
    fn step(&mut self) -> Result<(), Self::Error> {
        match self {
            Some(s) => s.step(),
            None => Ok(()),
        }
    }
    fn steps(&self) -> u64 {
        self.as_ref().map_or(0, |s| s.steps())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TickOutcome {
    Stepped,
    /// The target was not ready; nothing ran and nothing was queued.
    Skipped,
    Stopped,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SchedulerStatistics {
    pub fired: u64,
    pub stepped: u64,
    pub skipped: u64,
    /// Whole intervals dropped because the host fell behind.
    pub dropped_intervals: u64,
}

#[derive(Clone, Debug)]
pub struct StepScheduler {
    interval: Duration,
    since_last: Duration,
    running: bool,
    stats: SchedulerStatistics,
}

impl StepScheduler {
    pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(200);

    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            since_last: Duration::ZERO,
            running: true,
            stats: SchedulerStatistics::default(),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }
    pub fn is_running(&self) -> bool {
        self.running
    }
    pub fn statistics(&self) -> SchedulerStatistics {
        self.stats
    }

    /// Halt future ticks. A tick already inside `fire` is unaffected.
    pub fn stop(&mut self) {
        self.running = false;
        self.since_last = Duration::ZERO;
    }

    pub fn resume(&mut self) {
        if !self.running {
            self.running = true;
            self.since_last = Duration::ZERO;
        }
    }

    /// Flip between stopped and running. Returns whether ticks now run.
    pub fn toggle(&mut self) -> bool {
        if self.running {
            self.stop();
        } else {
            self.resume();
        }
        self.running
    }

    /// Time left until the next tick is due.
    pub fn remaining(&self) -> Duration {
        self.interval.saturating_sub(self.since_last)
    }

    /// Account for `elapsed` wall-clock time. Returns `true` when a tick is
    /// due. At most one tick is reported per call; whole intervals beyond the
    /// first are discarded so a stalled host never catches up in a burst.
    pub fn advance(&mut self, elapsed: Duration) -> bool {
        if !self.running {
            return false;
        }
        self.since_last += elapsed;
        if self.since_last < self.interval {
            return false;
        }
        let overdue = self.since_last - self.interval;
        let dropped = overdue.as_nanos() / self.interval.as_nanos().max(1);
        self.stats.dropped_intervals += dropped as u64;
        self.since_last = Duration::from_nanos(
            (overdue.as_nanos() % self.interval.as_nanos().max(1)) as u64,
        );
        true
    }

    /// Run exactly one tick against `target`.
    pub fn fire<S>(&mut self, target: &mut S) -> Result<TickOutcome, S::Error>
    where
        S: LifeStepper + ?Sized,
    {
        if !self.running {
            return Ok(TickOutcome::Stopped);
        }
        self.stats.fired += 1;
        if !target.is_ready() {
            self.stats.skipped += 1;
            log::trace!("tick skipped, target not ready");
            return Ok(TickOutcome::Skipped);
        }
        target.step()?;
        self.stats.stepped += 1;
        Ok(TickOutcome::Stepped)
    }

    /// [`advance`](Self::advance) then [`fire`](Self::fire) if due.
    pub fn poll<S>(
        &mut self,
        elapsed: Duration,
        target: &mut S,
    ) -> Result<Option<TickOutcome>, S::Error>
    where
        S: LifeStepper + ?Sized,
    {
        if self.advance(elapsed) {
            self.fire(target).map(Some)
        } else {
            Ok(None)
        }
    }
}

impl Default for StepScheduler {
    fn default() -> Self {
        Self::new(Self::DEFAULT_INTERVAL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Counting {
        ready: bool,
        steps: u64,
    }

    impl LifeStepper for Counting {
        type Error = ();
        fn is_ready(&self) -> bool {
            self.ready
        }
        fn step(&mut self) -> Result<(), ()> {
            self.steps += 1;
            Ok(())
        }
        fn steps(&self) -> u64 {
            self.steps
        }
    }

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    #[test]
    fn fires_once_per_interval() {
        let mut sched = StepScheduler::new(ms(200));
        let mut target = Counting { ready: true, steps: 0 };
        assert_eq!(sched.poll(ms(150), &mut target), Ok(None));
        assert_eq!(sched.poll(ms(60), &mut target), Ok(Some(TickOutcome::Stepped)));
        assert_eq!(target.steps, 1);
        // 10ms carried over
        assert_eq!(sched.remaining(), ms(190));
    }

    #[test]
    fn stall_does_not_build_backlog() {
        let mut sched = StepScheduler::new(ms(200));
        let mut target = Counting { ready: true, steps: 0 };
        assert_eq!(sched.poll(ms(5_000), &mut target), Ok(Some(TickOutcome::Stepped)));
        assert_eq!(sched.poll(Duration::ZERO, &mut target), Ok(None));
        assert_eq!(target.steps, 1);
        assert_eq!(sched.statistics().dropped_intervals, 24);
    }

    #[test]
    fn skipped_ticks_are_not_queued() {
        let mut sched = StepScheduler::default();
        let mut target = Counting { ready: false, steps: 0 };
        for _ in 0..3 {
            assert_eq!(sched.fire(&mut target), Ok(TickOutcome::Skipped));
        }
        target.ready = true;
        assert_eq!(sched.fire(&mut target), Ok(TickOutcome::Stepped));
        assert_eq!(target.steps, 1);
        let stats = sched.statistics();
        assert_eq!((stats.fired, stats.skipped, stats.stepped), (4, 3, 1));
    }

    #[test]
    fn uninitialized_target_is_skipped() {
        let mut sched = StepScheduler::default();
        let mut target: Option<Counting> = None;
        assert_eq!(sched.fire(&mut target), Ok(TickOutcome::Skipped));
        assert_eq!(target.steps(), 0);

        target = Some(Counting { ready: true, steps: 0 });
        assert_eq!(sched.fire(&mut target), Ok(TickOutcome::Stepped));
        assert_eq!(target.steps(), 1);
    }

    #[test]
    fn stop_halts_and_resume_restarts_cleanly() {
        let mut sched = StepScheduler::new(ms(100));
        let mut target = Counting { ready: true, steps: 0 };
        sched.advance(ms(90));
        sched.stop();
        assert!(!sched.advance(ms(500)));
        assert_eq!(sched.fire(&mut target), Ok(TickOutcome::Stopped));
        assert_eq!(target.steps, 0);

        sched.resume();
        assert!(!sched.advance(ms(90)));
        assert!(sched.advance(ms(10)));
    }

    #[test]
    fn toggle_after_stop_runs_again() {
        let mut sched = StepScheduler::new(ms(100));
        let mut target = Counting { ready: true, steps: 0 };
        sched.stop();
        assert!(sched.toggle());
        assert!(sched.is_running());
        assert_eq!(sched.remaining(), ms(100));
        assert_eq!(sched.poll(ms(100), &mut target), Ok(Some(TickOutcome::Stepped)));

        assert!(!sched.toggle());
        assert_eq!(sched.poll(ms(500), &mut target), Ok(None));
        assert_eq!(target.steps, 1);
    }
}
