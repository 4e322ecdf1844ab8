//! Single-task stopwatch.
//!
//! `Idle -> Running -> Paused -> Running -> ... -> Idle`. Elapsed time is always recomputed
//! from a run start instant (`now - base * 1000`) so repeated ticks never drift, and time
//! is written out through a [`TimeSink`] only on pause and stop.

use std::cell::Cell;
use std::rc::Rc;
use std::time::Duration;
use tracing::{debug, info};

/// How often the displayed elapsed value is resampled while running
pub const TICK_INTERVAL: Duration = Duration::from_secs(1);

/// Millisecond wall clock
pub trait Clock {
    fn now_millis(&self) -> i64;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }
}

/// Clock that only moves when told to. Clones share the same instant.
#[derive(Debug, Default, Clone)]
pub struct ManualClock {
    now: Rc<Cell<i64>>,
}

impl ManualClock {
    pub fn new(start_millis: i64) -> Self {
        Self {
            now: Rc::new(Cell::new(start_millis)),
        }
    }

    pub fn advance(&self, by: Duration) {
        self.now.set(self.now.get() + by.as_millis() as i64);
    }

    pub fn set(&self, millis: i64) {
        self.now.set(millis);
    }
}

impl Clock for ManualClock {
    fn now_millis(&self) -> i64 {
        self.now.get()
    }
}

/// Receives flushed elapsed seconds for a task. Implementations log their own failures;
/// the timer transitions regardless.
pub trait TimeSink {
    fn flush(&mut self, task_id: &str, seconds: u64);
}

/// Repeating schedule owned by the running state. Dropping it is the cancellation.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Ticker {
    period_ms: i64,
    next_due_ms: i64,
}

impl Ticker {
    fn start(now_ms: i64, period: Duration) -> Self {
        let period_ms = (period.as_millis() as i64).max(1);
        Self {
            period_ms,
            next_due_ms: now_ms + period_ms,
        }
    }

    /// True when at least one period boundary has passed since the last poll.
    /// Missed boundaries collapse into a single tick.
    fn poll(&mut self, now_ms: i64) -> bool {
        // Wall clock stepped backwards: restart the schedule from now
        if now_ms < self.next_due_ms - self.period_ms {
            self.next_due_ms = now_ms + self.period_ms;
            return false;
        }
        if now_ms < self.next_due_ms {
            return false;
        }
        let missed = (now_ms - self.next_due_ms) / self.period_ms + 1;
        self.next_due_ms += missed * self.period_ms;
        true
    }

    fn remaining(&self, now_ms: i64) -> Duration {
        Duration::from_millis((self.next_due_ms - now_ms).max(0) as u64)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum TimerState {
    Idle,
    Running {
        task_id: String,
        run_start_ms: i64,
        persisted: u64,
        ticker: Ticker,
    },
    Paused {
        task_id: String,
        elapsed: u64,
        persisted: u64,
    },
}

/// Read-only view of the timer for rendering
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TimerView {
    pub active_task_id: Option<String>,
    pub running: bool,
    pub elapsed: u64,
}

#[derive(Debug, Clone)]
pub struct Timer {
    state: TimerState,
    elapsed: u64,
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}

fn elapsed_since(run_start_ms: i64, now_ms: i64) -> u64 {
    (now_ms.saturating_sub(run_start_ms).max(0) / 1000) as u64
}

/// Instant a run would have started to show `base_seconds` at `now_ms`
fn run_start_for(now_ms: i64, base_seconds: u64) -> i64 {
    let base_ms = i64::try_from(base_seconds).unwrap_or(i64::MAX).saturating_mul(1000);
    now_ms.saturating_sub(base_ms)
}

impl Timer {
    pub fn new() -> Self {
        Self {
            state: TimerState::Idle,
            elapsed: 0,
        }
    }

    pub fn active_task_id(&self) -> Option<&str> {
        match &self.state {
            TimerState::Idle => None,
            TimerState::Running { task_id, .. } | TimerState::Paused { task_id, .. } => Some(task_id),
        }
    }

    pub fn is_active(&self, task_id: &str) -> bool {
        self.active_task_id() == Some(task_id)
    }

    pub fn is_running(&self) -> bool {
        matches!(self.state, TimerState::Running { .. })
    }

    pub fn is_paused(&self) -> bool {
        matches!(self.state, TimerState::Paused { .. })
    }

    /// Last sampled elapsed seconds (what the display shows)
    pub fn elapsed(&self) -> u64 {
        self.elapsed
    }

    pub fn snapshot(&self) -> TimerView {
        TimerView {
            active_task_id: self.active_task_id().map(str::to_string),
            running: self.is_running(),
            elapsed: self.elapsed,
        }
    }

    /// Start timing `task_id`, continuing from `base_seconds`.
    ///
    /// A different active task is stopped (and flushed) before the new one becomes active.
    /// Starting the running task is a no-op; starting the paused task resumes it.
    pub fn start(&mut self, task_id: &str, base_seconds: u64, clock: &dyn Clock, sink: &mut dyn TimeSink) {
        match &self.state {
            TimerState::Running { task_id: current, .. } if current == task_id => {
                debug!(task_id, "timer already running for task");
                return;
            }
            TimerState::Paused { task_id: current, .. } if current == task_id => {
                self.resume(clock);
                return;
            }
            TimerState::Idle => {}
            _ => self.stop(clock, sink),
        }

        let now = clock.now_millis();
        self.state = TimerState::Running {
            task_id: task_id.to_string(),
            run_start_ms: run_start_for(now, base_seconds),
            persisted: base_seconds,
            ticker: Ticker::start(now, TICK_INTERVAL),
        };
        self.elapsed = base_seconds;
        info!(task_id, base_seconds, "timer started");
    }

    /// Continue a paused run from its retained elapsed value
    pub fn resume(&mut self, clock: &dyn Clock) {
        let TimerState::Paused { task_id, elapsed, persisted } = &self.state else {
            debug!("resume ignored: timer is not paused");
            return;
        };
        let (task_id, elapsed, persisted) = (task_id.clone(), *elapsed, *persisted);
        let now = clock.now_millis();
        info!(task_id = %task_id, elapsed, "timer resumed");
        self.state = TimerState::Running {
            task_id,
            run_start_ms: run_start_for(now, elapsed),
            persisted,
            ticker: Ticker::start(now, TICK_INTERVAL),
        };
        self.elapsed = elapsed;
    }

    pub fn pause(&mut self, clock: &dyn Clock, sink: &mut dyn TimeSink) {
        let TimerState::Running { task_id, run_start_ms, persisted, .. } = &self.state else {
            debug!("pause ignored: timer is not running");
            return;
        };
        let task_id = task_id.clone();
        let elapsed = elapsed_since(*run_start_ms, clock.now_millis());
        if elapsed != *persisted {
            sink.flush(&task_id, elapsed);
        }
        info!(task_id = %task_id, elapsed, "timer paused");
        self.state = TimerState::Paused {
            task_id,
            elapsed,
            persisted: elapsed,
        };
        self.elapsed = elapsed;
    }

    /// Flush (if changed and non-zero) and return to idle. Safe from any state.
    pub fn stop(&mut self, clock: &dyn Clock, sink: &mut dyn TimeSink) {
        let pending = match &self.state {
            TimerState::Idle => None,
            TimerState::Running { task_id, run_start_ms, persisted, .. } => {
                Some((task_id.clone(), elapsed_since(*run_start_ms, clock.now_millis()), *persisted))
            }
            TimerState::Paused { task_id, elapsed, persisted } => Some((task_id.clone(), *elapsed, *persisted)),
        };

        if let Some((task_id, elapsed, persisted)) = pending {
            if elapsed > 0 && elapsed != persisted {
                sink.flush(&task_id, elapsed);
            }
            info!(task_id = %task_id, elapsed, "timer stopped");
        }

        self.state = TimerState::Idle;
        self.elapsed = 0;
    }

    /// Resample elapsed time if a tick is due. Returns the new value when it changed.
    pub fn tick(&mut self, clock: &dyn Clock) -> Option<u64> {
        let TimerState::Running { run_start_ms, ticker, .. } = &mut self.state else {
            return None;
        };
        let now = clock.now_millis();
        if !ticker.poll(now) {
            return None;
        }
        let elapsed = elapsed_since(*run_start_ms, now);
        if elapsed == self.elapsed {
            return None;
        }
        self.elapsed = elapsed;
        Some(elapsed)
    }

    /// Time until the next tick, or `None` when no tick is scheduled
    pub fn next_tick_in(&self, clock: &dyn Clock) -> Option<Duration> {
        match &self.state {
            TimerState::Running { ticker, .. } => Some(ticker.remaining(clock.now_millis())),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct RecordingSink {
        flushes: Vec<(String, u64)>,
    }

    impl TimeSink for RecordingSink {
        fn flush(&mut self, task_id: &str, seconds: u64) {
            self.flushes.push((task_id.to_string(), seconds));
        }
    }

    fn run_ticks(timer: &mut Timer, clock: &ManualClock, ticks: usize) {
        for _ in 0..ticks {
            clock.advance(TICK_INTERVAL);
            timer.tick(clock);
        }
    }

    #[test]
    fn test_five_ticks_then_stop_persists_five_seconds() {
        let clock = ManualClock::new(1_000_000);
        let mut sink = RecordingSink::default();
        let mut timer = Timer::new();

        timer.start("x", 0, &clock, &mut sink);
        run_ticks(&mut timer, &clock, 5);
        assert_eq!(timer.elapsed(), 5);

        timer.stop(&clock, &mut sink);
        assert_eq!(sink.flushes, vec![("x".to_string(), 5)]);
    }

    #[test]
    fn test_starting_other_task_flushes_previous_first() {
        let clock = ManualClock::new(0);
        let mut sink = RecordingSink::default();
        let mut timer = Timer::new();

        timer.start("a", 10, &clock, &mut sink);
        run_ticks(&mut timer, &clock, 3);
        assert!(sink.flushes.is_empty());

        timer.start("b", 40, &clock, &mut sink);
        assert_eq!(sink.flushes, vec![("a".to_string(), 13)]);
        assert_eq!(timer.active_task_id(), Some("b"));
        assert!(timer.is_running());
        assert_eq!(timer.elapsed(), 40);
    }

    #[test]
    fn test_pause_resume_preserves_elapsed_exactly() {
        let clock = ManualClock::new(0);
        let mut sink = RecordingSink::default();
        let mut timer = Timer::new();

        timer.start("a", 0, &clock, &mut sink);
        clock.advance(Duration::from_millis(7_400));
        timer.pause(&clock, &mut sink);
        assert_eq!(timer.elapsed(), 7);
        assert_eq!(sink.flushes, vec![("a".to_string(), 7)]);

        // Time passing while paused is not counted
        clock.advance(Duration::from_secs(60));
        timer.start("a", 0, &clock, &mut sink);
        assert!(timer.is_running());
        assert_eq!(timer.elapsed(), 7);

        clock.advance(Duration::from_secs(2));
        timer.tick(&clock);
        assert_eq!(timer.elapsed(), 9);
    }

    #[test]
    fn test_stop_always_returns_to_idle() {
        let clock = ManualClock::new(0);
        let mut sink = RecordingSink::default();
        let mut timer = Timer::new();

        timer.stop(&clock, &mut sink);
        assert_eq!(timer.snapshot(), TimerView { active_task_id: None, running: false, elapsed: 0 });

        timer.start("a", 0, &clock, &mut sink);
        clock.advance(Duration::from_secs(3));
        timer.pause(&clock, &mut sink);
        timer.stop(&clock, &mut sink);
        assert_eq!(timer.snapshot(), TimerView { active_task_id: None, running: false, elapsed: 0 });
        // pause already flushed 3; stop has nothing new to write
        assert_eq!(sink.flushes, vec![("a".to_string(), 3)]);
    }

    #[test]
    fn test_stop_without_progress_does_not_write() {
        let clock = ManualClock::new(0);
        let mut sink = RecordingSink::default();
        let mut timer = Timer::new();

        timer.start("a", 0, &clock, &mut sink);
        clock.advance(Duration::from_millis(400));
        timer.stop(&clock, &mut sink);

        timer.start("b", 25, &clock, &mut sink);
        timer.stop(&clock, &mut sink);
        assert!(sink.flushes.is_empty());
    }

    #[test]
    fn test_start_same_running_task_is_noop() {
        let clock = ManualClock::new(0);
        let mut sink = RecordingSink::default();
        let mut timer = Timer::new();

        timer.start("a", 5, &clock, &mut sink);
        clock.advance(Duration::from_secs(2));
        timer.start("a", 0, &clock, &mut sink);
        clock.advance(Duration::from_secs(1));
        timer.tick(&clock);
        assert_eq!(timer.elapsed(), 8);
        assert!(sink.flushes.is_empty());
    }

    #[test]
    fn test_pause_from_idle_or_paused_is_noop() {
        let clock = ManualClock::new(0);
        let mut sink = RecordingSink::default();
        let mut timer = Timer::new();

        timer.pause(&clock, &mut sink);
        assert_eq!(timer.active_task_id(), None);

        timer.start("a", 0, &clock, &mut sink);
        clock.advance(Duration::from_secs(1));
        timer.pause(&clock, &mut sink);
        clock.advance(Duration::from_secs(1));
        timer.pause(&clock, &mut sink);
        assert_eq!(sink.flushes.len(), 1);
        assert!(timer.is_paused());
    }

    #[test]
    fn test_ticker_is_dropped_when_leaving_running() {
        let clock = ManualClock::new(0);
        let mut sink = RecordingSink::default();
        let mut timer = Timer::new();

        assert_eq!(timer.next_tick_in(&clock), None);
        timer.start("a", 0, &clock, &mut sink);
        assert_eq!(timer.next_tick_in(&clock), Some(TICK_INTERVAL));

        timer.pause(&clock, &mut sink);
        assert_eq!(timer.next_tick_in(&clock), None);
        clock.advance(Duration::from_secs(5));
        assert_eq!(timer.tick(&clock), None);

        timer.resume(&clock);
        timer.stop(&clock, &mut sink);
        assert_eq!(timer.next_tick_in(&clock), None);
    }

    #[test]
    fn test_tick_does_not_drift_when_ticks_are_late() {
        let clock = ManualClock::new(0);
        let mut sink = RecordingSink::default();
        let mut timer = Timer::new();

        timer.start("a", 0, &clock, &mut sink);
        clock.advance(Duration::from_millis(1_300));
        assert_eq!(timer.tick(&clock), Some(1));
        clock.advance(Duration::from_millis(2_900));
        assert_eq!(timer.tick(&clock), Some(4));
        // next boundary is still aligned to the run start
        assert_eq!(timer.next_tick_in(&clock), Some(Duration::from_millis(800)));
    }

    #[test]
    fn test_huge_base_does_not_overflow() {
        let clock = ManualClock::new(0);
        let mut sink = RecordingSink::default();
        let mut timer = Timer::new();

        timer.start("a", crate::models::MAX_TIME_SPENT, &clock, &mut sink);
        assert_eq!(timer.elapsed(), crate::models::MAX_TIME_SPENT);
        timer.pause(&clock, &mut sink);
        assert!(sink.flushes.is_empty());
        assert_eq!(timer.elapsed(), crate::models::MAX_TIME_SPENT);

        timer.start("b", u64::MAX, &clock, &mut sink);
        clock.advance(Duration::from_secs(1));
        timer.tick(&clock);
        timer.stop(&clock, &mut sink);
        assert_eq!(timer.snapshot(), TimerView { active_task_id: None, running: false, elapsed: 0 });
    }

    #[test]
    fn test_clock_stepping_back_restarts_ticks() {
        let clock = ManualClock::new(100_000);
        let mut sink = RecordingSink::default();
        let mut timer = Timer::new();

        timer.start("a", 0, &clock, &mut sink);
        run_ticks(&mut timer, &clock, 3);
        assert_eq!(timer.elapsed(), 3);

        // Wall clock jumps back a minute
        clock.set(43_000);
        assert_eq!(timer.tick(&clock), None);
        assert_eq!(timer.next_tick_in(&clock), Some(TICK_INTERVAL));

        // Before the run start, so elapsed reads as zero, but ticks keep coming
        clock.advance(TICK_INTERVAL);
        assert_eq!(timer.tick(&clock), Some(0));
        assert_eq!(timer.next_tick_in(&clock), Some(TICK_INTERVAL));
    }
}
