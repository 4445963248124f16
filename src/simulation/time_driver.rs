//! Scaled embassy-time driver.
//!
//! Virtual time advances at `speed_percent` of wall-clock time, so every
//! `Timer` in the simulation task (and with it the tick cadence) speeds up or
//! slows down with the UI slider. Clock and wake queue sit behind one mutex; a
//! background thread sleeps until the earliest deadline and wakes due tasks.

use core::task::Waker;
use embassy_time_driver::{Driver, TICK_HZ, time_driver_impl};
use std::collections::BTreeMap;
use std::sync::{Condvar, Mutex, MutexGuard, OnceLock, PoisonError};
use std::time::{Duration, Instant as StdInstant};

pub const MIN_SPEED_PERCENT: u32 = 10;
pub const MAX_SPEED_PERCENT: u32 = 1000;

/// Upper bound on a single scheduler sleep, so a speed change never waits on a stale deadline for long.
const MAX_WAIT_SLICE: Duration = Duration::from_millis(25);

/// Piecewise-linear mapping between wall-clock instants and virtual ticks.
///
/// `ticks(real) = anchor_ticks + elapsed_since(anchor_real) * speed / 100`
#[derive(Debug, Clone, Copy)]
struct VirtualClock {
    anchor_real: StdInstant,
    anchor_ticks: u64,
    speed_percent: u32,
}

impl VirtualClock {
    fn new(anchor_real: StdInstant) -> Self {
        Self {
            anchor_real,
            anchor_ticks: 0,
            speed_percent: 100,
        }
    }

    fn ticks_at(&self, real: StdInstant) -> u64 {
        let elapsed_ns = real.saturating_duration_since(self.anchor_real).as_nanos();
        let virtual_ns = elapsed_ns * self.speed_percent as u128 / 100;
        let ticks = virtual_ns * TICK_HZ as u128 / 1_000_000_000;
        self.anchor_ticks.saturating_add(ticks.min(u64::MAX as u128) as u64)
    }

    /// Wall-clock instant at which `ticks` is reached. Deadlines before the
    /// anchor are already due and map to the anchor itself.
    fn real_at(&self, ticks: u64) -> StdInstant {
        let Some(delta) = ticks.checked_sub(self.anchor_ticks) else {
            return self.anchor_real;
        };
        let virtual_ns = delta as u128 * 1_000_000_000 / TICK_HZ as u128;
        let real_ns = virtual_ns * 100 / self.speed_percent as u128;
        let real_ns = real_ns.min(u64::MAX as u128) as u64;
        self.anchor_real
            .checked_add(Duration::from_nanos(real_ns))
            .unwrap_or_else(|| StdInstant::now() + MAX_WAIT_SLICE)
    }

    /// Change speed without a jump in virtual time at `now`.
    fn rebase(&mut self, now: StdInstant, speed_percent: u32) {
        self.anchor_ticks = self.ticks_at(now);
        self.anchor_real = now;
        self.speed_percent = speed_percent;
    }
}

#[derive(Debug)]
struct TimerState {
    clock: VirtualClock,
    /// Virtual deadline -> tasks waiting for it.
    wakers: BTreeMap<u64, Vec<Waker>>,
}

impl TimerState {
    fn take_due(&mut self, now_ticks: u64) -> Vec<Waker> {
        let pending = self.wakers.split_off(&now_ticks.saturating_add(1));
        std::mem::replace(&mut self.wakers, pending).into_values().flatten().collect()
    }
}

static STATE: OnceLock<Mutex<TimerState>> = OnceLock::new();
static WAKEUP: Condvar = Condvar::new();
static SCHEDULER: OnceLock<()> = OnceLock::new();

fn state() -> MutexGuard<'static, TimerState> {
    STATE
        .get_or_init(|| {
            Mutex::new(TimerState {
                clock: VirtualClock::new(StdInstant::now()),
                wakers: BTreeMap::new(),
            })
        })
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
}

fn ensure_scheduler_thread() {
    SCHEDULER.get_or_init(|| {
        if let Err(err) = std::thread::Builder::new().name("virtual-time-scheduler".into()).spawn(run_scheduler) {
            log::error!("Failed to start virtual time scheduler: {}", err);
        }
    });
}

fn run_scheduler() {
    let mut guard = state();
    loop {
        let now = StdInstant::now();
        let now_ticks = guard.clock.ticks_at(now);
        let due = guard.take_due(now_ticks);
        if !due.is_empty() {
            // Wake outside the lock: a woken task may immediately schedule again.
            drop(guard);
            due.into_iter().for_each(Waker::wake);
            guard = state();
            continue;
        }

        let next_deadline = guard.wakers.keys().next().copied();
        guard = match next_deadline {
            None => WAKEUP.wait(guard).unwrap_or_else(PoisonError::into_inner),
            Some(deadline) => {
                let wait = guard.clock.real_at(deadline).saturating_duration_since(now).min(MAX_WAIT_SLICE);
                WAKEUP.wait_timeout(guard, wait).unwrap_or_else(PoisonError::into_inner).0
            }
        };
    }
}

struct ScaledDriver;

impl Driver for ScaledDriver {
    fn now(&self) -> u64 {
        state().clock.ticks_at(StdInstant::now())
    }

    fn schedule_wake(&self, at: u64, waker: &Waker) {
        ensure_scheduler_thread();
        state().wakers.entry(at).or_default().push(waker.clone());
        WAKEUP.notify_all();
    }
}

time_driver_impl!(static DRIVER: ScaledDriver = ScaledDriver);

/// Set how fast virtual time runs relative to wall-clock time.
///
/// Clamped to `MIN_SPEED_PERCENT..=MAX_SPEED_PERCENT`. Returns the applied value.
pub fn set_simulation_speed_percent(percent: u32) -> u32 {
    let percent = percent.clamp(MIN_SPEED_PERCENT, MAX_SPEED_PERCENT);
    {
        let mut guard = state();
        if guard.clock.speed_percent == percent {
            return percent;
        }
        guard.clock.rebase(StdInstant::now(), percent);
    }
    // Sleeping scheduler must recompute its deadline under the new rate.
    WAKEUP.notify_all();
    log::debug!("Simulation speed set to {}%", percent);
    percent
}

pub fn get_simulation_speed_percent() -> u32 {
    state().clock.speed_percent
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECOND: u64 = TICK_HZ;

    #[test]
    fn ticks_follow_speed() {
        let anchor = StdInstant::now();
        let mut clock = VirtualClock::new(anchor);
        assert_eq!(clock.ticks_at(anchor + Duration::from_secs(2)), 2 * SECOND);

        clock.speed_percent = 250;
        assert_eq!(clock.ticks_at(anchor + Duration::from_secs(2)), 5 * SECOND);
    }

    #[test]
    fn rebase_keeps_virtual_time_continuous() {
        let anchor = StdInstant::now();
        let mut clock = VirtualClock::new(anchor);
        let switch = anchor + Duration::from_secs(3);
        let before = clock.ticks_at(switch);

        clock.rebase(switch, 400);

        assert_eq!(clock.ticks_at(switch), before);
        assert_eq!(clock.ticks_at(switch + Duration::from_secs(1)), before + 4 * SECOND);
    }

    #[test]
    fn real_at_inverts_ticks_at() {
        let anchor = StdInstant::now();
        let mut clock = VirtualClock::new(anchor);
        clock.rebase(anchor, 200);

        let target = clock.real_at(SECOND);
        assert_eq!(target.duration_since(anchor), Duration::from_millis(500));
        assert_eq!(clock.ticks_at(target), SECOND);
    }

    #[test]
    fn deadlines_before_the_anchor_are_due_immediately() {
        let anchor = StdInstant::now();
        let mut clock = VirtualClock::new(anchor);
        let later = anchor + Duration::from_secs(1);
        clock.rebase(later, 50);
        assert_eq!(clock.real_at(10), later);
    }

    #[test]
    fn take_due_splits_the_queue_at_now() {
        let mut state = TimerState {
            clock: VirtualClock::new(StdInstant::now()),
            wakers: BTreeMap::new(),
        };
        for deadline in [5, 10, 15] {
            state.wakers.entry(deadline).or_default().push(Waker::noop().clone());
        }

        assert_eq!(state.take_due(10).len(), 2);
        assert_eq!(state.wakers.keys().copied().collect::<Vec<_>>(), vec![15]);
        assert!(state.take_due(14).is_empty());
    }

    #[test]
    fn speed_is_clamped_to_slider_range() {
        assert_eq!(set_simulation_speed_percent(1), MIN_SPEED_PERCENT);
        assert_eq!(set_simulation_speed_percent(5000), MAX_SPEED_PERCENT);
        assert_eq!(get_simulation_speed_percent(), MAX_SPEED_PERCENT);
        set_simulation_speed_percent(100);
    }
}
