use std::time::Duration;
use tokio::time::{interval, interval_at, Instant, Interval, MissedTickBehavior};

const COUNTDOWN_PERIOD: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tick {
    Poll,
    Countdown,
}

struct Timers {
    poll: Interval,
    countdown: Interval,
}

/// The poll timer and the one-second countdown timer, armed and cancelled
/// together. Arming always replaces whatever was armed before, so at most one
/// pair of timers exists at any time.
#[derive(Default)]
pub struct Schedule {
    timers: Option<Timers>,
    armed: u64,
    cancelled: u64,
}

impl Schedule {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm both timers. The poll timer fires immediately, then every `period`.
    pub fn arm(&mut self, period: Duration) {
        self.disarm();
        let mut poll = interval(period);
        poll.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut countdown = interval_at(Instant::now() + COUNTDOWN_PERIOD, COUNTDOWN_PERIOD);
        countdown.set_missed_tick_behavior(MissedTickBehavior::Delay);
        self.timers = Some(Timers { poll, countdown });
        self.armed += 1;
    }

    pub fn disarm(&mut self) {
        if self.timers.take().is_some() {
            self.cancelled += 1;
        }
    }

    pub fn is_armed(&self) -> bool {
        self.timers.is_some()
    }

    pub fn armed_count(&self) -> u64 {
        self.armed
    }

    pub fn cancelled_count(&self) -> u64 {
        self.cancelled
    }

    /// Next due tick. Never resolves while disarmed.
    pub async fn tick(&mut self) -> Tick {
        let Some(timers) = self.timers.as_mut() else {
            return std::future::pending().await;
        };
        tokio::select! {
            biased;
            _ = timers.poll.tick() => Tick::Poll,
            _ = timers.countdown.tick() => Tick::Countdown,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn poll_fires_on_arm_then_every_period() {
        let mut s = Schedule::new();
        s.arm(Duration::from_secs(10));
        assert_eq!(s.tick().await, Tick::Poll);

        let start = Instant::now();
        let mut countdowns = 0;
        loop {
            match s.tick().await {
                Tick::Countdown => countdowns += 1,
                Tick::Poll => break,
            }
        }
        assert_eq!(countdowns, 9);
        assert_eq!(Instant::now() - start, Duration::from_secs(10));
        // The countdown due at the same instant still follows.
        assert_eq!(s.tick().await, Tick::Countdown);
    }

    #[tokio::test(start_paused = true)]
    async fn rearm_replaces_timers() {
        let mut s = Schedule::new();
        s.arm(Duration::from_secs(10));
        s.arm(Duration::from_secs(20));
        assert_eq!(s.armed_count(), 2);
        assert_eq!(s.cancelled_count(), 1);
        assert!(s.is_armed());

        assert_eq!(s.tick().await, Tick::Poll);
        let start = Instant::now();
        while s.tick().await != Tick::Poll {}
        assert_eq!(Instant::now() - start, Duration::from_secs(20));
    }

    #[tokio::test(start_paused = true)]
    async fn disarmed_schedule_never_ticks() {
        let mut s = Schedule::new();
        s.arm(Duration::from_secs(5));
        s.disarm();
        s.disarm();
        assert_eq!(s.cancelled_count(), 1);
        assert!(!s.is_armed());
        let res = tokio::time::timeout(Duration::from_secs(120), s.tick()).await;
        assert!(res.is_err());
    }
}
