use crate::engine::monitor::{Monitor, Observation};
use crate::engine::notify::Notifier;
use crate::engine::poller::{CycleReport, Poller};
use crate::engine::schedule::{Schedule, Tick};
use crate::engine::ticket_api::EventSource;
use crate::engine::timefmt::clock_string;
use crate::engine::types::{EventId, HistoryEntry, PollState, MIN_REFRESH_SECS};
use chrono::Local;
use std::collections::VecDeque;
use std::time::Duration;
use tracing::{debug, info};

const MAX_LOG_LINES: usize = 200;

/// Operator controls accepted by a running session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    TogglePause,
    RefreshNow,
    TestNotification,
    SetInterval(u64),
    ToggleView,
}

#[derive(Debug, Clone)]
pub enum Step {
    PollStarted(u64),
    Observed(Observation),
    CycleComplete(CycleReport),
    Countdown,
}

/// One monitoring session: the poller, its timers and the dashboard state,
/// all driven from a single task through `step` and `apply`.
pub struct Session<S, N> {
    poller: Poller<S, N>,
    schedule: Schedule,
    state: PollState,
    logs: VecDeque<String>,
}

impl<S: EventSource, N: Notifier> Session<S, N> {
    /// Builds the session and arms the timers, so the first `step` starts a
    /// poll straight away.
    pub fn new(poller: Poller<S, N>, refresh_secs: u64) -> Self {
        let mut session = Self {
            poller,
            schedule: Schedule::new(),
            state: PollState::new(refresh_secs),
            logs: VecDeque::new(),
        };
        session.push_log(format!(
            "watching {} event(s) every {}s",
            session.poller.event_ids().len(),
            session.state.refresh_secs
        ));
        session.rearm();
        session
    }

    pub fn state(&self) -> &PollState {
        &self.state
    }

    pub fn schedule(&self) -> &Schedule {
        &self.schedule
    }

    pub fn monitor(&self) -> &Monitor<N> {
        self.poller.monitor()
    }

    pub fn event_ids(&self) -> &[EventId] {
        self.poller.event_ids()
    }

    pub fn history(&self, id: EventId) -> &[HistoryEntry] {
        self.poller.monitor().history(id)
    }

    pub fn logs(&self) -> &VecDeque<String> {
        &self.logs
    }

    pub fn push_log(&mut self, line: impl Into<String>) {
        let line = format!("{} {}", clock_string(Local::now()), line.into());
        self.logs.push_back(line);
        while self.logs.len() > MAX_LOG_LINES {
            self.logs.pop_front();
        }
    }

    fn rearm(&mut self) {
        if self.state.paused {
            self.schedule.disarm();
        } else {
            self.schedule
                .arm(Duration::from_secs(self.state.refresh_secs));
        }
    }

    pub fn apply(&mut self, control: Control) {
        match control {
            Control::TogglePause => {
                self.state.paused = !self.state.paused;
                self.rearm();
                let label = if self.state.paused { "paused" } else { "resumed" };
                info!(paused = self.state.paused, "polling {label}");
                self.push_log(format!("polling {label}"));
            }
            Control::RefreshNow => {
                let cycle = self.poller.start_cycle();
                debug!(cycle, "manual refresh");
                self.push_log("manual refresh");
            }
            Control::TestNotification => {
                self.poller.monitor().send_test_notification();
                self.push_log("test notification sent");
            }
            Control::SetInterval(secs) => {
                let secs = secs.max(MIN_REFRESH_SECS);
                if secs == self.state.refresh_secs {
                    return;
                }
                self.state.refresh_secs = secs;
                self.rearm();
                info!(refresh_secs = secs, "refresh interval changed");
                self.push_log(format!("interval set to {secs}s"));
            }
            Control::ToggleView => {
                self.state.view_mode = self.state.view_mode.toggled();
                self.push_log(format!("{} view", self.state.view_mode.label()));
            }
        }
    }

    /// Wait for the next thing to happen (a fetch settling or a timer firing)
    /// and fold it into the session. Never resolves while paused with nothing
    /// in flight.
    pub async fn step(&mut self) -> Step {
        tokio::select! {
            biased;
            advance = self.poller.advance() => {
                self.log_observation(&advance.observation);
                match advance.completed {
                    Some(report) => {
                        self.state
                            .apply_cycle(report.records.clone(), report.completed_at);
                        Step::CycleComplete(report)
                    }
                    None => Step::Observed(advance.observation),
                }
            }
            tick = self.schedule.tick() => match tick {
                Tick::Poll => Step::PollStarted(self.poller.start_cycle()),
                Tick::Countdown => {
                    self.state.countdown_tick();
                    Step::Countdown
                }
            },
        }
    }

    fn log_observation(&mut self, observation: &Observation) {
        let Some(change) = &observation.change else {
            return;
        };
        let record = &observation.record;
        let from = change.previous.as_deref().unwrap_or("new");
        let suffix = if change.notify { "" } else { " (ignored)" };
        self.push_log(format!(
            "[{}] {from} -> {}{suffix}",
            record.id, change.status
        ));
    }
}

impl<S, N> Drop for Session<S, N> {
    fn drop(&mut self) {
        self.schedule.disarm();
        debug!("session stopped");
    }
}
