use crate::engine::monitor::{Monitor, Observation};
use crate::engine::notify::Notifier;
use crate::engine::ticket_api::{normalize, EventSource, FetchOutcome};
use crate::engine::types::{EventId, EventRecord};
use chrono::{DateTime, Local};
use futures_util::future::BoxFuture;
use futures_util::stream::{FuturesUnordered, StreamExt};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

struct Fetch {
    cycle: u64,
    id: EventId,
    outcome: FetchOutcome,
}

struct CycleProgress {
    remaining: usize,
    records: Vec<EventRecord>,
}

#[derive(Debug, Clone)]
pub struct CycleReport {
    pub cycle: u64,
    pub records: Vec<EventRecord>,
    pub completed_at: DateTime<Local>,
}

#[derive(Debug, Clone)]
pub struct Advance {
    pub observation: Observation,
    /// Set when this fetch was the last outstanding one of its cycle.
    pub completed: Option<CycleReport>,
}

/// Drives poll cycles: every configured id is fetched concurrently on the
/// calling task, each result is diffed (and alerted) as soon as it lands, and
/// a cycle report is produced once all fetches of that cycle settled.
/// Cycles may overlap; each is tracked on its own.
pub struct Poller<S, N> {
    source: Arc<S>,
    event_ids: Vec<EventId>,
    monitor: Monitor<N>,
    in_flight: FuturesUnordered<BoxFuture<'static, Fetch>>,
    cycles: BTreeMap<u64, CycleProgress>,
    next_cycle: u64,
}

impl<S: EventSource, N: Notifier> Poller<S, N> {
    pub fn new(source: S, event_ids: Vec<EventId>, monitor: Monitor<N>) -> Self {
        Self {
            source: Arc::new(source),
            event_ids,
            monitor,
            in_flight: FuturesUnordered::new(),
            cycles: BTreeMap::new(),
            next_cycle: 0,
        }
    }

    pub fn event_ids(&self) -> &[EventId] {
        &self.event_ids
    }

    pub fn monitor(&self) -> &Monitor<N> {
        &self.monitor
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    pub fn start_cycle(&mut self) -> u64 {
        let cycle = self.next_cycle;
        self.next_cycle += 1;
        if self.event_ids.is_empty() {
            return cycle;
        }

        for &id in &self.event_ids {
            let source = Arc::clone(&self.source);
            self.in_flight.push(Box::pin(async move {
                let outcome = source.fetch(id).await;
                Fetch { cycle, id, outcome }
            }));
        }
        self.cycles.insert(
            cycle,
            CycleProgress {
                remaining: self.event_ids.len(),
                records: Vec::with_capacity(self.event_ids.len()),
            },
        );
        debug!(cycle, ids = self.event_ids.len(), "poll cycle started");
        cycle
    }

    /// Wait for the next fetch to settle and apply it. Never resolves while
    /// nothing is in flight.
    pub async fn advance(&mut self) -> Advance {
        let Some(fetch) = self.in_flight.next().await else {
            return std::future::pending().await;
        };

        let observation = self.monitor.observe(normalize(fetch.id, fetch.outcome));

        let mut finished = false;
        if let Some(progress) = self.cycles.get_mut(&fetch.cycle) {
            progress.records.push(observation.record.clone());
            progress.remaining = progress.remaining.saturating_sub(1);
            finished = progress.remaining == 0;
        }
        let completed = if finished {
            self.cycles.remove(&fetch.cycle).map(|progress| CycleReport {
                cycle: fetch.cycle,
                records: progress.records,
                completed_at: Local::now(),
            })
        } else {
            None
        };
        if let Some(report) = &completed {
            debug!(cycle = report.cycle, records = report.records.len(), "poll cycle done");
        }

        Advance {
            observation,
            completed,
        }
    }

    /// One full poll cycle outside any schedule.
    pub async fn run_poll_cycle(&mut self) -> CycleReport {
        let cycle = self.start_cycle();
        if self.event_ids.is_empty() {
            return CycleReport {
                cycle,
                records: Vec::new(),
                completed_at: Local::now(),
            };
        }
        loop {
            if let Some(report) = self.advance().await.completed {
                if report.cycle == cycle {
                    return report;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::testing::{RecordingNotifier, ScriptedSource};
    use std::time::Duration;

    fn poller(
        ids: Vec<EventId>,
    ) -> (
        Poller<ScriptedSource, RecordingNotifier>,
        ScriptedSource,
        RecordingNotifier,
    ) {
        let source = ScriptedSource::default();
        let notifier = RecordingNotifier::default();
        let ignored = ["SOLD OUT".to_string()].into_iter().collect();
        let monitor = Monitor::new(ignored, notifier.clone());
        (
            Poller::new(source.clone(), ids, monitor),
            source,
            notifier,
        )
    }

    #[tokio::test]
    async fn cycle_fetches_every_id() {
        let (mut p, source, _) = poller(vec![232, 233, 234]);
        source.set_status(232, "SOLD OUT");
        source.set_status(233, "BOOK NOW");
        source.set(234, FetchOutcome::HttpStatus(503));

        let report = p.run_poll_cycle().await;
        let mut ids: Vec<_> = report.records.iter().map(|r| r.id).collect();
        ids.sort();
        assert_eq!(ids, vec![232, 233, 234]);
        let mut calls = source.calls();
        calls.sort();
        assert_eq!(calls, vec![232, 233, 234]);
        assert_eq!(p.in_flight(), 0);
    }

    #[tokio::test]
    async fn scenario_sold_out_then_book_now() {
        let (mut p, source, notifier) = poller(vec![232]);
        source.set_status(232, "SOLD OUT");
        p.run_poll_cycle().await;
        assert_eq!(notifier.relay_count(), 0);
        let history_before = p.monitor().history(232).len();

        source.set_status(232, "BOOK NOW");
        let report = p.run_poll_cycle().await;
        assert!(report.records[0].highlight);
        assert_eq!(notifier.relay_count(), 1);
        assert_eq!(notifier.local_count(), 1);
        assert_eq!(p.monitor().history(232).len(), history_before + 1);
        assert_eq!(p.monitor().previous_status(232), Some("BOOK NOW"));
    }

    #[tokio::test]
    async fn previous_status_tracks_every_successful_fetch() {
        let (mut p, source, _) = poller(vec![1, 2]);
        source.set_status(1, "SOLD OUT");
        source.set_status(2, "N/A");
        let report = p.run_poll_cycle().await;
        for rec in &report.records {
            assert_eq!(p.monitor().previous_status(rec.id), Some(rec.status.as_str()));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn slow_fetch_does_not_hold_back_alerts() {
        let (mut p, source, notifier) = poller(vec![1, 2]);
        let slow = br#"{"result":{"button_text":"SOLD OUT"}}"#.to_vec();
        source.set_delayed(1, FetchOutcome::Body(slow), Some(Duration::from_secs(30)));
        source.set_status(2, "BOOK NOW");

        p.start_cycle();
        let first = p.advance().await;
        assert_eq!(first.observation.record.id, 2);
        assert!(first.completed.is_none());
        assert_eq!(notifier.relay_count(), 1);

        let second = p.advance().await;
        assert_eq!(second.observation.record.id, 1);
        let report = second.completed.expect("cycle should complete");
        assert_eq!(report.records.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn overlapping_cycles_complete_independently() {
        let (mut p, source, _) = poller(vec![1]);
        let body = br#"{"result":{"button_text":"SOLD OUT"}}"#.to_vec();
        source.set_delayed(1, FetchOutcome::Body(body), Some(Duration::from_secs(20)));
        let first = p.start_cycle();
        // Let the first fetch get underway before the script changes.
        let pending = tokio::time::timeout(Duration::from_secs(1), p.advance()).await;
        assert!(pending.is_err());
        source.set_status(1, "BOOK NOW");
        let second = p.start_cycle();
        assert_eq!(p.in_flight(), 2);

        let a = p.advance().await.completed.unwrap();
        let b = p.advance().await.completed.unwrap();
        assert_eq!(a.cycle, second);
        assert_eq!(b.cycle, first);
        // The late result is applied on arrival.
        assert_eq!(p.monitor().previous_status(1), Some("SOLD OUT"));
    }

    #[tokio::test(start_paused = true)]
    async fn advance_is_pending_when_idle() {
        let (mut p, _, _) = poller(vec![1]);
        let res = tokio::time::timeout(Duration::from_secs(60), p.advance()).await;
        assert!(res.is_err());
    }
}
