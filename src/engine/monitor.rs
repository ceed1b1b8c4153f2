use crate::engine::diff::{fetch_and_diff, StatusChange};
use crate::engine::notify::{
    alert_message, urgent_alert_body, Notifier, ALERT_TITLE, TEST_BODY, TEST_RELAY_MESSAGE,
    TEST_TITLE,
};
use crate::engine::ticket_api::Fetched;
use crate::engine::timefmt::clock_string;
use crate::engine::types::{EventId, EventRecord, HistoryEntry};
use chrono::Local;
use std::collections::{HashMap, HashSet};
use tracing::info;

#[derive(Debug, Clone)]
pub struct Observation {
    pub record: EventRecord,
    pub change: Option<StatusChange>,
}

/// Per-session change tracking: last seen status and status history per
/// event, plus dispatch of the resulting notifications.
pub struct Monitor<N> {
    ignored: HashSet<String>,
    previous: HashMap<EventId, String>,
    history: HashMap<EventId, Vec<HistoryEntry>>,
    notifier: N,
}

impl<N: Notifier> Monitor<N> {
    pub fn new(ignored: HashSet<String>, notifier: N) -> Self {
        Self {
            ignored,
            previous: HashMap::new(),
            history: HashMap::new(),
            notifier,
        }
    }

    pub fn observe(&mut self, fetched: Fetched) -> Observation {
        let id = fetched.record().id;
        let diffed = fetch_and_diff(
            fetched,
            self.previous.get(&id).map(String::as_str),
            &self.ignored,
        );

        if let Some(change) = &diffed.change {
            self.dispatch(&diffed.record, change);
        }

        if diffed.observed {
            let status = diffed.record.status.clone();
            let entries = self.history.entry(id).or_default();
            if diffed.change.is_some() {
                entries.push(HistoryEntry {
                    time: clock_string(Local::now()),
                    status: status.clone(),
                });
            }
            self.previous.insert(id, status);
        }

        Observation {
            record: diffed.record,
            change: diffed.change,
        }
    }

    fn dispatch(&self, record: &EventRecord, change: &StatusChange) {
        if !change.notify {
            return;
        }
        info!(
            event_id = record.id,
            from = change.previous.as_deref().unwrap_or("-"),
            to = %change.status,
            urgent = change.urgent,
            "status change alert"
        );
        self.notifier
            .relay(&alert_message(record), record.banner.as_deref());
        if change.urgent {
            self.notifier.local_alert(
                ALERT_TITLE,
                &urgent_alert_body(record),
                record.banner.as_deref(),
            );
        }
    }

    /// Fire both sinks with canned content, bypassing change detection.
    pub fn send_test_notification(&self) {
        info!("test notification");
        self.notifier.relay(TEST_RELAY_MESSAGE, None);
        self.notifier.local_alert(TEST_TITLE, TEST_BODY, None);
    }

    pub fn previous_status(&self, id: EventId) -> Option<&str> {
        self.previous.get(&id).map(String::as_str)
    }

    pub fn history(&self, id: EventId) -> &[HistoryEntry] {
        self.history.get(&id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn notifier(&self) -> &N {
        &self.notifier
    }
}
