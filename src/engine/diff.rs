//! Change detection between two consecutive observations of one event.
//!
//! Pure: no I/O and no state. The monitor feeds the previous status in and
//! decides what to do with the returned `StatusChange`.

use crate::engine::ticket_api::Fetched;
use crate::engine::types::{EventRecord, URGENT_STATUS};
use std::collections::HashSet;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusChange {
    pub previous: Option<String>,
    pub status: String,
    /// Relay message should go out.
    pub notify: bool,
    /// Local alerts (sound + desktop popup) should go out as well.
    pub urgent: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diffed {
    pub record: EventRecord,
    pub change: Option<StatusChange>,
    /// False when the fetch failed; such records leave the previous status alone.
    pub observed: bool,
}

pub fn fetch_and_diff(
    fetched: Fetched,
    previous: Option<&str>,
    ignored: &HashSet<String>,
) -> Diffed {
    let mut record = match fetched {
        Fetched::Event(record) => record,
        Fetched::Failed(record) => {
            return Diffed {
                record,
                change: None,
                observed: false,
            }
        }
    };

    let changed = previous != Some(record.status.as_str());
    record.highlight = changed;

    let change = changed.then(|| {
        let notify = !ignored.contains(&record.status);
        StatusChange {
            previous: previous.map(str::to_string),
            status: record.status.clone(),
            notify,
            urgent: notify && record.status == URGENT_STATUS,
        }
    });

    Diffed {
        record,
        change,
        observed: true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ignored() -> HashSet<String> {
        ["SOLD OUT".to_string()].into_iter().collect()
    }

    fn event(status: &str) -> Fetched {
        Fetched::Event(EventRecord {
            id: 232,
            name: "Final".into(),
            status: status.into(),
            ..EventRecord::default()
        })
    }

    #[test]
    fn sold_out_to_book_now_is_urgent() {
        let d = fetch_and_diff(event("BOOK NOW"), Some("SOLD OUT"), &ignored());
        assert!(d.record.highlight);
        let change = d.change.unwrap();
        assert!(change.notify);
        assert!(change.urgent);
        assert_eq!(change.previous.as_deref(), Some("SOLD OUT"));
    }

    #[test]
    fn unchanged_status_is_quiet() {
        let d = fetch_and_diff(event("BOOK NOW"), Some("BOOK NOW"), &ignored());
        assert!(!d.record.highlight);
        assert_eq!(d.change, None);
        assert!(d.observed);
    }

    #[test]
    fn change_into_ignored_status_is_not_notified() {
        let d = fetch_and_diff(event("SOLD OUT"), Some("BOOK NOW"), &ignored());
        let change = d.change.unwrap();
        assert!(!change.notify);
        assert!(!change.urgent);
        assert!(d.record.highlight);
    }

    #[test]
    fn non_urgent_change_only_relays() {
        let d = fetch_and_diff(event("FILLING FAST"), Some("SOLD OUT"), &ignored());
        let change = d.change.unwrap();
        assert!(change.notify);
        assert!(!change.urgent);
    }

    #[test]
    fn first_observation_counts_as_change() {
        let d = fetch_and_diff(event("SOLD OUT"), None, &ignored());
        let change = d.change.unwrap();
        assert_eq!(change.previous, None);
        assert!(!change.notify);
        assert!(d.record.highlight);
    }

    #[test]
    fn failed_fetch_is_not_diffed() {
        let d = fetch_and_diff(
            Fetched::Failed(EventRecord::failed(232, "Error (500)")),
            Some("SOLD OUT"),
            &ignored(),
        );
        assert!(!d.observed);
        assert_eq!(d.change, None);
        assert!(!d.record.highlight);
    }
}
