use chrono::{DateTime, Local};
use std::collections::BTreeMap;

pub type EventId = u64;

/// Status that triggers the local alerts on top of the relay message.
pub const URGENT_STATUS: &str = "BOOK NOW";
pub const SOLD_OUT_STATUS: &str = "SOLD OUT";

pub const MIN_REFRESH_SECS: u64 = 5;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventRecord {
    pub id: EventId,
    pub name: String,
    pub status: String,
    pub time: String,
    pub venue: String,
    pub address: String,
    pub banner: Option<String>,
    pub highlight: bool,
}

impl EventRecord {
    /// Record carrying only an id and a synthetic status, produced when the
    /// upstream call did not yield a usable body.
    pub fn failed(id: EventId, status: impl Into<String>) -> Self {
        Self {
            id,
            status: status.into(),
            ..Self::default()
        }
    }

    pub fn tone(&self) -> StatusTone {
        StatusTone::of(&self.status)
    }

    pub fn display_time(&self) -> &str {
        if self.time.is_empty() {
            "Time not available"
        } else {
            &self.time
        }
    }

    pub fn display_venue(&self) -> String {
        let venue = if self.venue.is_empty() {
            "Venue not available"
        } else {
            &self.venue
        };
        if self.address.is_empty() {
            venue.to_string()
        } else {
            format!("{venue}, {}", self.address)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusTone {
    Urgent,
    SoldOut,
    Neutral,
}

impl StatusTone {
    pub fn of(status: &str) -> Self {
        match status {
            URGENT_STATUS => StatusTone::Urgent,
            SOLD_OUT_STATUS => StatusTone::SoldOut,
            _ => StatusTone::Neutral,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    pub time: String,
    pub status: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ViewMode {
    #[default]
    Grid,
    List,
}

impl ViewMode {
    pub fn toggled(self) -> Self {
        match self {
            ViewMode::Grid => ViewMode::List,
            ViewMode::List => ViewMode::Grid,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ViewMode::Grid => "grid",
            ViewMode::List => "list",
        }
    }
}

#[derive(Debug, Clone)]
pub struct PollState {
    pub events: BTreeMap<EventId, EventRecord>,
    pub last_updated: Option<DateTime<Local>>,
    pub refresh_secs: u64,
    pub paused: bool,
    pub next_refresh: u64,
    pub view_mode: ViewMode,
}

impl PollState {
    pub fn new(refresh_secs: u64) -> Self {
        let refresh_secs = refresh_secs.max(MIN_REFRESH_SECS);
        Self {
            events: BTreeMap::new(),
            last_updated: None,
            refresh_secs,
            paused: false,
            next_refresh: refresh_secs,
            view_mode: ViewMode::default(),
        }
    }

    /// Replace the displayed records with the outcome of one finished cycle.
    pub fn apply_cycle(&mut self, records: Vec<EventRecord>, at: DateTime<Local>) {
        self.events = records.into_iter().map(|r| (r.id, r)).collect();
        self.last_updated = Some(at);
        self.next_refresh = self.refresh_secs;
    }

    pub fn countdown_tick(&mut self) {
        self.next_refresh = if self.next_refresh > 0 {
            self.next_refresh - 1
        } else {
            self.refresh_secs
        };
    }
}
