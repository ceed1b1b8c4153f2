use crate::engine::types::{EventId, EventRecord};
use anyhow::{Context, Result};
use reqwest::Url;
use serde::Deserialize;
use serde_json::Value;
use std::future::Future;
use tracing::{debug, warn};

/// Raw result of one upstream request, before normalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    Body(Vec<u8>),
    HttpStatus(u16),
    /// Success status but the body could not be read.
    Unreadable,
    Transport(String),
}

/// Normalized fetch result. Only `Event` takes part in change detection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fetched {
    Event(EventRecord),
    Failed(EventRecord),
}

impl Fetched {
    pub fn record(&self) -> &EventRecord {
        match self {
            Fetched::Event(r) | Fetched::Failed(r) => r,
        }
    }

    pub fn into_record(self) -> EventRecord {
        match self {
            Fetched::Event(r) | Fetched::Failed(r) => r,
        }
    }
}

pub trait EventSource: Send + Sync + 'static {
    fn fetch(&self, id: EventId) -> impl Future<Output = FetchOutcome> + Send;
}

#[derive(Clone)]
pub struct TicketApi {
    http: reqwest::Client,
    base_url: Url,
}

impl TicketApi {
    pub fn new(base_url: &str) -> Result<Self> {
        let mut base = base_url.trim().to_string();
        if !base.ends_with('/') {
            base.push('/');
        }
        let base_url = Url::parse(&base).context("invalid ticket api base url")?;
        Ok(Self {
            http: reqwest::Client::new(),
            base_url,
        })
    }

    pub fn event_url(&self, id: EventId) -> Result<Url> {
        self.base_url
            .join(&format!("Event/id/{id}"))
            .context("build event url")
    }
}

impl EventSource for TicketApi {
    async fn fetch(&self, id: EventId) -> FetchOutcome {
        let url = match self.event_url(id) {
            Ok(url) => url,
            Err(e) => return FetchOutcome::Transport(format!("{e:#}")),
        };

        let resp = match self.http.get(url).send().await {
            Ok(resp) => resp,
            Err(e) => {
                warn!(event_id = id, err = %e, "event request failed");
                return FetchOutcome::Transport(e.to_string());
            }
        };

        let status = resp.status();
        if !status.is_success() {
            debug!(event_id = id, status = status.as_u16(), "event request non-200");
            return FetchOutcome::HttpStatus(status.as_u16());
        }

        match resp.bytes().await {
            Ok(body) => FetchOutcome::Body(body.to_vec()),
            Err(e) => {
                warn!(event_id = id, err = %e, "event body read failed");
                FetchOutcome::Unreadable
            }
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct ApiEvent {
    #[serde(default)]
    button_text: Option<Value>,
    #[serde(default)]
    name: Option<Value>,
    #[serde(default)]
    venue_name: Option<Value>,
    #[serde(default)]
    venue: Option<Value>,
    #[serde(default)]
    location: Option<Value>,
    #[serde(default)]
    stadium: Option<Value>,
    #[serde(default)]
    venue_address: Option<Value>,
    #[serde(default)]
    display_date: Option<Value>,
    #[serde(default)]
    display_time: Option<Value>,
    #[serde(default)]
    banner_url: Option<Value>,
}

/// Empty strings and non-scalar values count as missing. Whitespace is kept.
fn text(v: &Option<Value>) -> Option<String> {
    match v.as_ref()? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

impl ApiEvent {
    fn into_record(self, id: EventId) -> EventRecord {
        let venue = text(&self.venue_name)
            .or_else(|| text(&self.venue))
            .or_else(|| text(&self.location))
            .or_else(|| text(&self.stadium))
            .unwrap_or_else(|| "Venue not available".to_string());

        let time = match (text(&self.display_date), text(&self.display_time)) {
            (Some(date), Some(time)) => format!("{date} {time}"),
            (Some(date), None) => date,
            (None, Some(time)) => time,
            (None, None) => String::new(),
        };

        EventRecord {
            id,
            name: text(&self.name).unwrap_or_else(|| format!("Event {id}")),
            status: text(&self.button_text).unwrap_or_else(|| "N/A".to_string()),
            time,
            venue,
            address: text(&self.venue_address).unwrap_or_default(),
            banner: text(&self.banner_url),
            highlight: false,
        }
    }
}

/// `null`, `false`, zero and `""` carry no event.
fn is_falsy(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(_) | Value::Object(_) => false,
    }
}

fn parse_body(id: EventId, body: &[u8]) -> Option<EventRecord> {
    let value: Value = serde_json::from_slice(body).ok()?;
    if is_falsy(&value) {
        return None;
    }
    let raw = value
        .get("result")
        .filter(|r| r.is_object())
        .and_then(|r| ApiEvent::deserialize(r).ok())
        .unwrap_or_default();
    Some(raw.into_record(id))
}

pub fn normalize(id: EventId, outcome: FetchOutcome) -> Fetched {
    match outcome {
        FetchOutcome::Body(body) => match parse_body(id, &body) {
            Some(record) => Fetched::Event(record),
            None => Fetched::Failed(EventRecord::failed(id, "Invalid response")),
        },
        FetchOutcome::HttpStatus(code) => {
            Fetched::Failed(EventRecord::failed(id, format!("Error ({code})")))
        }
        FetchOutcome::Unreadable => Fetched::Failed(EventRecord::failed(id, "Invalid response")),
        FetchOutcome::Transport(_) => Fetched::Failed(EventRecord::failed(id, "Fetch error")),
    }
}
