//! Outbound notification sinks.
//!
//! Both sinks are fire-and-forget: sends run on detached tasks and every
//! failure ends in a log line, never in an error returned to the caller.

use crate::engine::config::RelayConfig;
use crate::engine::types::{EventRecord, URGENT_STATUS};
use anyhow::{Context, Result};
use serde_json::{json, Value};
use std::io::{IsTerminal, Write};
use tracing::{debug, info, warn};

pub const ALERT_TITLE: &str = "Ticket Alert";
pub const TEST_TITLE: &str = "Test Alert";
pub const TEST_BODY: &str = "This is a test notification sound 🔔";
pub const TEST_RELAY_MESSAGE: &str = "🔔 *Test Alert*\nThis is a test notification from the ticket monitor";

pub trait Notifier: Send + Sync + 'static {
    fn relay(&self, message: &str, image: Option<&str>);
    fn local_alert(&self, title: &str, body: &str, image: Option<&str>);
}

/// Escape characters that legacy Telegram Markdown treats as markup.
fn escape_markdown(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if matches!(c, '_' | '*' | '`' | '[') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

pub fn alert_message(record: &EventRecord) -> String {
    format!(
        "⚡ *Ticket Alert*\nEvent: {}\nStatus: *{}*\nVenue: {}\nTime: {}",
        escape_markdown(&record.name),
        escape_markdown(&record.status),
        escape_markdown(&record.display_venue()),
        escape_markdown(record.display_time()),
    )
}

pub fn urgent_alert_body(record: &EventRecord) -> String {
    format!("{} is now {URGENT_STATUS}", record.name)
}

#[derive(Debug, Clone)]
struct RelayEndpoint {
    bot_url: String,
    chat_id: String,
}

#[derive(Clone)]
pub struct RelayClient {
    http: reqwest::Client,
    endpoint: Option<RelayEndpoint>,
}

impl RelayClient {
    pub fn new(cfg: &RelayConfig) -> Self {
        let endpoint = match (&cfg.token, &cfg.chat_id) {
            (Some(token), Some(chat_id)) => Some(RelayEndpoint {
                bot_url: format!("{}/bot{token}", cfg.base_url.trim_end_matches('/')),
                chat_id: chat_id.clone(),
            }),
            _ => {
                warn!("relay disabled (set TM_RELAY_TOKEN and TM_RELAY_CHAT_ID)");
                None
            }
        };
        Self {
            http: reqwest::Client::new(),
            endpoint,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.endpoint.is_some()
    }

    pub async fn send(&self, message: &str, image: Option<&str>) -> Result<()> {
        let Some(endpoint) = &self.endpoint else {
            return Ok(());
        };
        let (method, body) = relay_payload(&endpoint.chat_id, message, image);
        self.http
            .post(format!("{}/{method}", endpoint.bot_url))
            .json(&body)
            .send()
            .await
            .map_err(|e| e.without_url())
            .context("relay request failed")?
            .error_for_status()
            .map_err(|e| e.without_url())
            .context("relay non-200")?;
        Ok(())
    }

    pub fn send_detached(&self, message: String, image: Option<String>) {
        if !self.is_enabled() {
            debug!("relay disabled, dropping message");
            return;
        }
        let client = self.clone();
        tokio::spawn(async move {
            match client.send(&message, image.as_deref()).await {
                Ok(()) => debug!("relay message delivered"),
                Err(e) => warn!(err = %format!("{e:#}"), "relay send failed"),
            }
        });
    }
}

/// Method name and JSON body for a relay message; photo messages carry the
/// text as caption.
pub fn relay_payload(chat_id: &str, message: &str, image: Option<&str>) -> (&'static str, Value) {
    match image {
        Some(photo) => (
            "sendPhoto",
            json!({
                "chat_id": chat_id,
                "photo": photo,
                "caption": message,
                "parse_mode": "Markdown",
            }),
        ),
        None => (
            "sendMessage",
            json!({
                "chat_id": chat_id,
                "text": message,
                "parse_mode": "Markdown",
            }),
        ),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    Granted,
    Denied,
}

#[cfg(all(unix, not(target_os = "macos")))]
fn notification_server_available() -> bool {
    notify_rust::get_server_information().is_ok()
}

#[cfg(not(all(unix, not(target_os = "macos"))))]
fn notification_server_available() -> bool {
    true
}

#[derive(Debug, Clone)]
pub struct LocalAlerts {
    permission: Permission,
}

impl LocalAlerts {
    /// Resolve desktop notification permission. Called once at startup; the
    /// answer holds for the rest of the session.
    pub fn request(enabled: bool) -> Self {
        let permission = if enabled && notification_server_available() {
            Permission::Granted
        } else {
            Permission::Denied
        };
        info!(?permission, "desktop notifications");
        Self { permission }
    }

    pub fn permission(&self) -> Permission {
        self.permission
    }

    pub fn play_sound(&self) {
        let mut stdout = std::io::stdout();
        if !stdout.is_terminal() {
            return;
        }
        let _ = stdout.write_all(b"\x07");
        let _ = stdout.flush();
    }

    pub fn popup(&self, title: &str, body: &str, image: Option<&str>) {
        if self.permission != Permission::Granted {
            return;
        }
        let title = title.to_string();
        let body = body.to_string();
        // Remote banners cannot be used as icons; only local paths are passed on.
        let icon = image
            .filter(|i| !i.starts_with("http://") && !i.starts_with("https://"))
            .map(str::to_string);
        tokio::task::spawn_blocking(move || {
            let mut n = notify_rust::Notification::new();
            n.appname("ticket_monitor").summary(&title).body(&body);
            if let Some(icon) = icon.as_deref() {
                n.icon(icon);
            }
            if let Err(e) = n.show() {
                debug!(err = %e, "desktop notification failed");
            }
        });
    }
}

pub struct Sinks {
    relay: RelayClient,
    local: LocalAlerts,
}

impl Sinks {
    pub fn new(relay: RelayClient, local: LocalAlerts) -> Self {
        Self { relay, local }
    }

    pub fn relay_enabled(&self) -> bool {
        self.relay.is_enabled()
    }

    pub fn desktop_permission(&self) -> Permission {
        self.local.permission()
    }
}

impl Notifier for Sinks {
    fn relay(&self, message: &str, image: Option<&str>) {
        self.relay
            .send_detached(message.to_string(), image.map(str::to_string));
    }

    fn local_alert(&self, title: &str, body: &str, image: Option<&str>) {
        self.local.play_sound();
        self.local.popup(title, body, image);
    }
}
