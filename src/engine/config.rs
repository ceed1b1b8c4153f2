use crate::engine::types::{EventId, MIN_REFRESH_SECS};
use anyhow::{Context, Result};
use std::collections::HashSet;
use std::path::PathBuf;

const DEFAULT_EVENT_IDS: &[EventId] = &[232, 233, 234];
const DEFAULT_API_BASE: &str = "https://scaleapi.ticketgenie.in";
const DEFAULT_RELAY_BASE: &str = "https://api.telegram.org";
const DEFAULT_IGNORED: &[&str] = &["SOLD OUT"];
const DEFAULT_REFRESH_SECS: u64 = 10;

#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub base_url: String,
    pub token: Option<String>,
    pub chat_id: Option<String>,
}

impl RelayConfig {
    pub fn is_configured(&self) -> bool {
        self.token.is_some() && self.chat_id.is_some()
    }
}

#[derive(Debug, Clone)]
pub struct MonitorConfig {
    pub event_ids: Vec<EventId>,
    pub api_base: String,
    pub relay: RelayConfig,
    pub ignored_statuses: HashSet<String>,
    pub refresh_secs: u64,
    pub desktop_notify: bool,
    pub log_file: PathBuf,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            event_ids: DEFAULT_EVENT_IDS.to_vec(),
            api_base: DEFAULT_API_BASE.to_string(),
            relay: RelayConfig {
                base_url: DEFAULT_RELAY_BASE.to_string(),
                token: None,
                chat_id: None,
            },
            ignored_statuses: DEFAULT_IGNORED.iter().map(|s| s.to_string()).collect(),
            refresh_secs: DEFAULT_REFRESH_SECS,
            desktop_notify: true,
            log_file: PathBuf::from("logs/ticket_console.log"),
        }
    }
}

impl MonitorConfig {
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let event_ids = match non_empty_var("TM_EVENT_IDS") {
            Some(raw) => parse_id_list(&raw).context("invalid TM_EVENT_IDS")?,
            None => defaults.event_ids,
        };

        let ignored_statuses = non_empty_var("TM_IGNORED_STATUSES")
            .map(|raw| parse_status_list(&raw))
            .unwrap_or(defaults.ignored_statuses);

        let refresh_secs = match non_empty_var("TM_REFRESH_SECS") {
            Some(raw) => raw
                .trim()
                .parse::<u64>()
                .with_context(|| format!("invalid TM_REFRESH_SECS '{raw}'"))?,
            None => defaults.refresh_secs,
        }
        .max(MIN_REFRESH_SECS);

        let desktop_notify = non_empty_var("TM_DESKTOP_NOTIFY")
            .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
            .unwrap_or(defaults.desktop_notify);

        Ok(Self {
            event_ids,
            api_base: non_empty_var("TM_API_BASE").unwrap_or(defaults.api_base),
            relay: RelayConfig {
                base_url: non_empty_var("TM_RELAY_BASE").unwrap_or(defaults.relay.base_url),
                token: non_empty_var("TM_RELAY_TOKEN"),
                chat_id: non_empty_var("TM_RELAY_CHAT_ID"),
            },
            ignored_statuses,
            refresh_secs,
            desktop_notify,
            log_file: non_empty_var("TM_LOG_FILE")
                .map(PathBuf::from)
                .unwrap_or(defaults.log_file),
        })
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().trim_matches(|c| c == '"' || c == '\'').to_string())
        .filter(|v| !v.is_empty())
}

/// Parse "232, 233,234" into ids, keeping the first occurrence of duplicates.
pub fn parse_id_list(spec: &str) -> Result<Vec<EventId>> {
    let mut out: Vec<EventId> = Vec::new();
    for part in spec
        .split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
    {
        let id = part
            .parse::<EventId>()
            .with_context(|| format!("invalid event id '{part}'"))?;
        if !out.contains(&id) {
            out.push(id);
        }
    }
    if out.is_empty() {
        anyhow::bail!("no event ids in '{spec}'");
    }
    Ok(out)
}

pub fn parse_status_list(spec: &str) -> HashSet<String> {
    spec.split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_id_list_with_spaces_and_duplicates() {
        let ids = parse_id_list(" 232, 233 ,232,,234 ").unwrap();
        assert_eq!(ids, vec![232, 233, 234]);
    }

    #[test]
    fn rejects_bad_ids() {
        assert!(parse_id_list("232,abc").is_err());
        assert!(parse_id_list(" , ").is_err());
    }

    #[test]
    fn status_list_keeps_inner_spaces() {
        let set = parse_status_list("SOLD OUT, COMING SOON");
        assert!(set.contains("SOLD OUT"));
        assert!(set.contains("COMING SOON"));
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn defaults_match_monitored_set() {
        let cfg = MonitorConfig::default();
        assert_eq!(cfg.event_ids, vec![232, 233, 234]);
        assert!(cfg.ignored_statuses.contains("SOLD OUT"));
        assert!(!cfg.relay.is_configured());
    }
}
