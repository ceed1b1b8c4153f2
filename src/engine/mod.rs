pub mod config;
pub mod diff;
pub mod monitor;
pub mod notify;
pub mod poller;
pub mod schedule;
pub mod session;
pub mod ticket_api;
pub mod timefmt;
pub mod types;

#[cfg(test)]
pub(crate) mod testing;
