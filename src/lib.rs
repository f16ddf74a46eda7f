//! PulseWatch: a self-hosted uptime monitoring engine.
//!
//! A fixed-cadence scheduler probes HTTP(S), TCP, ICMP, DNS, WebSocket,
//! Steam and Docker targets, while push monitors report in over HTTP and
//! are declared down when they fall silent. Status transitions fan out to
//! webhook, email, Discord and Telegram notification channels.

pub mod config;
pub mod heartbeat;
pub mod models;
pub mod notifications;
pub mod outcome;
pub mod probe;
pub mod repository;
pub mod scheduler;
pub mod web;
