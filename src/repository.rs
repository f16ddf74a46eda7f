//! Persistence contract consumed by the monitoring engine.
//!
//! The engine never talks to a database directly; it goes through these
//! traits. The bundled [`MemoryStore`] backs the server binary and the
//! tests. Implementations must be safe for concurrent per-row access,
//! since scheduler tasks operate on distinct monitors in parallel.

use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::{DashMap, DashSet};
use thiserror::Error;

use crate::models::{CheckResult, Monitor, NotificationChannel, Subscription};

#[derive(Error, Debug)]
pub enum RepositoryError {
    #[error("monitor not found: {0}")]
    MonitorNotFound(i32),
    #[error("store error: {0}")]
    Store(String),
}

#[async_trait]
pub trait MonitorRepository: Send + Sync {
    /// All enabled monitors, the working set of one scheduler tick.
    async fn list_enabled(&self) -> Result<Vec<Monitor>, RepositoryError>;
    async fn get(&self, id: i32) -> Result<Option<Monitor>, RepositoryError>;
    async fn get_by_push_token(&self, token: &str) -> Result<Option<Monitor>, RepositoryError>;
    async fn update(&self, monitor: &Monitor) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait ResultRepository: Send + Sync {
    async fn create(&self, result: &CheckResult) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait SubscriptionRepository: Send + Sync {
    /// Channels subscribed to the monitor, enabled or not.
    async fn channels_for_monitor(
        &self,
        monitor_id: i32,
    ) -> Result<Vec<NotificationChannel>, RepositoryError>;
}

/// In-memory store over concurrent maps. Row writes are atomic per entry.
#[derive(Default)]
pub struct MemoryStore {
    monitors: DashMap<i32, Monitor>,
    results: DashMap<i32, Vec<CheckResult>>,
    channels: DashMap<i32, NotificationChannel>,
    subscriptions: DashSet<Subscription>,
    next_monitor_id: AtomicI32,
    next_channel_id: AtomicI32,
}

impl MemoryStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Inserts a monitor, assigning an id when the caller left it at 0.
    pub fn insert_monitor(&self, mut monitor: Monitor) -> i32 {
        if monitor.id == 0 {
            monitor.id = self.next_monitor_id.fetch_add(1, Ordering::SeqCst) + 1;
        }
        let id = monitor.id;
        self.monitors.insert(id, monitor);
        id
    }

    pub fn insert_channel(&self, mut channel: NotificationChannel) -> i32 {
        if channel.id == 0 {
            channel.id = self.next_channel_id.fetch_add(1, Ordering::SeqCst) + 1;
        }
        let id = channel.id;
        self.channels.insert(id, channel);
        id
    }

    pub fn subscribe(&self, monitor_id: i32, channel_id: i32) {
        self.subscriptions.insert(Subscription {
            monitor_id,
            channel_id,
        });
    }

    /// Recorded results for a monitor, oldest first.
    pub fn results_for(&self, monitor_id: i32) -> Vec<CheckResult> {
        self.results
            .get(&monitor_id)
            .map(|r| r.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl MonitorRepository for MemoryStore {
    async fn list_enabled(&self) -> Result<Vec<Monitor>, RepositoryError> {
        let mut monitors: Vec<Monitor> = self
            .monitors
            .iter()
            .filter(|entry| entry.enabled)
            .map(|entry| entry.clone())
            .collect();
        monitors.sort_by_key(|m| m.id);
        Ok(monitors)
    }

    async fn get(&self, id: i32) -> Result<Option<Monitor>, RepositoryError> {
        Ok(self.monitors.get(&id).map(|m| m.clone()))
    }

    async fn get_by_push_token(&self, token: &str) -> Result<Option<Monitor>, RepositoryError> {
        Ok(self
            .monitors
            .iter()
            .find(|m| m.push_token.as_deref() == Some(token))
            .map(|m| m.clone()))
    }

    async fn update(&self, monitor: &Monitor) -> Result<(), RepositoryError> {
        match self.monitors.get_mut(&monitor.id) {
            Some(mut entry) => {
                *entry = monitor.clone();
                Ok(())
            }
            None => Err(RepositoryError::MonitorNotFound(monitor.id)),
        }
    }
}

#[async_trait]
impl ResultRepository for MemoryStore {
    async fn create(&self, result: &CheckResult) -> Result<(), RepositoryError> {
        self.results
            .entry(result.monitor_id)
            .or_default()
            .push(result.clone());
        Ok(())
    }
}

#[async_trait]
impl SubscriptionRepository for MemoryStore {
    async fn channels_for_monitor(
        &self,
        monitor_id: i32,
    ) -> Result<Vec<NotificationChannel>, RepositoryError> {
        let mut channels: Vec<NotificationChannel> = self
            .subscriptions
            .iter()
            .filter(|sub| sub.monitor_id == monitor_id)
            .filter_map(|sub| self.channels.get(&sub.channel_id).map(|c| c.clone()))
            .collect();
        channels.sort_by_key(|c| c.id);
        Ok(channels)
    }
}
