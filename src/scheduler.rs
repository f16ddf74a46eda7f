//! Fixed-cadence check scheduler. Every tick reloads the enabled monitors,
//! runs push-overdue detection inline, and scatters one bounded task per
//! active monitor.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{watch, Mutex, Semaphore};
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, error, info, warn};

use crate::heartbeat::HeartbeatService;
use crate::models::MonitorType;
use crate::outcome::{CheckOutcome, OutcomeRecorder};
use crate::probe::ProbeRegistry;
use crate::repository::MonitorRepository;

const TICK_INTERVAL: Duration = Duration::from_secs(10);

pub struct Scheduler {
    monitors: Arc<dyn MonitorRepository>,
    recorder: Arc<OutcomeRecorder>,
    heartbeat: Arc<HeartbeatService>,
    probes: Arc<ProbeRegistry>,
    limiter: Arc<Semaphore>,
    shutdown: watch::Sender<bool>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl Scheduler {
    pub fn new(
        monitors: Arc<dyn MonitorRepository>,
        recorder: Arc<OutcomeRecorder>,
        heartbeat: Arc<HeartbeatService>,
        max_concurrent_checks: usize,
    ) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            monitors,
            recorder,
            heartbeat,
            probes: Arc::new(ProbeRegistry::builtin()),
            limiter: Arc::new(Semaphore::new(max_concurrent_checks)),
            shutdown,
            handle: Mutex::new(None),
        }
    }

    /// Spawns the tick loop. The first tick fires one interval after start
    /// so that server boot is never blocked on a full check round.
    pub async fn start(self: &Arc<Self>) {
        let scheduler = self.clone();
        let mut shutdown = self.shutdown.subscribe();
        let task = tokio::spawn(async move {
            let mut ticker =
                tokio::time::interval_at(tokio::time::Instant::now() + TICK_INTERVAL, TICK_INTERVAL);
            let mut tasks = JoinSet::new();
            info!(tick_secs = TICK_INTERVAL.as_secs(), "monitor scheduler started");
            loop {
                tokio::select! {
                    biased;
                    _ = shutdown.changed() => {
                        debug!(in_flight = tasks.len(), "scheduler draining outstanding checks");
                        while tasks.join_next().await.is_some() {}
                        break;
                    }
                    _ = ticker.tick() => {
                        // Reap finished checks from earlier ticks.
                        while tasks.try_join_next().is_some() {}
                        scheduler.run_tick(&mut tasks).await;
                    }
                }
            }
            info!("monitor scheduler stopped");
        });
        *self.handle.lock().await = Some(task);
    }

    pub async fn stop(&self) {
        let _ = self.shutdown.send(true);
        if let Some(task) = self.handle.lock().await.take() {
            if let Err(e) = task.await {
                error!(error = %e, "scheduler task ended abnormally");
            }
        }
    }

    /// Runs one scheduling round. Push monitors are handled inline, every
    /// other monitor becomes a task gated by the concurrency limiter.
    pub async fn run_tick(&self, tasks: &mut JoinSet<()>) {
        let monitors = match self.monitors.list_enabled().await {
            Ok(monitors) => monitors,
            Err(e) => {
                error!(error = %e, "failed to load monitors for tick");
                return;
            }
        };
        debug!(count = monitors.len(), "scheduling monitor checks");

        for monitor in monitors {
            if monitor.monitor_type == MonitorType::Push {
                self.heartbeat.check_overdue(&monitor).await;
                continue;
            }
            let Some(probe) = self.probes.get(monitor.monitor_type) else {
                warn!(monitor = %monitor.name, monitor_type = %monitor.monitor_type, "no probe for monitor type");
                continue;
            };
            let recorder = self.recorder.clone();
            let limiter = self.limiter.clone();
            tasks.spawn(async move {
                // Closed only on runtime shutdown.
                let Ok(_permit) = limiter.acquire().await else {
                    return;
                };
                let outcome = probe.check(&monitor).await;
                recorder
                    .record(&monitor, CheckOutcome::from_probe(&outcome))
                    .await;
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MonitorStatus;
    use crate::notifications::NotificationDispatcher;
    use crate::repository::MemoryStore;
    use crate::testutil::monitor;
    use httpmock::prelude::*;

    fn scheduler(store: &Arc<MemoryStore>) -> Scheduler {
        let dispatcher = Arc::new(NotificationDispatcher::new(store.clone()));
        let recorder = Arc::new(OutcomeRecorder::new(
            store.clone(),
            store.clone(),
            dispatcher,
        ));
        let heartbeat = Arc::new(HeartbeatService::new(store.clone(), recorder.clone()));
        Scheduler::new(store.clone(), recorder, heartbeat, 4)
    }

    #[tokio::test]
    async fn tick_probes_monitors_and_records_transitions() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET).path("/");
                then.status(500);
            })
            .await;

        let store = MemoryStore::new();
        let mut m = monitor(crate::models::MonitorType::Http, &server.url("/"));
        m.last_status = MonitorStatus::Up;
        let id = store.insert_monitor(m);
        let sched = scheduler(&store);

        let mut tasks = JoinSet::new();
        sched.run_tick(&mut tasks).await;
        while tasks.join_next().await.is_some() {}

        mock.assert_async().await;
        let m = store.get(id).await.unwrap().unwrap();
        assert_eq!(m.last_status, MonitorStatus::Down);
        assert_eq!(store.results_for(id).len(), 1);
    }

    #[tokio::test]
    async fn tick_runs_overdue_detection_for_push_monitors() {
        let store = MemoryStore::new();
        let mut m = monitor(crate::models::MonitorType::Push, "");
        m.push_token = Some("tok".into());
        m.interval_seconds = 60;
        m.last_status = MonitorStatus::Up;
        m.last_checked_at = Some(chrono::Utc::now() - chrono::Duration::seconds(120));
        let id = store.insert_monitor(m);
        let sched = scheduler(&store);

        let mut tasks = JoinSet::new();
        sched.run_tick(&mut tasks).await;
        while tasks.join_next().await.is_some() {}

        let m = store.get(id).await.unwrap().unwrap();
        assert_eq!(m.last_status, MonitorStatus::Down);
    }

    #[tokio::test]
    async fn disabled_monitors_are_never_scheduled() {
        let store = MemoryStore::new();
        let mut m = monitor(crate::models::MonitorType::Tcp, "127.0.0.1:1");
        m.enabled = false;
        let id = store.insert_monitor(m);
        let sched = scheduler(&store);

        let mut tasks = JoinSet::new();
        sched.run_tick(&mut tasks).await;
        while tasks.join_next().await.is_some() {}

        assert!(store.results_for(id).is_empty());
    }

    #[tokio::test]
    async fn limiter_smaller_than_monitor_count_still_completes_every_check() {
        let store = MemoryStore::new();
        let mut ids = Vec::new();
        for i in 0..5 {
            let m = monitor(
                crate::models::MonitorType::Tcp,
                &format!("127.0.0.1:{}", i + 1),
            );
            ids.push(store.insert_monitor(m));
        }
        let dispatcher = Arc::new(NotificationDispatcher::new(store.clone()));
        let recorder = Arc::new(OutcomeRecorder::new(
            store.clone(),
            store.clone(),
            dispatcher,
        ));
        let heartbeat = Arc::new(HeartbeatService::new(store.clone(), recorder.clone()));
        let sched = Scheduler::new(store.clone(), recorder, heartbeat, 2);

        let mut tasks = JoinSet::new();
        sched.run_tick(&mut tasks).await;
        while tasks.join_next().await.is_some() {}

        for id in ids {
            assert_eq!(store.results_for(id).len(), 1, "monitor {id} not checked");
        }
    }

    #[tokio::test]
    async fn start_and_stop_shut_down_cleanly() {
        let store = MemoryStore::new();
        let sched = Arc::new(scheduler(&store));
        sched.start().await;
        sched.stop().await;
    }
}
