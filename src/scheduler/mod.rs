//! Scheduler module for running probe cycles.

use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::probe::Prober;
use crate::state::{MetricState, Target};

/// Drives probe cycles over a fixed target set.
pub struct Scheduler {
    prober: Prober,
    targets: Vec<Target>,
    query: String,
    interval: Duration,
    state: Arc<MetricState>,
}

impl Scheduler {
    /// Create a new scheduler. The target order is kept for every cycle.
    pub fn new(
        prober: Prober,
        targets: Vec<Target>,
        query: String,
        interval: Duration,
        state: Arc<MetricState>,
    ) -> Self {
        Self {
            prober,
            targets,
            query,
            interval,
            state,
        }
    }

    /// Run one cycle to completion, then keep cycling in the background until
    /// `cancel` fires.
    ///
    /// When this returns every target has an entry in the metric state.
    pub async fn start(self: Arc<Self>, cancel: CancellationToken) -> JoinHandle<()> {
        tracing::info!(
            targets = self.targets.len(),
            interval_secs = self.interval.as_secs(),
            "Starting scheduler"
        );

        self.run_cycle().await;

        tokio::spawn(self.run_loop(cancel))
    }

    async fn run_loop(self: Arc<Self>, cancel: CancellationToken) {
        // The eager cycle already covered t=0.
        let mut ticker = tokio::time::interval_at(Instant::now() + self.interval, self.interval);
        // A cycle that overruns its slot leaves at most one pending tick.
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    tracing::info!("Scheduler cancelled, stopping probe cycles");
                    break;
                }
                _ = ticker.tick() => {
                    self.run_cycle().await;
                }
            }
        }
    }

    /// Probe every target once and record the results.
    ///
    /// Targets are probed concurrently; each result is stored as soon as its
    /// probe finishes, so a slow target only delays its own entry.
    pub async fn run_cycle(&self) {
        let started = Instant::now();
        tracing::debug!(targets = self.targets.len(), "Probe cycle started");

        let probes = self.targets.iter().map(|target| async move {
            let result = self.prober.probe(target, &self.query).await;
            let up = result.is_up();
            self.state.update(result);
            up
        });
        let outcomes = join_all(probes).await;

        let up = outcomes.iter().filter(|up| **up).count();
        tracing::info!(
            up,
            down = outcomes.len() - up,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Probe cycle finished"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::testing::{Behavior, FakeConnector};
    use crate::state::{Credentials, Status};
    use std::sync::atomic::Ordering;

    const INTERVAL: Duration = Duration::from_secs(5);

    fn targets(hosts: &[&str]) -> Vec<Target> {
        hosts
            .iter()
            .map(|h| Target::new(*h, 5432, Credentials::new("svc", "user", "pw")))
            .collect()
    }

    fn scheduler(connector: Arc<FakeConnector>, hosts: &[&str]) -> (Arc<Scheduler>, Arc<MetricState>) {
        let state = Arc::new(MetricState::new());
        let scheduler = Scheduler::new(
            Prober::new(connector, Duration::from_secs(10)),
            targets(hosts),
            "select employee_name, city from employees".to_string(),
            INTERVAL,
            state.clone(),
        );
        (Arc::new(scheduler), state)
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_runs_eager_cycle_for_every_target() {
        let connector = Arc::new(FakeConnector::new(&[
            ("dbhost1", Behavior::Healthy(Duration::from_millis(12))),
            ("dbhost2", Behavior::Refuse),
        ]));
        let (scheduler, state) = scheduler(connector.clone(), &["dbhost1", "dbhost2"]);
        let cancel = CancellationToken::new();

        let handle = scheduler.start(cancel.clone()).await;

        assert_eq!(connector.connects.load(Ordering::SeqCst), 2);
        let up = state.get("dbhost1").unwrap();
        assert_eq!(up.status, Status::Up);
        assert!(up.latency_ms >= 12);
        let down = state.get("dbhost2").unwrap();
        assert_eq!(down.status, Status::Down);
        assert_eq!(down.latency_ms, 0);

        cancel.cancel();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_cycles_follow_interval() {
        let connector = Arc::new(FakeConnector::new(&[("dbhost1", Behavior::Healthy(Duration::ZERO))]));
        let (scheduler, _state) = scheduler(connector.clone(), &["dbhost1"]);
        let cancel = CancellationToken::new();

        let handle = scheduler.start(cancel.clone()).await;
        assert_eq!(connector.connects.load(Ordering::SeqCst), 1);

        // Nothing before the first interval elapses.
        tokio::time::sleep(INTERVAL - Duration::from_millis(100)).await;
        assert_eq!(connector.connects.load(Ordering::SeqCst), 1);

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(connector.connects.load(Ordering::SeqCst), 2);

        tokio::time::sleep(INTERVAL * 2).await;
        assert_eq!(connector.connects.load(Ordering::SeqCst), 4);

        cancel.cancel();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_latest_cycle_wins() {
        let connector = Arc::new(FakeConnector::new(&[("dbhost1", Behavior::Healthy(Duration::ZERO))]));
        let (scheduler, state) = scheduler(connector.clone(), &["dbhost1"]);
        let cancel = CancellationToken::new();

        let handle = scheduler.start(cancel.clone()).await;
        assert!(state.get("dbhost1").unwrap().is_up());

        connector.set("dbhost1", Behavior::Refuse);
        tokio::time::sleep(INTERVAL + Duration::from_millis(100)).await;
        let entry = state.get("dbhost1").unwrap();
        assert_eq!(entry.status, Status::Down);
        assert_eq!(entry.latency_ms, 0);

        connector.set("dbhost1", Behavior::Healthy(Duration::from_millis(30)));
        tokio::time::sleep(INTERVAL).await;
        let entry = state.get("dbhost1").unwrap();
        assert_eq!(entry.status, Status::Up);
        assert!(entry.latency_ms >= 30);
        assert_eq!(state.len(), 1);

        cancel.cancel();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_cycle_after_cancellation() {
        let connector = Arc::new(FakeConnector::new(&[("dbhost1", Behavior::Healthy(Duration::ZERO))]));
        let (scheduler, _state) = scheduler(connector.clone(), &["dbhost1"]);
        let cancel = CancellationToken::new();

        let handle = scheduler.start(cancel.clone()).await;
        tokio::time::sleep(INTERVAL + Duration::from_millis(100)).await;
        assert_eq!(connector.connects.load(Ordering::SeqCst), 2);

        cancel.cancel();
        handle.await.unwrap();

        tokio::time::sleep(INTERVAL * 10).await;
        assert_eq!(connector.connects.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_target_does_not_delay_others() {
        let connector = Arc::new(FakeConnector::new(&[
            ("stuck", Behavior::Hang),
            ("fast", Behavior::Healthy(Duration::from_millis(5))),
        ]));
        let (scheduler, state) = scheduler(connector.clone(), &["stuck", "fast"]);

        let cycle = tokio::spawn({
            let scheduler = scheduler.clone();
            async move { scheduler.run_cycle().await }
        });

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(state.get("fast").unwrap().is_up());
        assert!(state.get("stuck").is_none());

        cycle.await.unwrap();
        assert_eq!(state.get("stuck").unwrap().status, Status::Down);
    }

    #[tokio::test(start_paused = true)]
    async fn test_overrunning_cycles_never_overlap() {
        // Every cycle takes 12s against a 5s interval.
        let connector = Arc::new(FakeConnector::new(&[("slow", Behavior::Healthy(Duration::from_secs(12)))]));
        let (scheduler, _state) = scheduler(connector.clone(), &["slow"]);
        let cancel = CancellationToken::new();

        // Eager cycle runs t=0..12, so ticks land on t=17, 22, 27, ...
        let handle = scheduler.start(cancel.clone()).await;
        assert_eq!(connector.connects.load(Ordering::SeqCst), 1);

        // Cycle 2 runs t=17..29. The single missed tick at 22 fires as soon
        // as it ends, so cycle 3 runs t=29..41.
        tokio::time::sleep(Duration::from_secs(20)).await;
        assert_eq!(connector.connects.load(Ordering::SeqCst), 3);
        tokio::time::sleep(Duration::from_secs(8)).await;
        assert_eq!(connector.connects.load(Ordering::SeqCst), 3);
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(connector.connects.load(Ordering::SeqCst), 4);

        cancel.cancel();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_stuck_query_does_not_stall_later_cycles() {
        let connector = Arc::new(FakeConnector::new(&[
            ("fast", Behavior::Healthy(Duration::ZERO)),
            ("stuckquery", Behavior::Healthy(Duration::ZERO)),
        ]));
        let (scheduler, state) = scheduler(connector.clone(), &["fast", "stuckquery"]);
        let cancel = CancellationToken::new();

        let handle = scheduler.start(cancel.clone()).await;
        assert_eq!(connector.connects.load(Ordering::SeqCst), 2);

        connector.set("stuckquery", Behavior::QueryHangs);
        tokio::time::sleep(Duration::from_secs(60)).await;

        // Each cycle is capped by the 10s query timeout, so a minute holds
        // several more cycles instead of one that never ends.
        assert!(connector.connects.load(Ordering::SeqCst) >= 10);
        assert!(state.get("fast").unwrap().is_up());
        let stuck = state.get("stuckquery").unwrap();
        assert_eq!(stuck.status, Status::Down);
        assert_eq!(stuck.latency_ms, 0);

        cancel.cancel();
        handle.await.unwrap();
    }
}
