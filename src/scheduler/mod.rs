//! Poll scheduler - drives the refresh tasks on independent periods
//!
//! Each task moves `Idle -> Running -> Idle`. A tick or manual trigger that
//! finds its task `Running` is skipped, so at most one run per task is ever
//! in flight. Runs are spawned, never awaited by the tick loop, which keeps a
//! slow or failing task from delaying any other.
//!
//! ```text
//!   tick / trigger ──▶ connected? ──no──▶ Skipped(Disconnected)
//!                         │yes
//!                         ▼
//!                      Running? ──yes──▶ Skipped(AlreadyRunning)
//!                         │no
//!                         ▼
//!                   spawn run ──▶ Completed | Failed
//! ```

pub mod tasks;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::state::StatePublisher;

pub use tasks::{ActivityTask, GovernanceTask, RefreshTask, TreasuryTask};

/// Capacity of the cycle event stream
const EVENT_CAPACITY: usize = 64;

/// Scheduled refresh tasks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    Treasury,
    Activity,
    Governance,
}

impl std::fmt::Display for TaskKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            TaskKind::Treasury => "treasury",
            TaskKind::Activity => "activity",
            TaskKind::Governance => "governance",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    Idle,
    Running,
}

/// Why a run did not start
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    Disconnected,
    AlreadyRunning,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CycleOutcome {
    Completed,
    Failed(String),
    Skipped(SkipReason),
}

/// Emitted once per tick or trigger
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CycleEvent {
    pub task: TaskKind,
    pub outcome: CycleOutcome,
}

struct TaskSlot {
    task: Arc<dyn RefreshTask>,
    state: Mutex<TaskState>,
}

struct Shared {
    slots: Vec<Arc<TaskSlot>>,
    connected: AtomicBool,
    events: broadcast::Sender<CycleEvent>,
    publisher: Option<StatePublisher>,
}

struct Running {
    shutdown_tx: watch::Sender<bool>,
    loops: Vec<JoinHandle<()>>,
}

/// Runs every registered task on its own period
pub struct PollScheduler {
    shared: Arc<Shared>,
    running: Mutex<Option<Running>>,
}

impl PollScheduler {
    pub fn new(tasks: Vec<Arc<dyn RefreshTask>>) -> Self {
        Self::build(tasks, None)
    }

    /// Mirror connectivity into the published state
    pub fn with_publisher(tasks: Vec<Arc<dyn RefreshTask>>, publisher: StatePublisher) -> Self {
        Self::build(tasks, Some(publisher))
    }

    fn build(tasks: Vec<Arc<dyn RefreshTask>>, publisher: Option<StatePublisher>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let slots = tasks
            .into_iter()
            .map(|task| {
                Arc::new(TaskSlot {
                    task,
                    state: Mutex::new(TaskState::Idle),
                })
            })
            .collect();

        Self {
            shared: Arc::new(Shared {
                slots,
                connected: AtomicBool::new(true),
                events,
                publisher,
            }),
            running: Mutex::new(None),
        }
    }

    /// Stream of cycle outcomes
    pub fn subscribe(&self) -> broadcast::Receiver<CycleEvent> {
        self.shared.events.subscribe()
    }

    pub fn is_connected(&self) -> bool {
        self.shared.connected.load(Ordering::SeqCst)
    }

    /// Current state of every task, in registration order
    pub async fn task_states(&self) -> Vec<(TaskKind, TaskState)> {
        let mut states = Vec::with_capacity(self.shared.slots.len());
        for slot in &self.shared.slots {
            states.push((slot.task.kind(), *slot.state.lock().await));
        }
        states
    }

    /// Spawn one tick loop per task. The first tick fires immediately.
    pub async fn start(&self) {
        let mut running = self.running.lock().await;
        if running.is_some() {
            debug!("Scheduler already started");
            return;
        }

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let loops = self
            .shared
            .slots
            .iter()
            .cloned()
            .map(|slot| {
                let shared = self.shared.clone();
                let mut shutdown_rx = shutdown_rx.clone();
                tokio::spawn(async move {
                    let mut tick = interval(slot.task.period());
                    tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
                    loop {
                        tokio::select! {
                            _ = tick.tick() => {
                                shared.dispatch(&slot).await;
                            }
                            _ = shutdown_rx.changed() => {
                                debug!(task = %slot.task.kind(), "Tick loop stopped");
                                break;
                            }
                        }
                    }
                })
            })
            .collect();

        info!(tasks = self.shared.slots.len(), "Scheduler started");
        *running = Some(Running { shutdown_tx, loops });
    }

    /// Stop ticking. In-flight runs finish and publish.
    pub async fn stop(&self) {
        let Some(running) = self.running.lock().await.take() else {
            return;
        };
        let _ = running.shutdown_tx.send(true);
        for handle in running.loops {
            if let Err(e) = handle.await {
                warn!(error = %e, "Tick loop ended abnormally");
            }
        }
        info!("Scheduler stopped");
    }

    /// Run `kind` now unless it is already running. Returns whether a run started.
    pub async fn trigger(&self, kind: TaskKind) -> bool {
        let mut started = false;
        for slot in self.shared.slots.iter().filter(|s| s.task.kind() == kind) {
            started |= self.shared.dispatch(slot).await;
        }
        started
    }

    /// Trigger every task
    pub async fn trigger_all(&self) {
        for slot in &self.shared.slots {
            self.shared.dispatch(slot).await;
        }
    }

    /// Mark the provider reachable or not. Reconnecting triggers every task.
    pub async fn set_connected(&self, connected: bool) {
        let was = self.shared.connected.swap(connected, Ordering::SeqCst);
        if let Some(publisher) = &self.shared.publisher {
            publisher.set_connected(connected);
        }
        if was == connected {
            return;
        }

        if connected {
            info!("Provider reconnected, refreshing all tasks");
            self.trigger_all().await;
        } else {
            warn!("Provider disconnected, holding published state");
        }
    }
}

impl Shared {
    async fn dispatch(&self, slot: &Arc<TaskSlot>) -> bool {
        let kind = slot.task.kind();
        if !self.connected.load(Ordering::SeqCst) {
            self.emit(kind, CycleOutcome::Skipped(SkipReason::Disconnected));
            return false;
        }

        {
            let mut state = slot.state.lock().await;
            if *state == TaskState::Running {
                debug!(task = %kind, "Previous run still in flight, skipping");
                self.emit(kind, CycleOutcome::Skipped(SkipReason::AlreadyRunning));
                return false;
            }
            *state = TaskState::Running;
        }

        let slot = slot.clone();
        let events = self.events.clone();
        tokio::spawn(async move {
            // Run on its own task so a panic still lands back in Idle
            let task = slot.task.clone();
            let outcome = match tokio::spawn(async move { task.run().await }).await {
                Ok(Ok(())) => CycleOutcome::Completed,
                Ok(Err(e)) => {
                    warn!(task = %kind, error = %e, "Refresh failed, keeping previous state");
                    CycleOutcome::Failed(e.to_string())
                }
                Err(e) => {
                    warn!(task = %kind, error = %e, "Refresh aborted, keeping previous state");
                    CycleOutcome::Failed(format!("run aborted: {}", e))
                }
            };
            *slot.state.lock().await = TaskState::Idle;
            let _ = events.send(CycleEvent { task: kind, outcome });
        });
        true
    }

    fn emit(&self, task: TaskKind, outcome: CycleOutcome) {
        // No subscribers is fine
        let _ = self.events.send(CycleEvent { task, outcome });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Error, ReadError, Result};
    use async_trait::async_trait;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;
    use tokio::sync::Notify;
    use tokio::time::timeout;

    struct TestTask {
        kind: TaskKind,
        period: Duration,
        runs: AtomicUsize,
        fail: bool,
        panic_first: bool,
        gate: Option<Arc<Notify>>,
    }

    impl TestTask {
        fn new(kind: TaskKind) -> Self {
            Self {
                kind,
                period: Duration::from_secs(3_600),
                runs: AtomicUsize::new(0),
                fail: false,
                panic_first: false,
                gate: None,
            }
        }
    }

    #[async_trait]
    impl RefreshTask for TestTask {
        fn kind(&self) -> TaskKind {
            self.kind
        }

        fn period(&self) -> Duration {
            self.period
        }

        async fn run(&self) -> Result<()> {
            let previous = self.runs.fetch_add(1, Ordering::SeqCst);
            if self.panic_first && previous == 0 {
                panic!("first run blew up");
            }
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            if self.fail {
                return Err(Error::Read(ReadError::Timeout));
            }
            Ok(())
        }
    }

    async fn next_event(rx: &mut broadcast::Receiver<CycleEvent>) -> CycleEvent {
        timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("event in time")
            .expect("event stream open")
    }

    #[tokio::test]
    async fn test_overlapping_trigger_skipped() {
        let gate = Arc::new(Notify::new());
        let task = Arc::new(TestTask {
            gate: Some(gate.clone()),
            ..TestTask::new(TaskKind::Activity)
        });
        let scheduler = PollScheduler::new(vec![task.clone() as Arc<dyn RefreshTask>]);
        let mut events = scheduler.subscribe();

        assert!(scheduler.trigger(TaskKind::Activity).await);
        assert!(!scheduler.trigger(TaskKind::Activity).await);
        assert_eq!(
            next_event(&mut events).await.outcome,
            CycleOutcome::Skipped(SkipReason::AlreadyRunning)
        );

        gate.notify_one();
        assert_eq!(next_event(&mut events).await.outcome, CycleOutcome::Completed);
        assert_eq!(task.runs.load(Ordering::SeqCst), 1);
        assert_eq!(
            scheduler.task_states().await,
            vec![(TaskKind::Activity, TaskState::Idle)]
        );
        assert!(scheduler.trigger(TaskKind::Activity).await);
    }

    #[tokio::test]
    async fn test_panicking_run_returns_to_idle() {
        let task = Arc::new(TestTask {
            panic_first: true,
            ..TestTask::new(TaskKind::Activity)
        });
        let scheduler = PollScheduler::new(vec![task.clone() as Arc<dyn RefreshTask>]);
        let mut events = scheduler.subscribe();

        assert!(scheduler.trigger(TaskKind::Activity).await);
        assert!(matches!(
            next_event(&mut events).await.outcome,
            CycleOutcome::Failed(_)
        ));
        assert_eq!(
            scheduler.task_states().await,
            vec![(TaskKind::Activity, TaskState::Idle)]
        );

        assert!(scheduler.trigger(TaskKind::Activity).await);
        assert_eq!(next_event(&mut events).await.outcome, CycleOutcome::Completed);
        assert_eq!(task.runs.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_failure_isolated_per_task() {
        let failing = Arc::new(TestTask {
            fail: true,
            ..TestTask::new(TaskKind::Treasury)
        });
        let healthy = Arc::new(TestTask::new(TaskKind::Governance));
        let scheduler = PollScheduler::new(vec![
            failing.clone() as Arc<dyn RefreshTask>,
            healthy.clone(),
        ]);
        let mut events = scheduler.subscribe();

        for _ in 0..2 {
            scheduler.trigger_all().await;
            let mut outcomes = vec![next_event(&mut events).await, next_event(&mut events).await];
            outcomes.sort_by_key(|e| e.task as u8);
            assert!(matches!(outcomes[0].outcome, CycleOutcome::Failed(_)));
            assert_eq!(outcomes[1].outcome, CycleOutcome::Completed);
        }
        assert_eq!(healthy.runs.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_disconnect_suppresses_and_reconnect_triggers() {
        let task = Arc::new(TestTask::new(TaskKind::Governance));
        let scheduler = PollScheduler::new(vec![task.clone() as Arc<dyn RefreshTask>]);
        let mut events = scheduler.subscribe();

        scheduler.set_connected(false).await;
        assert!(!scheduler.trigger(TaskKind::Governance).await);
        assert_eq!(
            next_event(&mut events).await.outcome,
            CycleOutcome::Skipped(SkipReason::Disconnected)
        );
        assert_eq!(task.runs.load(Ordering::SeqCst), 0);

        scheduler.set_connected(true).await;
        assert_eq!(next_event(&mut events).await.outcome, CycleOutcome::Completed);
        assert_eq!(task.runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_ticks_run_until_stopped() {
        let task = Arc::new(TestTask {
            period: Duration::from_millis(10),
            ..TestTask::new(TaskKind::Activity)
        });
        let scheduler = PollScheduler::new(vec![task.clone() as Arc<dyn RefreshTask>]);
        let mut events = scheduler.subscribe();

        scheduler.start().await;
        for _ in 0..3 {
            assert_eq!(next_event(&mut events).await.outcome, CycleOutcome::Completed);
        }
        scheduler.stop().await;

        tokio::time::sleep(Duration::from_millis(30)).await;
        let after_stop = task.runs.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(task.runs.load(Ordering::SeqCst), after_stop);
    }
}
