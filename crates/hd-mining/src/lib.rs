use hd_api_types::{Algorithm, CoinType, TaskStatus, UserRole};
use hd_session::SessionStore;
use hd_storage::{Clock, StateStore, combined_tasks_key, tasks_key};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum MiningError {
    #[error("not logged in")]
    NotLoggedIn,
    #[error("storage error: {0}")]
    Store(#[from] anyhow::Error),
}

/// A simulated unit of mining work. Progress and hashrate are fabricated by
/// the periodic tick; no proof-of-work computation happens anywhere.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MiningTask {
    pub id: String,
    pub user_id: String,
    pub status: TaskStatus,
    pub hashrate: f64,
    pub start_time_epoch_ms: u128,
    pub end_time_epoch_ms: Option<u128>,
    pub progress: f64,
    pub algorithm: Algorithm,
    pub coin_type: CoinType,
    pub target_reward: f64,
    pub actual_reward: Option<f64>,
}

impl MiningTask {
    fn is_active(&self) -> bool {
        matches!(self.status, TaskStatus::Running | TaskStatus::Paused)
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TaskCounts {
    pub active: usize,
    pub completed: usize,
    pub failed: usize,
}

/// Per-user list of simulated mining tasks, plus a synthesized combined view
/// for admin identities. Tasks are append-only; the list is persisted on
/// every mutation under the current user's key.
///
/// State machine per task:
/// `running → {paused ⇄ running} → completed`, with `completed`/`failed`
/// terminal. The only autonomous mutation is [`MiningStore::tick`], which the
/// service drives on a fixed interval.
pub struct MiningStore {
    store: Arc<dyn StateStore>,
    session: Arc<SessionStore>,
    clock: Arc<dyn Clock>,
    tasks: RwLock<Vec<MiningTask>>,
    combined: RwLock<Option<Vec<MiningTask>>>,
    rng: Mutex<StdRng>,
}

impl MiningStore {
    pub fn new(store: Arc<dyn StateStore>, session: Arc<SessionStore>, clock: Arc<dyn Clock>) -> Self {
        Self::with_rng(store, session, clock, StdRng::from_entropy())
    }

    /// Seeded construction pins the simulation dice for tests.
    pub fn with_seed(
        store: Arc<dyn StateStore>,
        session: Arc<SessionStore>,
        clock: Arc<dyn Clock>,
        seed: u64,
    ) -> Self {
        Self::with_rng(store, session, clock, StdRng::seed_from_u64(seed))
    }

    fn with_rng(
        store: Arc<dyn StateStore>,
        session: Arc<SessionStore>,
        clock: Arc<dyn Clock>,
        rng: StdRng,
    ) -> Self {
        Self {
            store,
            session,
            clock,
            tasks: RwLock::new(Vec::new()),
            combined: RwLock::new(None),
            rng: Mutex::new(rng),
        }
    }

    /// Reloads the task list for the current identity; clears it when nobody
    /// is logged in. Called after every session change.
    pub async fn load(&self) -> Result<(), MiningError> {
        let identity = self.session.current().await;
        let mut tasks = self.tasks.write().await;

        match &identity {
            Some(identity) => {
                *tasks = match self.store.get(&tasks_key(&identity.id)).await? {
                    Some(raw) => serde_json::from_slice(&raw).map_err(anyhow::Error::from)?,
                    None => Vec::new(),
                };
            }
            None => tasks.clear(),
        }

        let snapshot = tasks.clone();
        drop(tasks);
        self.refresh_combined(identity.as_ref().map(|i| i.role), &snapshot)
            .await
    }

    /// Creates a new running task for the current identity.
    pub async fn start_mining(
        &self,
        algorithm: Algorithm,
        coin_type: CoinType,
        target_reward: f64,
    ) -> Result<MiningTask, MiningError> {
        let identity = self.session.current().await.ok_or(MiningError::NotLoggedIn)?;

        let hashrate = {
            let mut rng = self.rng.lock().expect("rng lock poisoned");
            rng.gen_range(150.0..250.0)
        };

        let task = MiningTask {
            id: Uuid::new_v4().to_string(),
            user_id: identity.id.clone(),
            status: TaskStatus::Running,
            hashrate,
            start_time_epoch_ms: self.clock.now_epoch_ms(),
            end_time_epoch_ms: None,
            progress: 0.0,
            algorithm,
            coin_type,
            target_reward,
            actual_reward: None,
        };

        let mut tasks = self.tasks.write().await;
        tasks.push(task.clone());
        self.store
            .put(&tasks_key(&identity.id), encode(&tasks)?)
            .await?;
        let snapshot = tasks.clone();
        drop(tasks);

        self.refresh_combined(Some(identity.role), &snapshot).await?;
        info!(task_id = %task.id, coin = %coin_type, "mining task started");
        Ok(task)
    }

    /// Running → Paused. Wrong-state and unknown-id calls are silent no-ops;
    /// returns the updated task when a transition happened.
    pub async fn pause_mining(&self, task_id: &str) -> Result<Option<MiningTask>, MiningError> {
        self.transition(task_id, |task| {
            if task.status == TaskStatus::Running {
                task.status = TaskStatus::Paused;
                true
            } else {
                false
            }
        })
        .await
    }

    /// Paused → Running, with the same no-op contract as pause.
    pub async fn resume_mining(&self, task_id: &str) -> Result<Option<MiningTask>, MiningError> {
        self.transition(task_id, |task| {
            if task.status == TaskStatus::Paused {
                task.status = TaskStatus::Running;
                true
            } else {
                false
            }
        })
        .await
    }

    /// Running|Paused → Completed. The reward is the deterministic
    /// `progress/100 * target`, intentionally distinct from the randomized
    /// reward a task earns by reaching 100% on its own.
    pub async fn stop_mining(&self, task_id: &str) -> Result<Option<MiningTask>, MiningError> {
        let now = self.clock.now_epoch_ms();
        self.transition(task_id, move |task| {
            if task.is_active() {
                task.status = TaskStatus::Completed;
                task.end_time_epoch_ms = Some(now);
                task.actual_reward = Some(manual_stop_reward(task.progress, task.target_reward));
                true
            } else {
                false
            }
        })
        .await
    }

    /// Advances every running task: progress grows by a bounded random step,
    /// hashrate drifts, and crossing 100% completes the task with a reward of
    /// 80–120% of target. Terminal tasks are never touched again.
    pub async fn tick(&self) -> Result<(), MiningError> {
        let Some(identity) = self.session.current().await else {
            return Ok(());
        };

        let mut tasks = self.tasks.write().await;
        let now = self.clock.now_epoch_ms();
        let mut changed = false;

        {
            let mut rng = self.rng.lock().expect("rng lock poisoned");
            for task in tasks.iter_mut() {
                if task.status != TaskStatus::Running {
                    continue;
                }
                task.progress = (task.progress + rng.gen_range(0.0..2.0)).min(100.0);
                task.hashrate += rng.gen_range(-2.5..2.5);
                if task.progress >= 100.0 {
                    task.status = TaskStatus::Completed;
                    task.end_time_epoch_ms = Some(now);
                    task.actual_reward =
                        Some(task.target_reward * rng.gen_range(0.8..1.2));
                }
                changed = true;
            }
        }

        if !changed {
            return Ok(());
        }

        self.store
            .put(&tasks_key(&identity.id), encode(&tasks)?)
            .await?;
        let snapshot = tasks.clone();
        drop(tasks);
        self.refresh_combined(Some(identity.role), &snapshot).await
    }

    pub async fn task(&self, task_id: &str) -> Option<MiningTask> {
        let tasks = self.tasks.read().await;
        tasks.iter().find(|task| task.id == task_id).cloned()
    }

    /// The first running or paused task, if any.
    pub async fn active_task(&self) -> Option<MiningTask> {
        let tasks = self.tasks.read().await;
        tasks.iter().find(|task| task.is_active()).cloned()
    }

    pub async fn user_tasks(&self) -> Vec<MiningTask> {
        self.tasks.read().await.clone()
    }

    /// The synthesized combined view, present only for admin identities.
    pub async fn all_tasks(&self) -> Option<Vec<MiningTask>> {
        self.combined.read().await.clone()
    }

    /// Total hashrate across running tasks in the combined view; 0 without
    /// admin scope.
    pub async fn system_hashrate(&self) -> f64 {
        let combined = self.combined.read().await;
        combined
            .as_deref()
            .unwrap_or_default()
            .iter()
            .filter(|task| task.status == TaskStatus::Running)
            .map(|task| task.hashrate)
            .sum()
    }

    pub async fn system_task_counts(&self) -> TaskCounts {
        let combined = self.combined.read().await;
        let Some(tasks) = combined.as_deref() else {
            return TaskCounts::default();
        };
        TaskCounts {
            active: tasks.iter().filter(|task| task.is_active()).count(),
            completed: tasks
                .iter()
                .filter(|task| task.status == TaskStatus::Completed)
                .count(),
            failed: tasks
                .iter()
                .filter(|task| task.status == TaskStatus::Failed)
                .count(),
        }
    }

    async fn transition<F>(&self, task_id: &str, apply: F) -> Result<Option<MiningTask>, MiningError>
    where
        F: FnOnce(&mut MiningTask) -> bool,
    {
        let Some(identity) = self.session.current().await else {
            return Ok(None);
        };

        let mut tasks = self.tasks.write().await;
        let updated = tasks
            .iter_mut()
            .find(|task| task.id == task_id)
            .and_then(|task| apply(&mut *task).then(|| task.clone()));

        if updated.is_none() {
            return Ok(None);
        }

        self.store
            .put(&tasks_key(&identity.id), encode(&tasks)?)
            .await?;
        let snapshot = tasks.clone();
        drop(tasks);
        self.refresh_combined(Some(identity.role), &snapshot).await?;
        Ok(updated)
    }

    /// Admin identities see their own tasks plus a fixed set of tasks from
    /// other users, persisted under one shared key. This is a simulated
    /// fleet view, not a real multi-tenant aggregation.
    async fn refresh_combined(
        &self,
        role: Option<UserRole>,
        user_tasks: &[MiningTask],
    ) -> Result<(), MiningError> {
        let mut combined = self.combined.write().await;
        if role != Some(UserRole::Admin) {
            *combined = None;
            return Ok(());
        }

        let mut view = user_tasks.to_vec();
        view.extend(remote_fleet_tasks(self.clock.now_epoch_ms()));
        self.store
            .put(combined_tasks_key(), encode(&view)?)
            .await?;
        *combined = Some(view);
        Ok(())
    }
}

fn manual_stop_reward(progress: f64, target_reward: f64) -> f64 {
    progress / 100.0 * target_reward
}

fn encode(tasks: &[MiningTask]) -> Result<Vec<u8>, MiningError> {
    serde_json::to_vec(tasks)
        .map_err(anyhow::Error::from)
        .map_err(MiningError::from)
}

/// Fixed stand-ins for other users' rigs in the admin view.
fn remote_fleet_tasks(now_epoch_ms: u128) -> Vec<MiningTask> {
    let minutes = |count: u128| count * 60_000;
    vec![
        MiningTask {
            id: "remote-1".to_owned(),
            user_id: "user1".to_owned(),
            status: TaskStatus::Running,
            hashrate: 245.6,
            start_time_epoch_ms: now_epoch_ms.saturating_sub(minutes(60)),
            end_time_epoch_ms: None,
            progress: 78.0,
            algorithm: Algorithm::Sha256,
            coin_type: CoinType::Bitcoin,
            target_reward: 0.05,
            actual_reward: None,
        },
        MiningTask {
            id: "remote-2".to_owned(),
            user_id: "user2".to_owned(),
            status: TaskStatus::Completed,
            hashrate: 187.3,
            start_time_epoch_ms: now_epoch_ms.saturating_sub(minutes(120)),
            end_time_epoch_ms: Some(now_epoch_ms.saturating_sub(minutes(30))),
            progress: 100.0,
            algorithm: Algorithm::Ethash,
            coin_type: CoinType::Ethereum,
            target_reward: 0.08,
            actual_reward: Some(0.074),
        },
        MiningTask {
            id: "remote-3".to_owned(),
            user_id: "user3".to_owned(),
            status: TaskStatus::Failed,
            hashrate: 0.0,
            start_time_epoch_ms: now_epoch_ms.saturating_sub(minutes(90)),
            end_time_epoch_ms: Some(now_epoch_ms.saturating_sub(minutes(80))),
            progress: 23.0,
            algorithm: Algorithm::Scrypt,
            coin_type: CoinType::Dogecoin,
            target_reward: 0.03,
            actual_reward: None,
        },
        MiningTask {
            id: "remote-4".to_owned(),
            user_id: "user4".to_owned(),
            status: TaskStatus::Running,
            hashrate: 320.8,
            start_time_epoch_ms: now_epoch_ms.saturating_sub(minutes(20)),
            end_time_epoch_ms: None,
            progress: 35.0,
            algorithm: Algorithm::SolanaPoh,
            coin_type: CoinType::Solana,
            target_reward: 0.12,
            actual_reward: None,
        },
    ]
}
