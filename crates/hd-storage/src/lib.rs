use anyhow::Result;
use async_trait::async_trait;
use rocksdb::{DB, Options};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::RwLock;

/// Key-value persistence for store state. Values are opaque blobs; every
/// store serializes its own records (JSON) before handing them over.
#[async_trait]
pub trait StateStore: Send + Sync {
    async fn put(&self, key: &str, value: Vec<u8>) -> Result<()>;
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;
    async fn remove(&self, key: &str) -> Result<()>;
}

#[derive(Default)]
pub struct InMemoryStore {
    entries: RwLock<HashMap<String, Vec<u8>>>,
}

#[async_trait]
impl StateStore for InMemoryStore {
    async fn put(&self, key: &str, value: Vec<u8>) -> Result<()> {
        let mut guard = self.entries.write().await;
        guard.insert(key.to_owned(), value);
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let guard = self.entries.read().await;
        Ok(guard.get(key).cloned())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        let mut guard = self.entries.write().await;
        guard.remove(key);
        Ok(())
    }
}

pub struct RocksDbStore {
    db: Arc<DB>,
}

impl RocksDbStore {
    pub fn open_default(path: &str) -> Result<Self> {
        let mut options = Options::default();
        options.create_if_missing(true);
        let db = DB::open(&options, path)?;
        Ok(Self { db: Arc::new(db) })
    }
}

#[async_trait]
impl StateStore for RocksDbStore {
    async fn put(&self, key: &str, value: Vec<u8>) -> Result<()> {
        self.db.put(key.as_bytes(), value)?;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let value = self.db.get(key.as_bytes())?;
        Ok(value.map(|v| v.to_vec()))
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.db.delete(key.as_bytes())?;
        Ok(())
    }
}

// Key layout. One identity blob under a fixed key; per-user lists keyed by
// user id; the synthesized admin task view under its own fixed key. There is
// no versioning or migration of these layouts.

pub fn session_key() -> &'static str {
    "session:current"
}

pub fn tasks_key(user_id: &str) -> String {
    format!("mining-tasks:{user_id}")
}

pub fn combined_tasks_key() -> &'static str {
    "mining-tasks:all"
}

pub fn wallets_key(user_id: &str) -> String {
    format!("wallets:{user_id}")
}

pub fn transactions_key(user_id: &str) -> String {
    format!("transactions:{user_id}")
}

/// Epoch-millisecond time source, injectable so the simulation tick is
/// deterministic under test.
pub trait Clock: Send + Sync {
    fn now_epoch_ms(&self) -> u128;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now_epoch_ms(&self) -> u128 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_millis())
            .unwrap_or_default()
    }
}

/// Manually advanced clock for tests.
#[derive(Default)]
pub struct ManualClock {
    epoch_ms: AtomicU64,
}

impl ManualClock {
    pub fn set(&self, epoch_ms: u64) {
        self.epoch_ms.store(epoch_ms, Ordering::SeqCst);
    }

    pub fn advance(&self, delta_ms: u64) {
        self.epoch_ms.fetch_add(delta_ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_epoch_ms(&self) -> u128 {
        u128::from(self.epoch_ms.load(Ordering::SeqCst))
    }
}
