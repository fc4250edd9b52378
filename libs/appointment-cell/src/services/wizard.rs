// libs/appointment-cell/src/services/wizard.rs
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use deadpool_redis::{Config, Connection, Pool, Runtime};
use redis::AsyncCommands;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::models::{AppointmentError, WizardHandle, WizardState};

/// Keyed storage for in-progress wizard state.
#[async_trait]
pub trait WizardCache: Send + Sync {
    /// Stores `record` under `handle`, or under a newly allocated handle when none is given.
    async fn put(&self, record: &WizardState, handle: Option<WizardHandle>) -> Result<WizardHandle, AppointmentError>;

    async fn get(&self, handle: WizardHandle) -> Result<Option<WizardState>, AppointmentError>;

    async fn remove(&self, handle: WizardHandle) -> Result<(), AppointmentError>;
}

// ==============================================================================
// IN-MEMORY BACKEND
// ==============================================================================

struct StoredState {
    record: WizardState,
    stored_at: Instant,
}

pub struct InMemoryWizardCache {
    records: RwLock<HashMap<WizardHandle, StoredState>>,
    ttl: Option<Duration>,
}

impl InMemoryWizardCache {
    pub fn new() -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
            ttl: None,
        }
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
            ttl: Some(ttl),
        }
    }

    fn is_expired(&self, stored: &StoredState) -> bool {
        self.ttl.is_some_and(|ttl| stored.stored_at.elapsed() >= ttl)
    }
}

impl Default for InMemoryWizardCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl WizardCache for InMemoryWizardCache {
    async fn put(&self, record: &WizardState, handle: Option<WizardHandle>) -> Result<WizardHandle, AppointmentError> {
        let handle = handle.unwrap_or_else(WizardHandle::generate);
        let mut records = self.records.write().await;
        records.insert(
            handle,
            StoredState {
                record: record.clone(),
                stored_at: Instant::now(),
            },
        );
        Ok(handle)
    }

    async fn get(&self, handle: WizardHandle) -> Result<Option<WizardState>, AppointmentError> {
        let records = self.records.read().await;
        Ok(records
            .get(&handle)
            .filter(|stored| !self.is_expired(stored))
            .map(|stored| stored.record.clone()))
    }

    async fn remove(&self, handle: WizardHandle) -> Result<(), AppointmentError> {
        self.records.write().await.remove(&handle);
        Ok(())
    }
}

// ==============================================================================
// REDIS BACKEND
// ==============================================================================

pub struct RedisWizardCache {
    pool: Pool,
    ttl_seconds: u64,
}

impl RedisWizardCache {
    pub async fn new(redis_url: &str, ttl_seconds: u64) -> Result<Self, AppointmentError> {
        let cfg = Config::from_url(redis_url);
        let pool = cfg
            .create_pool(Some(Runtime::Tokio1))
            .map_err(|e| AppointmentError::WizardStoreError(format!("Failed to create Redis pool: {}", e)))?;

        let cache = Self { pool, ttl_seconds };

        // Test connection
        let mut conn = cache.get_connection().await?;
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        info!("Redis wizard cache initialized (ttl {}s)", ttl_seconds);

        Ok(cache)
    }

    fn key(handle: WizardHandle) -> String {
        format!("wizard_state:{}", handle)
    }

    async fn get_connection(&self) -> Result<Connection, AppointmentError> {
        self.pool
            .get()
            .await
            .map_err(|e| AppointmentError::WizardStoreError(format!("Failed to get Redis connection: {}", e)))
    }
}

#[async_trait]
impl WizardCache for RedisWizardCache {
    async fn put(&self, record: &WizardState, handle: Option<WizardHandle>) -> Result<WizardHandle, AppointmentError> {
        let handle = handle.unwrap_or_else(WizardHandle::generate);
        let data = serde_json::to_string(record)?;

        let mut conn = self.get_connection().await?;
        let _: () = redis::cmd("SET")
            .arg(Self::key(handle))
            .arg(data)
            .arg("EX")
            .arg(self.ttl_seconds)
            .query_async(&mut conn)
            .await?;

        Ok(handle)
    }

    async fn get(&self, handle: WizardHandle) -> Result<Option<WizardState>, AppointmentError> {
        let mut conn = self.get_connection().await?;
        let data: Option<String> = conn.get(Self::key(handle)).await?;

        match data {
            Some(data) => Ok(Some(serde_json::from_str(&data)?)),
            None => Ok(None),
        }
    }

    async fn remove(&self, handle: WizardHandle) -> Result<(), AppointmentError> {
        let mut conn = self.get_connection().await?;
        let _: () = conn.del(Self::key(handle)).await?;
        Ok(())
    }
}

// ==============================================================================
// COORDINATOR
// ==============================================================================

/// Carries a booking interaction's state between wizard steps.
///
/// A missing or expired handle is an ordinary outcome (`Ok(None)`), which callers answer by
/// sending the user back to the first step.
#[derive(Clone)]
pub struct WizardStateCoordinator {
    cache: Arc<dyn WizardCache>,
}

impl WizardStateCoordinator {
    pub fn new(cache: Arc<dyn WizardCache>) -> Self {
        Self { cache }
    }

    pub async fn load(&self, handle: WizardHandle) -> Result<Option<WizardState>, AppointmentError> {
        let state = self.cache.get(handle).await?;
        if state.is_none() {
            debug!("No wizard state for handle {}", handle);
        }
        Ok(state)
    }

    /// Like [`WizardStateCoordinator::load`] for a handle taken straight from a request.
    pub async fn load_raw(&self, raw_handle: &str) -> Result<Option<(WizardHandle, WizardState)>, AppointmentError> {
        let Ok(handle) = raw_handle.parse::<WizardHandle>() else {
            warn!("Ignoring malformed wizard handle");
            return Ok(None);
        };

        Ok(self.load(handle).await?.map(|state| (handle, state)))
    }

    /// Overwrites the whole record; there is no merging with what was stored before.
    pub async fn save(&self, state: &WizardState, handle: Option<WizardHandle>) -> Result<WizardHandle, AppointmentError> {
        let handle = self.cache.put(state, handle).await?;
        debug!("Saved wizard state {}", handle);
        Ok(handle)
    }

    pub async fn discard(&self, handle: WizardHandle) -> Result<(), AppointmentError> {
        self.cache.remove(handle).await?;
        debug!("Discarded wizard state {}", handle);
        Ok(())
    }
}
