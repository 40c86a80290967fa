use crate::errors::DecryptResult;
use crate::pool::WorkerPool;
use crate::types::{SessionCredentials, WorkerConfig};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// One-shot broadcaster of session credentials to the worker pool.
///
/// Until a broadcast has completed, the pipeline treats decryption as
/// unavailable and serves live-only output.
pub struct SessionInitializer {
    pool: Arc<WorkerPool>,
    config: WorkerConfig,
    ready: AtomicBool,
    // serializes concurrent initialize() callers
    serial: Mutex<()>,
}

impl SessionInitializer {
    pub fn new(pool: Arc<WorkerPool>, config: WorkerConfig) -> Self {
        Self {
            pool,
            config,
            ready: AtomicBool::new(false),
            serial: Mutex::new(()),
        }
    }

    /// Whether every unit has acknowledged its credentials.
    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    /// Broadcast credentials and static configuration to the full pool once.
    ///
    /// A call after a completed broadcast, or with credentials carrying
    /// neither token, is a no-op returning `Ok(false)`. The ready flag is set
    /// only after every unit acknowledges.
    pub async fn initialize(&self, credentials: &SessionCredentials) -> DecryptResult<bool> {
        if credentials.is_empty() {
            debug!("skipping pool initialization: no session tokens present");
            return Ok(false);
        }

        let _guard = self.serial.lock().await;
        if self.is_ready() {
            return Ok(false);
        }

        self.broadcast(credentials).await?;
        self.ready.store(true, Ordering::Release);
        info!(units = self.pool.size(), "decryption pool initialized");
        Ok(true)
    }

    /// Re-run the broadcast with fresh credentials after rotation.
    ///
    /// Decryption reads as unavailable while the new credentials propagate.
    pub async fn reinitialize(&self, credentials: &SessionCredentials) -> DecryptResult<bool> {
        let _guard = self.serial.lock().await;
        self.ready.store(false, Ordering::Release);
        if credentials.is_empty() {
            return Ok(false);
        }

        self.broadcast(credentials).await?;
        self.ready.store(true, Ordering::Release);
        info!(units = self.pool.size(), "decryption pool reinitialized");
        Ok(true)
    }

    async fn broadcast(&self, credentials: &SessionCredentials) -> DecryptResult<()> {
        for unit in self.pool.at_full_size() {
            unit.initialize(self.config.clone(), credentials.clone())
                .await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::SessionKeyFactory;

    fn initializer(size: usize) -> SessionInitializer {
        let pool = Arc::new(WorkerPool::new(size, Arc::new(SessionKeyFactory)));
        SessionInitializer::new(pool, WorkerConfig::default())
    }

    #[tokio::test]
    async fn initialize_fills_pool_and_sets_flag() {
        let init = initializer(4);
        assert!(!init.is_ready());

        let applied = init
            .initialize(&SessionCredentials::new("tok", "refresh"))
            .await
            .unwrap();
        assert!(applied);
        assert!(init.is_ready());
        assert_eq!(init.pool.live(), 4);
    }

    #[tokio::test]
    async fn second_initialize_is_a_no_op() {
        let init = initializer(2);
        let creds = SessionCredentials::new("tok", "refresh");
        assert!(init.initialize(&creds).await.unwrap());
        assert!(!init.initialize(&creds).await.unwrap());
        assert!(init.is_ready());
    }

    #[tokio::test]
    async fn tokenless_credentials_are_ignored() {
        let init = initializer(2);
        let applied = init.initialize(&SessionCredentials::default()).await.unwrap();
        assert!(!applied);
        assert!(!init.is_ready());
        assert_eq!(init.pool.live(), 0);
    }

    #[tokio::test]
    async fn reinitialize_rotates_credentials() {
        let init = initializer(2);
        assert!(init
            .initialize(&SessionCredentials::new("tok-old", ""))
            .await
            .unwrap());
        assert!(init
            .reinitialize(&SessionCredentials::new("tok-new", ""))
            .await
            .unwrap());
        assert!(init.is_ready());
    }
}
