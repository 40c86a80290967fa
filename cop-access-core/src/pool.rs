use crate::crypto::{DecryptionEngine, EngineFactory};
use crate::errors::{DecryptError, DecryptResult};
use crate::types::{SessionCredentials, WorkerConfig};
use std::env;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};
use uuid::Uuid;

pub const DEFAULT_POOL_SIZE: usize = 4;
const POOL_SIZE_ENV: &str = "COP_POOL_SIZE";

/// Messages understood by a worker unit. Each unit drains its own queue in
/// arrival order, so execution is FIFO per unit.
enum WorkerRequest {
    Init {
        config: WorkerConfig,
        credentials: SessionCredentials,
        ack: oneshot::Sender<DecryptResult<()>>,
    },
    Decrypt {
        job_id: Uuid,
        ciphertext: Vec<u8>,
        reply: oneshot::Sender<DecryptResult<Vec<u8>>>,
    },
}

/// Cloneable handle addressing one worker unit.
#[derive(Clone)]
pub struct WorkerHandle {
    index: usize,
    tx: mpsc::UnboundedSender<WorkerRequest>,
}

impl WorkerHandle {
    /// Position of this unit in the pool roster.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Queue ciphertext on this unit and await the correlated result.
    ///
    /// The buffer moves into the unit. Every dispatch carries a fresh job id
    /// and resolves through its own reply channel, so a response is matched
    /// to its originating request rather than to pool-wide arrival order.
    pub async fn decrypt(&self, ciphertext: Vec<u8>) -> DecryptResult<Vec<u8>> {
        let job_id = Uuid::new_v4();
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(WorkerRequest::Decrypt {
                job_id,
                ciphertext,
                reply,
            })
            .map_err(|_| DecryptError::WorkerGone)?;
        rx.await.map_err(|_| DecryptError::WorkerGone)?
    }

    pub(crate) async fn initialize(
        &self,
        config: WorkerConfig,
        credentials: SessionCredentials,
    ) -> DecryptResult<()> {
        let (ack, rx) = oneshot::channel();
        self.tx
            .send(WorkerRequest::Init {
                config,
                credentials,
                ack,
            })
            .map_err(|_| DecryptError::WorkerGone)?;
        rx.await.map_err(|_| DecryptError::WorkerGone)?
    }
}

struct PoolState {
    workers: Vec<WorkerHandle>,
    cursor: usize,
}

/// Fixed-size pool of isolated decryption units.
///
/// Units are tokio tasks spawned lazily up to the configured size and never
/// torn down during normal operation. Must be constructed inside a tokio
/// runtime.
pub struct WorkerPool {
    size: usize,
    factory: Arc<dyn EngineFactory>,
    state: Mutex<PoolState>,
}

impl WorkerPool {
    pub fn new(size: usize, factory: Arc<dyn EngineFactory>) -> Self {
        Self {
            size: size.max(1),
            factory,
            state: Mutex::new(PoolState {
                workers: Vec::new(),
                cursor: 0,
            }),
        }
    }

    /// Build a pool sized from `COP_POOL_SIZE`, defaulting to four units.
    pub fn from_env(factory: Arc<dyn EngineFactory>) -> Self {
        let size = env::var(POOL_SIZE_ENV)
            .ok()
            .and_then(|value| value.parse().ok())
            .unwrap_or(DEFAULT_POOL_SIZE);
        Self::new(size, factory)
    }

    /// Configured maximum unit count.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Number of units spawned so far.
    pub fn live(&self) -> usize {
        self.lock().workers.len()
    }

    /// Hand out a unit without blocking: grow until the cap is reached, then
    /// round-robin among live units. Work queues on the unit's own mailbox,
    /// never on the pool.
    pub fn acquire(&self) -> WorkerHandle {
        let mut state = self.lock();
        if state.workers.len() < self.size {
            let handle = self.spawn_unit(state.workers.len());
            state.workers.push(handle.clone());
            return handle;
        }
        let handle = state.workers[state.cursor].clone();
        state.cursor = (state.cursor + 1) % state.workers.len();
        handle
    }

    /// Grow to full size and return a handle for every unit.
    pub(crate) fn at_full_size(&self) -> Vec<WorkerHandle> {
        let mut state = self.lock();
        while state.workers.len() < self.size {
            let handle = self.spawn_unit(state.workers.len());
            state.workers.push(handle);
        }
        state.workers.clone()
    }

    fn spawn_unit(&self, index: usize) -> WorkerHandle {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(unit_loop(index, rx, Arc::clone(&self.factory)));
        debug!(unit = index, "spawned decryption unit");
        WorkerHandle { index, tx }
    }

    fn lock(&self) -> MutexGuard<'_, PoolState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

async fn unit_loop(
    index: usize,
    mut rx: mpsc::UnboundedReceiver<WorkerRequest>,
    factory: Arc<dyn EngineFactory>,
) {
    let mut engine: Option<Arc<dyn DecryptionEngine>> = None;
    while let Some(request) = rx.recv().await {
        match request {
            WorkerRequest::Init {
                config,
                credentials,
                ack,
            } => {
                let outcome = match factory.build(&config, &credentials) {
                    Ok(built) => {
                        engine = Some(built);
                        Ok(())
                    }
                    Err(err) => {
                        warn!(unit = index, error = %err, "engine construction failed");
                        Err(err)
                    }
                };
                let _ = ack.send(outcome);
            }
            WorkerRequest::Decrypt {
                job_id,
                ciphertext,
                reply,
            } => {
                let outcome = match engine.as_ref() {
                    Some(engine) => engine.decrypt(&ciphertext),
                    None => Err(DecryptError::EngineUnavailable),
                };
                if let Err(err) = &outcome {
                    warn!(unit = index, %job_id, error = %err, "decryption request failed");
                }
                // receiver may have stopped awaiting; dropping the result is fine
                let _ = reply.send(outcome);
            }
        }
    }
}
