//! In-memory registry of live job sessions.
//!
//! This is the only lock scope shared between HTTP handlers; the sessions
//! themselves carry their own per-job locks. Finished jobs stay registered
//! (late subscribers still get the full backlog); only an abort removes a
//! job while the process runs.

use std::collections::HashMap;
use std::sync::Arc;

use nimbus_core::types::JobId;
use nimbus_core::{CoreError, JobSession};
use tokio::sync::RwLock;

pub struct JobRegistry {
    jobs: RwLock<HashMap<JobId, Arc<JobSession>>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self {
            jobs: RwLock::new(HashMap::new()),
        }
    }

    pub async fn insert(&self, session: Arc<JobSession>) {
        self.jobs.write().await.insert(session.id(), session);
    }

    pub async fn find(&self, id: JobId) -> Result<Arc<JobSession>, CoreError> {
        self.jobs
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or(CoreError::NotFound {
                entity: "Job",
                id: id.to_string(),
            })
    }

    /// Remove and return a session. The caller is responsible for aborting it.
    pub async fn remove(&self, id: JobId) -> Result<Arc<JobSession>, CoreError> {
        self.jobs
            .write()
            .await
            .remove(&id)
            .ok_or(CoreError::NotFound {
                entity: "Job",
                id: id.to_string(),
            })
    }

    /// Number of registered jobs that have not reached a terminal state.
    pub async fn active_count(&self) -> usize {
        self.jobs
            .read()
            .await
            .values()
            .filter(|session| !session.is_terminal())
            .count()
    }
}

impl Default for JobRegistry {
    fn default() -> Self {
        Self::new()
    }
}
