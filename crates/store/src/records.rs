//! Durable job records.
//!
//! Records carry the metadata needed to list and resume inspection of jobs
//! across restarts. The live event log is not part of a record; a restarted
//! process serves the persisted metadata but not a replayable stream.

use std::path::{Path, PathBuf};

use nimbus_core::types::{JobId, Timestamp};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::error::StoreError;

/// Lifecycle state of a persisted job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Pending,
    Running,
    Done,
    Failed,
    Aborted,
}

/// Persisted metadata for one provisioning attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRecord {
    pub id: JobId,
    /// Human-chosen cluster name; also names the stored SSH key.
    pub name: String,
    pub region: String,
    pub instance_type: String,
    pub num_instances: u32,
    pub state: JobState,
    pub created_at: Timestamp,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dashboard_login_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ca_cert: Option<String>,
}

/// Serialized shape of `data.json`.
#[derive(Debug, Default, Serialize, Deserialize)]
struct JobFile {
    jobs: Vec<JobRecord>,
}

/// JSON-file backed store of [`JobRecord`]s.
///
/// The whole file is rewritten on every mutation, via a temp file and an
/// atomic rename so a crash mid-write never corrupts existing data. One
/// mutex covers both the in-memory copy and the file.
pub struct JobStore {
    path: PathBuf,
    inner: Mutex<Vec<JobRecord>>,
}

impl JobStore {
    /// Open (or initialize) the store at `<data_dir>/data.json`.
    ///
    /// A missing file is an empty store, not an error.
    pub async fn open(data_dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        let data_dir = data_dir.as_ref();
        tokio::fs::create_dir_all(data_dir).await?;
        let path = data_dir.join("data.json");

        let records = match tokio::fs::read(&path).await {
            Ok(bytes) => serde_json::from_slice::<JobFile>(&bytes)?.jobs,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(e.into()),
        };

        tracing::debug!(path = %path.display(), count = records.len(), "Job store opened");
        Ok(Self {
            path,
            inner: Mutex::new(records),
        })
    }

    /// All records, newest first.
    pub async fn list(&self) -> Vec<JobRecord> {
        let mut records = self.inner.lock().await.clone();
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        records
    }

    pub async fn get(&self, id: JobId) -> Result<JobRecord, StoreError> {
        self.inner
            .lock()
            .await
            .iter()
            .find(|record| record.id == id)
            .cloned()
            .ok_or(StoreError::NotFound {
                entity: "Job",
                id: id.to_string(),
            })
    }

    /// Insert a new record and persist.
    pub async fn insert(&self, record: JobRecord) -> Result<(), StoreError> {
        let mut records = self.inner.lock().await;
        records.push(record);
        self.persist(&records).await
    }

    /// Apply `mutate` to the record with the given id and persist.
    pub async fn update<F>(&self, id: JobId, mutate: F) -> Result<JobRecord, StoreError>
    where
        F: FnOnce(&mut JobRecord),
    {
        let mut records = self.inner.lock().await;
        let record = records
            .iter_mut()
            .find(|record| record.id == id)
            .ok_or(StoreError::NotFound {
                entity: "Job",
                id: id.to_string(),
            })?;
        mutate(record);
        let updated = record.clone();
        self.persist(&records).await?;
        Ok(updated)
    }

    /// Remove a record and persist. Unknown ids are `NotFound`.
    pub async fn remove(&self, id: JobId) -> Result<(), StoreError> {
        let mut records = self.inner.lock().await;
        let before = records.len();
        records.retain(|record| record.id != id);
        if records.len() == before {
            return Err(StoreError::NotFound {
                entity: "Job",
                id: id.to_string(),
            });
        }
        self.persist(&records).await
    }

    async fn persist(&self, records: &[JobRecord]) -> Result<(), StoreError> {
        let file = JobFile {
            jobs: records.to_vec(),
        };
        let bytes = serde_json::to_vec_pretty(&file)?;

        // Write-then-rename keeps the previous file intact on a crash.
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, &bytes).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    fn record(name: &str) -> JobRecord {
        JobRecord {
            id: uuid::Uuid::new_v4(),
            name: name.into(),
            region: "eu-west-1".into(),
            instance_type: "m4.large".into(),
            num_instances: 3,
            state: JobState::Pending,
            created_at: chrono::Utc::now(),
            domain: None,
            dashboard_login_token: None,
            ca_cert: None,
        }
    }

    #[tokio::test]
    async fn open_missing_file_is_empty_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = JobStore::open(dir.path()).await.unwrap();
        assert!(store.list().await.is_empty());
    }

    #[tokio::test]
    async fn insert_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();

        let first = record("alpha");
        let id = first.id;
        {
            let store = JobStore::open(dir.path()).await.unwrap();
            store.insert(first).await.unwrap();
        }

        let store = JobStore::open(dir.path()).await.unwrap();
        let loaded = store.get(id).await.unwrap();
        assert_eq!(loaded.name, "alpha");
        assert_eq!(loaded.state, JobState::Pending);
    }

    #[tokio::test]
    async fn update_mutates_and_persists() {
        let dir = tempfile::tempdir().unwrap();
        let store = JobStore::open(dir.path()).await.unwrap();

        let rec = record("beta");
        let id = rec.id;
        store.insert(rec).await.unwrap();

        let updated = store
            .update(id, |r| {
                r.state = JobState::Done;
                r.domain = Some("beta.example.com".into());
            })
            .await
            .unwrap();
        assert_eq!(updated.state, JobState::Done);

        let reopened = JobStore::open(dir.path()).await.unwrap();
        let loaded = reopened.get(id).await.unwrap();
        assert_eq!(loaded.state, JobState::Done);
        assert_eq!(loaded.domain.as_deref(), Some("beta.example.com"));
    }

    #[tokio::test]
    async fn remove_unknown_id_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = JobStore::open(dir.path()).await.unwrap();

        let result = store.remove(uuid::Uuid::new_v4()).await;
        assert_matches!(result, Err(StoreError::NotFound { entity: "Job", .. }));
    }

    #[tokio::test]
    async fn remove_deletes_only_the_target() {
        let dir = tempfile::tempdir().unwrap();
        let store = JobStore::open(dir.path()).await.unwrap();

        let a = record("a");
        let b = record("b");
        let a_id = a.id;
        let b_id = b.id;
        store.insert(a).await.unwrap();
        store.insert(b).await.unwrap();

        store.remove(a_id).await.unwrap();

        assert_matches!(store.get(a_id).await, Err(StoreError::NotFound { .. }));
        assert!(store.get(b_id).await.is_ok());
    }
}
