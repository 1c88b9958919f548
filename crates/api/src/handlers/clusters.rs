//! Handlers for the `/clusters` resource: listing, launching, inspecting
//! and aborting provisioning jobs.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use nimbus_core::types::JobId;
use nimbus_core::{JobSession, SessionResult};
use nimbus_provision::{Credentials, LaunchParams, LaunchSpec};
use nimbus_store::{JobRecord, JobState, KeyMaterial};
use serde::Deserialize;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::response::DataResponse;
use crate::state::AppState;

/// Body of `POST /clusters`.
#[derive(Debug, Deserialize)]
pub struct LaunchRequest {
    #[serde(flatten)]
    pub spec: LaunchSpec,

    /// Cloud credentials; falls back to the server's environment when
    /// omitted.
    #[serde(default)]
    pub credentials: Option<Credentials>,

    /// SSH key material to store for this cluster.
    #[serde(default)]
    pub ssh_key: Option<KeyMaterial>,
}

// ---------------------------------------------------------------------------
// List
// ---------------------------------------------------------------------------

/// GET /api/v1/clusters
///
/// List persisted job records, newest first.
pub async fn list_clusters(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    let records = state.store.list().await;
    Ok(Json(DataResponse { data: records }))
}

// ---------------------------------------------------------------------------
// Launch
// ---------------------------------------------------------------------------

/// POST /api/v1/clusters
///
/// Validate the launch request, persist a job record, and start the
/// provisioning worker. Returns 201 with the created record; progress is
/// observed via the job's event stream.
pub async fn launch_cluster(
    State(state): State<AppState>,
    Json(input): Json<LaunchRequest>,
) -> AppResult<impl IntoResponse> {
    input
        .spec
        .validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;
    let credentials = Credentials::resolve(input.credentials)?;

    let id = uuid::Uuid::new_v4();
    let record = JobRecord {
        id,
        name: input.spec.name.clone(),
        region: input.spec.region.clone(),
        instance_type: input.spec.instance_type.clone(),
        num_instances: input.spec.num_instances,
        state: JobState::Running,
        created_at: chrono::Utc::now(),
        domain: None,
        dashboard_login_token: None,
        ca_cert: None,
    };
    state.store.insert(record.clone()).await?;

    let session = Arc::new(JobSession::new(id));
    state.registry.insert(Arc::clone(&session)).await;

    let params = serde_json::to_value(LaunchParams {
        spec: input.spec,
        credentials,
        ssh_key: input.ssh_key,
    })
    .map_err(|e| AppError::InternalError(e.to_string()))?;

    tracing::info!(job_id = %id, name = %record.name, "Cluster launch accepted");
    spawn_worker(state, session, params);

    Ok((StatusCode::CREATED, Json(DataResponse { data: record })))
}

/// Run the provisioner on its own task and persist the result when the job
/// ends. Transport and store failures never reach the worker.
fn spawn_worker(state: AppState, session: Arc<JobSession>, params: serde_json::Value) {
    tokio::spawn(async move {
        let id = session.id();
        let result = session.drive(Arc::clone(&state.provisioner), params).await;

        let update = state
            .store
            .update(id, |record| match &result {
                SessionResult::Completed(outcome) => {
                    record.state = JobState::Done;
                    record.domain = outcome.domain.clone();
                    record.dashboard_login_token = outcome.dashboard_login_token.clone();
                    record.ca_cert = outcome.ca_cert.clone();
                }
                SessionResult::Failed(_) => record.state = JobState::Failed,
                SessionResult::Aborted => record.state = JobState::Aborted,
            })
            .await;

        // An aborted job's record is usually gone already; that is fine.
        if let Err(e) = update {
            tracing::debug!(job_id = %id, error = %e, "Could not persist job result");
        }
    });
}

// ---------------------------------------------------------------------------
// Get
// ---------------------------------------------------------------------------

/// GET /api/v1/clusters/{id}
pub async fn get_cluster(
    State(state): State<AppState>,
    Path(id): Path<JobId>,
) -> AppResult<impl IntoResponse> {
    let record = state.store.get(id).await?;
    Ok(Json(DataResponse { data: record }))
}

// ---------------------------------------------------------------------------
// Abort
// ---------------------------------------------------------------------------

/// DELETE /api/v1/clusters/{id}
///
/// Abort a job: cancel any in-flight prompt wait, close every observer
/// stream, and delete the persisted record. 404 if the job is unknown to
/// both the registry and the store.
pub async fn abort_cluster(
    State(state): State<AppState>,
    Path(id): Path<JobId>,
) -> AppResult<impl IntoResponse> {
    match state.registry.remove(id).await {
        Ok(session) => {
            session.abort().await;
            if let Err(e) = state.store.remove(id).await {
                tracing::debug!(job_id = %id, error = %e, "No record to remove for aborted job");
            }
        }
        // Not live (e.g. created before a restart); the record alone decides
        // between 204 and 404.
        Err(_) => state.store.remove(id).await?,
    }

    tracing::info!(job_id = %id, "Cluster aborted");
    Ok(StatusCode::NO_CONTENT)
}
