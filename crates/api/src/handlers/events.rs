//! Live event streaming over SSE.
//!
//! Each connection gets its own subscription into the job's event log: the
//! full backlog first (or everything after `?cursor=N` on reconnect), then
//! live events as they are appended. The stream ends when the job reaches
//! its terminal state and the backlog has been delivered.

use std::convert::Infallible;

use axum::extract::{Path, Query, State};
use axum::response::sse::{Event as SseEvent, KeepAlive, Sse};
use futures::Stream;
use nimbus_core::types::JobId;
use serde::Deserialize;
use tokio::sync::mpsc;

use crate::error::AppResult;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct EventStreamQuery {
    /// Last event index the client has already seen. Omitted means "replay
    /// everything".
    #[serde(default)]
    pub cursor: Option<i64>,
}

/// GET /api/v1/clusters/{id}/events
///
/// Server-sent events feed for one job. Every SSE message carries the
/// event's sequence index as its id, so clients can resume with `?cursor=`
/// after a dropped connection.
pub async fn stream_events(
    State(state): State<AppState>,
    Path(id): Path<JobId>,
    Query(query): Query<EventStreamQuery>,
) -> AppResult<Sse<impl Stream<Item = Result<SseEvent, Infallible>>>> {
    let session = state.registry.find(id).await?;

    let (tx, rx) = mpsc::unbounded_channel();
    // The drain task drops the sender once the job is done and the backlog
    // is delivered (or if this connection goes away), which ends the stream
    // below. The done signal itself is not needed here.
    let _done = session.subscribe(query.cursor.unwrap_or(-1), tx).await;

    tracing::info!(job_id = %id, "Streaming events");

    let stream = futures::stream::unfold(rx, |mut rx| async move {
        let event = rx.recv().await?;
        let sse = SseEvent::default().id(event.index.to_string());
        match sse.json_data(&*event) {
            Ok(sse) => Some((Ok::<_, Infallible>(sse), rx)),
            Err(e) => {
                tracing::error!(error = %e, "Failed to serialize event for SSE");
                None
            }
        }
    });

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}
