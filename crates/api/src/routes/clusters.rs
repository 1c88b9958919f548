//! Route definitions for the `/clusters` resource.

use axum::routing::get;
use axum::Router;

use crate::handlers::{clusters, events, prompts};
use crate::state::AppState;

/// Routes mounted at `/clusters`.
///
/// ```text
/// GET    /                            -> list_clusters
/// POST   /                            -> launch_cluster
/// GET    /{id}                        -> get_cluster
/// DELETE /{id}                        -> abort_cluster
/// GET    /{id}/events                 -> stream_events (SSE)
/// GET    /{id}/prompts                -> list_prompts
/// GET    /{id}/prompts/{prompt_id}    -> get_prompt
/// POST   /{id}/prompts/{prompt_id}    -> answer_prompt
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(clusters::list_clusters).post(clusters::launch_cluster),
        )
        .route(
            "/{id}",
            get(clusters::get_cluster).delete(clusters::abort_cluster),
        )
        .route("/{id}/events", get(events::stream_events))
        .route("/{id}/prompts", get(prompts::list_prompts))
        .route(
            "/{id}/prompts/{prompt_id}",
            get(prompts::get_prompt).post(prompts::answer_prompt),
        )
}
