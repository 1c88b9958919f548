//! Per-job append-only event log.
//!
//! The log is the sole source of truth for "what has happened so far" on a
//! job. Observers never read it directly; they go through a
//! [`SubscriptionSet`](crate::subscription::SubscriptionSet), which replays
//! `since(cursor)` on every append notification.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::prompt::Prompt;

/// Discriminant for a job event.
///
/// Serialized in snake_case as the wire-level `type` field. Consumers must
/// treat unrecognized values as no-ops, which is why deserialization maps
/// them to [`EventKind::Unknown`] instead of failing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// Informational progress message from the worker.
    Status,
    /// A worker-reported error. Purely observational; never ends the job.
    Error,
    /// A prompt was created or resolved (see the embedded [`Prompt`]).
    Prompt,
    /// Terminal metadata: the domain name assigned to the cluster.
    Domain,
    /// Terminal metadata: the dashboard login token.
    DashboardLoginToken,
    /// Terminal metadata: the cluster CA certificate (base64, URL-safe).
    CaCert,
    /// The job reached its terminal state. Always the last event.
    Done,
    /// Forward-compatibility catch-all for event kinds this build does not
    /// know about.
    #[serde(other)]
    Unknown,
}

/// One immutable entry in a job's event log.
///
/// The wire representation is `{type, description?, prompt?}`; the sequence
/// index is carried out of band (e.g. as the SSE event id) so the body stays
/// byte-compatible with existing consumers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    /// Monotonic, gapless, 0-based position within the owning job's log.
    #[serde(skip)]
    pub index: u64,

    #[serde(rename = "type")]
    pub kind: EventKind,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Snapshot of the referenced prompt. Present only when
    /// `kind == EventKind::Prompt`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt: Option<Prompt>,
}

/// Append-only, in-memory event sequence scoped to one job.
///
/// `append` is the single mutation point; readers either see a fully
/// appended event or none of it. Events are never removed while the job is
/// alive, so any cursor can be replayed at any time.
pub struct EventLog {
    events: RwLock<Vec<Arc<Event>>>,
}

impl EventLog {
    pub fn new() -> Self {
        Self {
            events: RwLock::new(Vec::new()),
        }
    }

    /// Append an event and return its sequence index.
    pub async fn append(
        &self,
        kind: EventKind,
        description: Option<String>,
        prompt: Option<Prompt>,
    ) -> u64 {
        let mut events = self.events.write().await;
        let index = events.len() as u64;
        events.push(Arc::new(Event {
            index,
            kind,
            description,
            prompt,
        }));
        index
    }

    /// Return every event with `index > cursor`, in ascending order.
    ///
    /// A cursor of `-1` replays the full log. Cursors come from untrusted
    /// clients, so the full `i64` range must be safe here.
    pub async fn since(&self, cursor: i64) -> Vec<Arc<Event>> {
        let events = self.events.read().await;
        let start = cursor.saturating_add(1).max(0) as usize;
        events.get(start..).unwrap_or_default().to_vec()
    }
}

impl Default for EventLog {
    fn default() -> Self {
        Self::new()
    }
}
