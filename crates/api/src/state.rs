use std::sync::Arc;

use nimbus_core::Provisioner;
use nimbus_store::JobStore;

use crate::config::ServerConfig;
use crate::registry::JobRegistry;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc`).
#[derive(Clone)]
pub struct AppState {
    /// Live job sessions, keyed by job id.
    pub registry: Arc<JobRegistry>,
    /// Durable job records.
    pub store: Arc<JobStore>,
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// The provisioning worker implementation launched jobs run against.
    pub provisioner: Arc<dyn Provisioner>,
}
