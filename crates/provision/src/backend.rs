//! The cloud boundary.
//!
//! Everything that actually talks to an infrastructure provider sits behind
//! [`CloudBackend`]. The provisioning worker only sees launched instances
//! and whatever terminal metadata the backend could assign.

use std::fmt::Write as _;

use async_trait::async_trait;

use crate::credentials::Credentials;
use crate::launch::LaunchSpec;

/// What a backend hands back after instances are up.
#[derive(Debug, Clone)]
pub struct LaunchedCluster {
    /// One address per launched instance.
    pub instance_addresses: Vec<String>,
    /// Domain assigned by the backend, if it manages DNS. When `None` the
    /// worker prompts the operator for one.
    pub domain: Option<String>,
    pub dashboard_login_token: Option<String>,
    /// Cluster CA certificate, PEM.
    pub ca_cert: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    /// The provider rejected the request (bad credentials, quota, ...).
    #[error("Launch rejected: {0}")]
    Rejected(String),

    /// The provider could not be reached.
    #[error("Cloud provider unavailable: {0}")]
    Unavailable(String),
}

/// Launches compute instances for a cluster. Implementations are expected
/// to be slow and fallible; they are always called from the worker task,
/// never from a request handler.
#[async_trait]
pub trait CloudBackend: Send + Sync {
    /// Short human-readable name, used in status messages.
    fn name(&self) -> &str;

    async fn launch_instances(
        &self,
        spec: &LaunchSpec,
        credentials: &Credentials,
        public_key: &str,
    ) -> Result<LaunchedCluster, BackendError>;
}

/// Development backend: hands out loopback-adjacent addresses and a random
/// login token without touching any provider. Never assigns a domain, so
/// runs against it always exercise the domain prompt.
pub struct DevBackend;

#[async_trait]
impl CloudBackend for DevBackend {
    fn name(&self) -> &str {
        "dev"
    }

    async fn launch_instances(
        &self,
        spec: &LaunchSpec,
        _credentials: &Credentials,
        _public_key: &str,
    ) -> Result<LaunchedCluster, BackendError> {
        let instance_addresses = (1..=spec.num_instances)
            .map(|i| format!("10.42.0.{i}"))
            .collect();

        Ok(LaunchedCluster {
            instance_addresses,
            domain: None,
            dashboard_login_token: Some(random_token()),
            ca_cert: None,
        })
    }
}

fn random_token() -> String {
    let bytes: [u8; 16] = rand::random();
    let mut token = String::with_capacity(32);
    for byte in bytes {
        let _ = write!(token, "{byte:02x}");
    }
    token
}
