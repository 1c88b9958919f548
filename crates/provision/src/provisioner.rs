//! The provisioning worker.
//!
//! [`ClusterProvisioner`] implements the generic flow every launch goes
//! through: validate parameters, settle the SSH key question, hand the
//! launch to the cloud backend, then collect the terminal metadata
//! (prompting the operator for a domain when the backend has none).
//! The fatal/non-fatal distinction is made here, not in the core: anything
//! returned as `Err` ends the job.

use std::sync::Arc;

use async_trait::async_trait;
use nimbus_core::{CoreError, JobOutcome, JobSession, Provisioner};
use nimbus_store::{KeyMaterial, KeyStore, StoreError};
use validator::Validate;

use crate::backend::CloudBackend;
use crate::launch::LaunchParams;

pub struct ClusterProvisioner {
    backend: Arc<dyn CloudBackend>,
    keys: KeyStore,
}

impl ClusterProvisioner {
    pub fn new(backend: Arc<dyn CloudBackend>, keys: KeyStore) -> Self {
        Self { backend, keys }
    }

    /// Decide which SSH key this run uses.
    ///
    /// An uploaded key is stored under the cluster name, asking before
    /// replacing an existing one. Without an upload, a stored key may be
    /// reused with the operator's consent; otherwise the run cannot
    /// continue.
    async fn ensure_key(
        &self,
        session: &JobSession,
        params: &LaunchParams,
    ) -> Result<KeyMaterial, CoreError> {
        let name = &params.spec.name;

        match &params.ssh_key {
            Some(key) => {
                if self.keys.exists(name).await {
                    let replace = session
                        .ask_yes_no(format!(
                            "An SSH key named '{name}' is already stored. Replace it with the uploaded key?"
                        ))
                        .await?;
                    if !replace {
                        return self.keys.load(name).await.map_err(store_error);
                    }
                }
                self.keys.save(name, key).await.map_err(store_error)?;
                session.emit_status(format!("Stored SSH key '{name}'")).await;
                Ok(key.clone())
            }
            None => {
                if self.keys.exists(name).await {
                    let reuse = session
                        .ask_yes_no(format!(
                            "No SSH key was uploaded. Reuse the stored key '{name}'?"
                        ))
                        .await?;
                    if reuse {
                        return self.keys.load(name).await.map_err(store_error);
                    }
                }
                Err(CoreError::Validation(format!(
                    "No SSH key available for cluster '{name}'"
                )))
            }
        }
    }
}

#[async_trait]
impl Provisioner for ClusterProvisioner {
    async fn run(
        &self,
        session: Arc<JobSession>,
        params: serde_json::Value,
    ) -> Result<JobOutcome, CoreError> {
        let params: LaunchParams = serde_json::from_value(params)
            .map_err(|e| CoreError::Validation(format!("Invalid launch parameters: {e}")))?;
        params
            .spec
            .validate()
            .map_err(|e| CoreError::Validation(e.to_string()))?;

        let spec = &params.spec;
        tracing::info!(
            job_id = %session.id(),
            cluster = %spec.name,
            backend = %self.backend.name(),
            "Provisioning run started"
        );
        session
            .emit_status(format!(
                "Launching {} {} instance(s) in {}",
                spec.num_instances, spec.instance_type, spec.region
            ))
            .await;

        let key = self.ensure_key(&session, &params).await?;

        session
            .emit_status(format!(
                "Requesting instances from the {} backend",
                self.backend.name()
            ))
            .await;

        let cluster = self
            .backend
            .launch_instances(spec, &params.credentials, &key.public_key)
            .await
            .map_err(|e| CoreError::Internal(e.to_string()))?;

        for address in &cluster.instance_addresses {
            session.emit_status(format!("Instance up at {address}")).await;
        }

        let domain = match cluster.domain {
            Some(domain) => domain,
            None => {
                session
                    .ask_input("Enter the domain name to serve the cluster dashboard from")
                    .await?
            }
        };

        session.emit_status("Provisioning complete").await;

        Ok(JobOutcome {
            domain: Some(domain),
            dashboard_login_token: cluster.dashboard_login_token,
            ca_cert: cluster.ca_cert,
        })
    }
}

fn store_error(e: StoreError) -> CoreError {
    CoreError::Internal(e.to_string())
}
