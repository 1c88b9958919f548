//! Provisioning plumbing: launch parameters, cloud credentials, the cloud
//! backend boundary, and the worker that drives a job session through the
//! generic provisioning flow.
//!
//! The actual cloud mechanics live behind the [`CloudBackend`] trait; this
//! crate ships only a development backend. Everything user-visible about a
//! provisioning run (status messages, prompts, terminal metadata) is
//! produced here.

pub mod backend;
pub mod credentials;
pub mod launch;
pub mod provisioner;

pub use backend::{BackendError, CloudBackend, DevBackend, LaunchedCluster};
pub use credentials::Credentials;
pub use launch::{LaunchParams, LaunchSpec};
pub use provisioner::ClusterProvisioner;
