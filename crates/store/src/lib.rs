//! On-disk persistence for the nimbus provisioning service.
//!
//! Two stores, both rooted at an explicitly configured data directory (no
//! process-wide defaults): [`JobStore`] keeps job records in a single
//! `data.json`, and [`KeyStore`] keeps SSH key material as PEM files under
//! `keys/`. Event logs are deliberately not persisted; they live and die
//! with the process.

pub mod error;
pub mod keys;
pub mod records;

pub use error::StoreError;
pub use keys::{KeyMaterial, KeyStore};
pub use records::{JobRecord, JobState, JobStore};
