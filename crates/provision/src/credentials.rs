//! Cloud credential resolution.
//!
//! Credentials come from the launch request when supplied, otherwise from
//! the environment. Having neither is a validation error surfaced before
//! any work starts.

use nimbus_core::CoreError;
use serde::{Deserialize, Serialize};

pub const ENV_ACCESS_KEY_ID: &str = "CLOUD_ACCESS_KEY_ID";
pub const ENV_SECRET_ACCESS_KEY: &str = "CLOUD_SECRET_ACCESS_KEY";

/// A cloud API key pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credentials {
    pub access_key_id: String,
    pub secret_access_key: String,
}

impl Credentials {
    /// Read credentials from the environment, if both halves are set and
    /// non-empty.
    pub fn from_env() -> Option<Self> {
        let access_key_id = std::env::var(ENV_ACCESS_KEY_ID).ok()?;
        let secret_access_key = std::env::var(ENV_SECRET_ACCESS_KEY).ok()?;
        if access_key_id.is_empty() || secret_access_key.is_empty() {
            return None;
        }
        Some(Self {
            access_key_id,
            secret_access_key,
        })
    }

    /// Prefer request-supplied credentials, fall back to the environment.
    pub fn resolve(provided: Option<Credentials>) -> Result<Credentials, CoreError> {
        if let Some(creds) = provided {
            if creds.access_key_id.is_empty() || creds.secret_access_key.is_empty() {
                return Err(CoreError::Validation(
                    "Both access_key_id and secret_access_key must be non-empty".into(),
                ));
            }
            return Ok(creds);
        }

        Self::from_env().ok_or_else(|| {
            CoreError::Validation(format!(
                "No credentials supplied and {ENV_ACCESS_KEY_ID}/{ENV_SECRET_ACCESS_KEY} are not set"
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use nimbus_core::CoreError;

    use super::*;

    #[test]
    fn request_credentials_win() {
        let creds = Credentials::resolve(Some(Credentials {
            access_key_id: "AKIA123".into(),
            secret_access_key: "secret".into(),
        }))
        .unwrap();
        assert_eq!(creds.access_key_id, "AKIA123");
    }

    #[test]
    fn empty_request_credentials_are_rejected() {
        let result = Credentials::resolve(Some(Credentials {
            access_key_id: "AKIA123".into(),
            secret_access_key: String::new(),
        }));
        assert_matches!(result, Err(CoreError::Validation(_)));
    }
}
