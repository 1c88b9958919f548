//! Launch parameters for a provisioning attempt.

use nimbus_store::KeyMaterial;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::credentials::Credentials;

/// What to provision: the user-visible shape of a launch request.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct LaunchSpec {
    /// Cluster name. Also names the stored SSH key and the job record.
    #[validate(length(min = 1, max = 64))]
    pub name: String,

    #[validate(length(min = 1))]
    pub region: String,

    #[validate(length(min = 1))]
    pub instance_type: String,

    #[validate(range(min = 1, max = 99))]
    pub num_instances: u32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vpc_cidr: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subnet_cidr: Option<String>,
}

/// Everything the worker needs for one run: the spec plus credentials and
/// optional SSH key material. Serialized as the opaque job parameters the
/// session passes to the provisioner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LaunchParams {
    #[serde(flatten)]
    pub spec: LaunchSpec,

    pub credentials: Credentials,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ssh_key: Option<KeyMaterial>,
}

#[cfg(test)]
mod tests {
    use validator::Validate;

    use super::*;

    fn spec() -> LaunchSpec {
        LaunchSpec {
            name: "demo".into(),
            region: "eu-west-1".into(),
            instance_type: "m4.large".into(),
            num_instances: 3,
            vpc_cidr: None,
            subnet_cidr: None,
        }
    }

    #[test]
    fn valid_spec_passes() {
        assert!(spec().validate().is_ok());
    }

    #[test]
    fn zero_instances_is_rejected() {
        let mut s = spec();
        s.num_instances = 0;
        assert!(s.validate().is_err());
    }

    #[test]
    fn empty_name_is_rejected() {
        let mut s = spec();
        s.name = String::new();
        assert!(s.validate().is_err());
    }

    #[test]
    fn params_round_trip_through_json() {
        let params = LaunchParams {
            spec: spec(),
            credentials: Credentials {
                access_key_id: "AKIA123".into(),
                secret_access_key: "secret".into(),
            },
            ssh_key: None,
        };

        let value = serde_json::to_value(&params).unwrap();
        // The spec is flattened into the top level.
        assert_eq!(value["name"], "demo");
        assert_eq!(value["num_instances"], 3);

        let back: LaunchParams = serde_json::from_value(value).unwrap();
        assert_eq!(back.spec.region, "eu-west-1");
    }
}
