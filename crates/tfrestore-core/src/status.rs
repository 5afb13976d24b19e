//! Provider status derived from Terraform outputs

use crate::error::StatusError;
use crate::model::InfrastructureConfig;
use crate::provider::EngineOutputs;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// Terraform output names the chart is expected to declare
#[derive(Debug, Clone, Copy)]
pub struct OutputKeys {
    pub vpc_id: &'static str,
    pub subnets_public_prefix: &'static str,
    pub subnets_nodes_prefix: &'static str,
    pub security_groups_nodes: &'static str,
    pub ssh_key_name: &'static str,
    pub iam_instance_profile_nodes: &'static str,
    pub nodes_role: &'static str,
}

pub const OUTPUT_KEYS: OutputKeys = OutputKeys {
    vpc_id: "vpcId",
    subnets_public_prefix: "subnetPublicUtilityZ",
    subnets_nodes_prefix: "subnetNodesZ",
    security_groups_nodes: "securityGroupNodes",
    ssh_key_name: "keyName",
    iam_instance_profile_nodes: "iamInstanceProfileNodes",
    nodes_role: "nodesRoleArn",
};

impl OutputKeys {
    pub fn to_json(&self) -> Value {
        json!({
            "vpcId": self.vpc_id,
            "subnetsPublicPrefix": self.subnets_public_prefix,
            "subnetsNodesPrefix": self.subnets_nodes_prefix,
            "securityGroupsNodes": self.security_groups_nodes,
            "sshKeyName": self.ssh_key_name,
            "iamInstanceProfileNodes": self.iam_instance_profile_nodes,
            "nodesRole": self.nodes_role,
        })
    }
}

pub const PURPOSE_PUBLIC: &str = "public";
pub const PURPOSE_NODES: &str = "nodes";

/// Normalized status written back to the resource after a restore
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InfrastructureStatus {
    pub vpc: VpcStatus,
    #[serde(default)]
    pub ec2: Ec2Status,
    #[serde(default)]
    pub iam: IamStatus,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VpcStatus {
    pub id: String,
    #[serde(default)]
    pub subnets: Vec<Subnet>,
    #[serde(default)]
    pub security_groups: Vec<SecurityGroup>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subnet {
    pub purpose: String,
    pub id: String,
    pub zone: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityGroup {
    pub purpose: String,
    pub id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ec2Status {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IamStatus {
    #[serde(default)]
    pub instance_profiles: Vec<InstanceProfile>,
    #[serde(default)]
    pub roles: Vec<Role>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceProfile {
    pub purpose: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub purpose: String,
    pub arn: String,
}

/// Map engine outputs onto [`InfrastructureStatus`]
///
/// Zone-indexed subnet outputs (`<prefix><index>`) resolve their zone name
/// through `config.networks.zones`.
pub fn extract(
    config: &InfrastructureConfig,
    outputs: &EngineOutputs,
) -> Result<InfrastructureStatus, StatusError> {
    let keys = OUTPUT_KEYS;

    let vpc_id = string_output(outputs, keys.vpc_id)?
        .ok_or_else(|| StatusError::MissingOutput(keys.vpc_id.to_string()))?;

    let mut subnets = Vec::new();
    for (key, value) in outputs {
        let (purpose, index) = if let Some(index) = key.strip_prefix(keys.subnets_public_prefix) {
            (PURPOSE_PUBLIC, index)
        } else if let Some(index) = key.strip_prefix(keys.subnets_nodes_prefix) {
            (PURPOSE_NODES, index)
        } else {
            continue;
        };

        let index: usize = index.parse().map_err(|_| StatusError::InvalidOutput {
            key: key.clone(),
            message: format!("'{}' is not a zone index", index),
        })?;
        let zone = config
            .networks
            .zones
            .get(index)
            .ok_or_else(|| StatusError::InvalidOutput {
                key: key.clone(),
                message: format!(
                    "zone index {} out of range ({} zones configured)",
                    index,
                    config.networks.zones.len()
                ),
            })?;

        subnets.push((
            index,
            Subnet {
                purpose: purpose.to_string(),
                id: as_string(key, value)?,
                zone: zone.name.clone(),
            },
        ));
    }
    // public before nodes within a zone
    subnets.sort_by(|(a_idx, a), (b_idx, b)| {
        a_idx
            .cmp(b_idx)
            .then_with(|| (a.purpose != PURPOSE_PUBLIC).cmp(&(b.purpose != PURPOSE_PUBLIC)))
    });

    let security_groups = string_output(outputs, keys.security_groups_nodes)?
        .map(|id| {
            vec![SecurityGroup {
                purpose: PURPOSE_NODES.to_string(),
                id,
            }]
        })
        .unwrap_or_default();

    let instance_profiles = string_output(outputs, keys.iam_instance_profile_nodes)?
        .map(|name| {
            vec![InstanceProfile {
                purpose: PURPOSE_NODES.to_string(),
                name,
            }]
        })
        .unwrap_or_default();

    let roles = string_output(outputs, keys.nodes_role)?
        .map(|arn| {
            vec![Role {
                purpose: PURPOSE_NODES.to_string(),
                arn,
            }]
        })
        .unwrap_or_default();

    Ok(InfrastructureStatus {
        vpc: VpcStatus {
            id: vpc_id,
            subnets: subnets.into_iter().map(|(_, s)| s).collect(),
            security_groups,
        },
        ec2: Ec2Status {
            key_name: string_output(outputs, keys.ssh_key_name)?,
        },
        iam: IamStatus {
            instance_profiles,
            roles,
        },
    })
}

fn string_output(outputs: &EngineOutputs, key: &str) -> Result<Option<String>, StatusError> {
    outputs.get(key).map(|v| as_string(key, v)).transpose()
}

fn as_string(key: &str, value: &Value) -> Result<String, StatusError> {
    match value {
        Value::String(s) if !s.is_empty() => Ok(s.clone()),
        Value::String(_) => Err(StatusError::InvalidOutput {
            key: key.to_string(),
            message: "empty string".to_string(),
        }),
        other => Err(StatusError::InvalidOutput {
            key: key.to_string(),
            message: format!("expected a string, got {}", other),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Zone;

    fn zone(name: &str) -> Zone {
        Zone {
            name: name.to_string(),
            internal: String::new(),
            public: String::new(),
            workers: String::new(),
        }
    }

    fn outputs(pairs: &[(&str, Value)]) -> EngineOutputs {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_extract_vpc_only() {
        let status = extract(
            &InfrastructureConfig::new("eu-1"),
            &outputs(&[("vpcId", json!("vpc-123"))]),
        )
        .unwrap();

        assert_eq!(status.vpc.id, "vpc-123");
        assert!(status.vpc.subnets.is_empty());
        assert!(status.ec2.key_name.is_none());
    }

    #[test]
    fn test_extract_full_outputs() {
        let mut config = InfrastructureConfig::new("eu-west-1");
        config.networks.zones = vec![zone("eu-west-1a"), zone("eu-west-1b")];

        let status = extract(
            &config,
            &outputs(&[
                ("vpcId", json!("vpc-1")),
                ("subnetNodesZ1", json!("subnet-n1")),
                ("subnetPublicUtilityZ1", json!("subnet-p1")),
                ("subnetNodesZ0", json!("subnet-n0")),
                ("subnetPublicUtilityZ0", json!("subnet-p0")),
                ("securityGroupNodes", json!("sg-1")),
                ("keyName", json!("shoot-key")),
                ("iamInstanceProfileNodes", json!("shoot-nodes")),
                ("nodesRoleArn", json!("arn:aws:iam::1:role/nodes")),
                ("unrelated", json!(42)),
            ]),
        )
        .unwrap();

        let subnets: Vec<_> = status
            .vpc
            .subnets
            .iter()
            .map(|s| (s.id.as_str(), s.purpose.as_str(), s.zone.as_str()))
            .collect();
        assert_eq!(
            subnets,
            vec![
                ("subnet-p0", "public", "eu-west-1a"),
                ("subnet-n0", "nodes", "eu-west-1a"),
                ("subnet-p1", "public", "eu-west-1b"),
                ("subnet-n1", "nodes", "eu-west-1b"),
            ]
        );
        assert_eq!(status.vpc.security_groups[0].id, "sg-1");
        assert_eq!(status.ec2.key_name.as_deref(), Some("shoot-key"));
        assert_eq!(status.iam.instance_profiles[0].name, "shoot-nodes");
        assert_eq!(status.iam.roles[0].arn, "arn:aws:iam::1:role/nodes");
    }

    #[test]
    fn test_extract_missing_vpc_id() {
        let err = extract(&InfrastructureConfig::new("eu-1"), &EngineOutputs::new()).unwrap_err();
        assert!(matches!(err, StatusError::MissingOutput(key) if key == "vpcId"));
    }

    #[test]
    fn test_extract_rejects_non_string() {
        let err = extract(
            &InfrastructureConfig::new("eu-1"),
            &outputs(&[("vpcId", json!(["vpc-1"]))]),
        )
        .unwrap_err();
        assert!(matches!(err, StatusError::InvalidOutput { key, .. } if key == "vpcId"));
    }

    #[test]
    fn test_extract_rejects_unknown_zone() {
        let err = extract(
            &InfrastructureConfig::new("eu-1"),
            &outputs(&[
                ("vpcId", json!("vpc-1")),
                ("subnetNodesZ3", json!("subnet-x")),
            ]),
        )
        .unwrap_err();
        assert!(matches!(err, StatusError::InvalidOutput { key, .. } if key == "subnetNodesZ3"));
    }

    #[test]
    fn test_status_serializes_camel_case() {
        let status = InfrastructureStatus {
            vpc: VpcStatus {
                id: "vpc-1".to_string(),
                subnets: vec![],
                security_groups: vec![],
            },
            ec2: Ec2Status {
                key_name: Some("k".to_string()),
            },
            iam: IamStatus::default(),
        };
        let value = serde_json::to_value(&status).unwrap();
        assert_eq!(value["vpc"]["securityGroups"], json!([]));
        assert_eq!(value["ec2"]["keyName"], json!("k"));
        assert_eq!(value["iam"]["instanceProfiles"], json!([]));
    }
}
