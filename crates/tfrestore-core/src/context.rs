//! Template context and Terraform variables environment
//!
//! The context is the variable set handed to the chart renderer. Keys:
//!
//! - `namespace`, `name`: resource identity
//! - `clusterName`: naming prefix for cloud resources (the namespace)
//! - `region`, `sshPublicKey`
//! - `create.vpc`: whether Terraform owns the VPC
//! - `vpc.id`, `vpc.cidr`, `vpc.dhcpDomainName`, `vpc.internetGatewayId`
//! - `zones[]`: `name`, `internal`, `public`, `workers`
//! - `outputKeys`: output names read back by [`crate::status::extract`]
//! - `credentialKeys`: names of the resolved credential keys

use crate::model::{Credentials, InfrastructureConfig, ResourceId};
use crate::status::OUTPUT_KEYS;
use heck::ToShoutySnakeCase;
use serde_json::{Value, json};
use std::collections::BTreeMap;

/// Variable set consumed by the renderer, ordered by key
pub type TemplateContext = BTreeMap<String, Value>;

/// Environment variables handed to the provisioning engine
pub type EnvVars = BTreeMap<String, String>;

const VPC_RESOURCE_ID: &str = "aws_vpc.vpc.id";
const IGW_RESOURCE_ID: &str = "aws_internet_gateway.igw.id";
const IGW_DATA_SOURCE_ID: &str = "data.aws_internet_gateway.default.internet_gateway_id";

/// Build the template context for one resource
pub fn build(
    id: &ResourceId,
    config: &InfrastructureConfig,
    credentials: &Credentials,
) -> TemplateContext {
    let vpc = &config.networks.vpc;

    let (create_vpc, vpc_id, vpc_cidr, gateway_id) = match &vpc.id {
        Some(existing) => (
            false,
            quote(existing),
            String::new(),
            vpc.gateway_id
                .as_deref()
                .map(quote)
                .unwrap_or_else(|| IGW_DATA_SOURCE_ID.to_string()),
        ),
        None => (
            true,
            VPC_RESOURCE_ID.to_string(),
            vpc.cidr.clone().unwrap_or_default(),
            IGW_RESOURCE_ID.to_string(),
        ),
    };

    let zones: Vec<Value> = config
        .networks
        .zones
        .iter()
        .map(|zone| {
            json!({
                "name": zone.name,
                "internal": zone.internal,
                "public": zone.public,
                "workers": zone.workers,
            })
        })
        .collect();

    let mut context = TemplateContext::new();
    context.insert("namespace".into(), json!(id.namespace));
    context.insert("name".into(), json!(id.name));
    context.insert("clusterName".into(), json!(id.namespace));
    context.insert("region".into(), json!(config.region));
    context.insert(
        "sshPublicKey".into(),
        json!(config.ssh_public_key.as_deref().unwrap_or_default()),
    );
    context.insert("create".into(), json!({ "vpc": create_vpc }));
    context.insert(
        "vpc".into(),
        json!({
            "id": vpc_id,
            "cidr": vpc_cidr,
            "dhcpDomainName": dhcp_domain_name(&config.region),
            "internetGatewayId": gateway_id,
        }),
    );
    context.insert("zones".into(), Value::Array(zones));
    context.insert("outputKeys".into(), OUTPUT_KEYS.to_json());
    context.insert(
        "credentialKeys".into(),
        Value::Array(credentials.keys().map(|k| json!(k)).collect()),
    );
    context
}

/// `TF_VAR_*` environment carrying the credentials into Terraform
///
/// `accessKeyID` becomes `TF_VAR_ACCESS_KEY_ID`.
pub fn variables_environment(credentials: &Credentials) -> EnvVars {
    credentials
        .iter()
        .map(|(key, value)| {
            (
                format!("TF_VAR_{}", key.to_shouty_snake_case()),
                value.to_string(),
            )
        })
        .collect()
}

fn dhcp_domain_name(region: &str) -> String {
    if region == "us-east-1" {
        "ec2.internal".to_string()
    } else {
        format!("{}.compute.internal", region)
    }
}

fn quote(s: &str) -> String {
    Value::String(s.to_string()).to_string()
}
