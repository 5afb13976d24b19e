//! Resource descriptor and provider configuration types

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

/// Main Terraform configuration file of a rendered chart
pub const MAIN_TF: &str = "main.tf";
/// Variable declarations file of a rendered chart
pub const VARIABLES_TF: &str = "variables.tf";
/// Variable values file of a rendered chart
pub const TERRAFORM_TFVARS: &str = "terraform.tfvars";

/// Files every rendered bundle must contain
pub const REQUIRED_FILES: [&str; 3] = [MAIN_TF, VARIABLES_TF, TERRAFORM_TFVARS];

/// Identity of the resource being restored
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceId {
    pub namespace: String,
    pub name: String,
}

impl ResourceId {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// Reference to the secret holding provider credentials
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretRef {
    pub namespace: String,
    pub name: String,
}

impl SecretRef {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for SecretRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// Everything the caller hands to a restore
#[derive(Debug, Clone)]
pub struct ResourceDescriptor {
    pub id: ResourceId,
    /// Opaque provider configuration (YAML or JSON)
    pub provider_config: Vec<u8>,
    pub secret_ref: SecretRef,
    /// Previously persisted state blob, `None` before the first apply
    pub state: Option<Vec<u8>>,
}

impl ResourceDescriptor {
    pub fn new(id: ResourceId, provider_config: impl Into<Vec<u8>>, secret_ref: SecretRef) -> Self {
        Self {
            id,
            provider_config: provider_config.into(),
            secret_ref,
            state: None,
        }
    }

    pub fn with_state(mut self, state: impl Into<Vec<u8>>) -> Self {
        self.state = Some(state.into());
        self
    }
}

/// Secret material resolved for one restore
///
/// Values never appear in `Debug` output.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    values: BTreeMap<String, String>,
}

impl Credentials {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// Key names in sorted order
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.values.keys().map(|k| (k, "<redacted>")))
            .finish()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Credentials {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            values: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

/// API version accepted for [`InfrastructureConfig`]
pub const INFRASTRUCTURE_CONFIG_API_VERSION: &str = "aws.provider.extensions.gardener.cloud/v1alpha1";
/// Kind accepted for [`InfrastructureConfig`]
pub const INFRASTRUCTURE_CONFIG_KIND: &str = "InfrastructureConfig";

/// Desired network layout of the infrastructure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InfrastructureConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_version: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,

    pub region: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ssh_public_key: Option<String>,

    #[serde(default)]
    pub networks: Networks,
}

impl InfrastructureConfig {
    pub fn new(region: impl Into<String>) -> Self {
        Self {
            api_version: None,
            kind: None,
            region: region.into(),
            ssh_public_key: None,
            networks: Networks::default(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Networks {
    #[serde(default)]
    pub vpc: VpcConfig,

    #[serde(default)]
    pub zones: Vec<Zone>,
}

/// Either an existing VPC (`id`) or a VPC to create (`cidr`)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VpcConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cidr: Option<String>,

    /// Internet gateway of an existing VPC
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gateway_id: Option<String>,
}

/// Subnet CIDRs of one availability zone
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Zone {
    pub name: String,
    pub internal: String,
    pub public: String,
    pub workers: String,
}

/// Rendered Terraform files keyed by file name
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderedBundle {
    files: BTreeMap<String, String>,
}

impl RenderedBundle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(mut self, name: impl Into<String>, content: impl Into<String>) -> Self {
        self.insert(name, content);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, content: impl Into<String>) {
        self.files.insert(name.into(), content.into());
    }

    pub fn file_content(&self, name: &str) -> Option<&str> {
        self.files.get(name).map(String::as_str)
    }

    pub fn files(&self) -> impl Iterator<Item = (&str, &str)> {
        self.files.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn file_names(&self) -> impl Iterator<Item = &str> {
        self.files.keys().map(String::as_str)
    }

    /// First required file absent from the bundle, if any
    pub fn missing_required_file(&self) -> Option<&'static str> {
        REQUIRED_FILES
            .into_iter()
            .find(|name| !self.files.contains_key(*name))
    }

    /// Hex SHA-256 over file names and contents in name order
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        for (name, content) in &self.files {
            hasher.update((name.len() as u64).to_be_bytes());
            hasher.update(name.as_bytes());
            hasher.update((content.len() as u64).to_be_bytes());
            hasher.update(content.as_bytes());
        }
        hasher
            .finalize()
            .iter()
            .map(|b| format!("{:02x}", b))
            .collect()
    }
}

/// Working directory handed to the provisioning driver
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Workspace {
    root: PathBuf,
}

impl Workspace {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// `<base>/<namespace>/<name>/<purpose>`
    pub fn for_resource(base: &Path, purpose: &str, id: &ResourceId) -> Self {
        Self::new(base.join(&id.namespace).join(&id.name).join(purpose))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path(&self, file: &str) -> PathBuf {
        self.root.join(file)
    }
}
