//! リソース記述ファイル
//!
//! ```yaml
//! namespace: shoot--dev--a
//! name: infra
//! providerConfig:
//!   region: eu-west-1
//!   networks:
//!     vpc:
//!       cidr: 10.250.0.0/16
//! secretRef:
//!   namespace: shoot--dev--a
//!   name: cloudprovider
//! statePath: infra.tfstate.json
//! ```
//!
//! `statePath` は記述ファイルのディレクトリを基準に解決されます。

use anyhow::Context;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tfrestore_core::{ResourceDescriptor, ResourceId, SecretRef};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct DescriptorFile {
    namespace: String,
    name: String,
    provider_config: serde_yaml::Value,
    secret_ref: SecretRefFile,
    #[serde(default)]
    state_path: Option<PathBuf>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct SecretRefFile {
    namespace: String,
    name: String,
}

/// 記述ファイルを読み込む（`statePath` があればステートも読み込む）
pub fn load(path: &Path) -> anyhow::Result<ResourceDescriptor> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read descriptor {}", path.display()))?;
    let file: DescriptorFile = serde_yaml::from_str(&content)
        .with_context(|| format!("failed to parse descriptor {}", path.display()))?;

    let provider_config = serde_json::to_vec(&file.provider_config)
        .context("providerConfig cannot be represented as JSON")?;

    let mut descriptor = ResourceDescriptor::new(
        ResourceId::new(file.namespace, file.name),
        provider_config,
        SecretRef::new(file.secret_ref.namespace, file.secret_ref.name),
    );

    if let Some(state_path) = file.state_path {
        let state_path = match path.parent() {
            Some(base) if state_path.is_relative() => base.join(state_path),
            _ => state_path,
        };
        let state = std::fs::read(&state_path)
            .with_context(|| format!("failed to read state {}", state_path.display()))?;
        descriptor = descriptor.with_state(state);
    }

    Ok(descriptor)
}
