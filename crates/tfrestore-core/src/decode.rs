//! Provider config decoding

use crate::error::DecodeError;
use crate::model::{INFRASTRUCTURE_CONFIG_API_VERSION, INFRASTRUCTURE_CONFIG_KIND, InfrastructureConfig};
use crate::provider::ConfigDecoder;
use std::collections::HashSet;

/// Decodes YAML or JSON provider configs and validates them
#[derive(Debug, Clone, Default)]
pub struct SerdeConfigDecoder;

impl SerdeConfigDecoder {
    pub fn new() -> Self {
        Self
    }
}

impl ConfigDecoder for SerdeConfigDecoder {
    fn decode(&self, raw: &[u8]) -> Result<InfrastructureConfig, DecodeError> {
        // YAML is a superset of JSON, so one parser covers both.
        let config: InfrastructureConfig =
            serde_yaml::from_slice(raw).map_err(|e| DecodeError::Syntax(e.to_string()))?;

        check_type_meta(&config)?;
        validate(&config)?;
        Ok(config)
    }
}

fn check_type_meta(config: &InfrastructureConfig) -> Result<(), DecodeError> {
    let api_version = config.api_version.as_deref();
    let kind = config.kind.as_deref();

    let version_ok = api_version.is_none_or(|v| v == INFRASTRUCTURE_CONFIG_API_VERSION);
    let kind_ok = kind.is_none_or(|k| k == INFRASTRUCTURE_CONFIG_KIND);

    if version_ok && kind_ok {
        Ok(())
    } else {
        Err(DecodeError::UnsupportedType {
            api_version: api_version.unwrap_or_default().to_string(),
            kind: kind.unwrap_or_default().to_string(),
        })
    }
}

fn validate(config: &InfrastructureConfig) -> Result<(), DecodeError> {
    if config.region.trim().is_empty() {
        return Err(DecodeError::Invalid("region must not be empty".to_string()));
    }

    let vpc = &config.networks.vpc;
    if vpc.id.is_some() && vpc.cidr.is_some() {
        return Err(DecodeError::Invalid(
            "networks.vpc.id and networks.vpc.cidr are mutually exclusive".to_string(),
        ));
    }

    let mut seen = HashSet::new();
    for zone in &config.networks.zones {
        if zone.name.trim().is_empty() {
            return Err(DecodeError::Invalid("zone name must not be empty".to_string()));
        }
        if !seen.insert(zone.name.as_str()) {
            return Err(DecodeError::Invalid(format!("duplicate zone: {}", zone.name)));
        }
    }

    Ok(())
}
