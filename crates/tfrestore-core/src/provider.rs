//! Collaborator traits used by the restore pipeline
//!
//! The orchestrator only talks to these traits. Concrete implementations live
//! in `tfrestore-secret`, `tfrestore-chart` and `tfrestore-terraform`; the
//! config decoder ships with this crate in [`crate::decode`].

use crate::context::{EnvVars, TemplateContext};
use crate::error::{ApplyError, CredentialError, DecodeError, RenderError};
use crate::model::{Credentials, InfrastructureConfig, RenderedBundle, SecretRef, Workspace};
use crate::state::RawState;
use async_trait::async_trait;
use std::collections::BTreeMap;

/// Engine output variables, flattened to `name -> value`
pub type EngineOutputs = BTreeMap<String, serde_json::Value>;

/// Resolves provider credentials from a secret store
#[async_trait]
pub trait CredentialResolver: Send + Sync {
    async fn resolve(&self, secret_ref: &SecretRef) -> Result<Credentials, CredentialError>;
}

/// Decodes the opaque provider config carried on the resource
pub trait ConfigDecoder: Send + Sync {
    fn decode(&self, raw: &[u8]) -> Result<InfrastructureConfig, DecodeError>;
}

/// Renders a chart into Terraform files
pub trait TemplateRenderer: Send + Sync {
    fn render(
        &self,
        chart: &str,
        namespace: &str,
        context: &TemplateContext,
    ) -> Result<RenderedBundle, RenderError>;
}

/// Input to one apply
#[derive(Debug, Clone)]
pub struct ApplyRequest {
    pub bundle: RenderedBundle,
    /// Starting point for the engine's state store
    pub prior_state: RawState,
    pub env: EnvVars,
}

/// Result of a successful apply
#[derive(Debug, Clone, Default)]
pub struct ApplyOutput {
    pub outputs: EngineOutputs,
    pub state: RawState,
}

/// Drives the provisioning engine
///
/// `apply` must be idempotent: the same bundle and prior state converge to
/// the same resources and outputs. It never retries internally.
#[async_trait]
pub trait ProvisioningDriver: Send + Sync {
    /// Engine name for logs (e.g. "terraform")
    fn name(&self) -> &str;

    async fn apply(
        &self,
        workspace: &Workspace,
        request: &ApplyRequest,
    ) -> Result<ApplyOutput, ApplyError>;
}
