//! tfrestore core
//!
//! Restores Terraform-managed infrastructure to a previously recorded state
//! after a control-plane migration. Given a resource descriptor (provider
//! config, secret reference, persisted state blob) the [`Restorer`] re-applies
//! the rendered Terraform configuration with the prior state injected, and
//! returns a fresh status and state for the caller to persist.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │               tfrestore CLI / caller             │
//! └─────────────────┬───────────────────────────────┘
//!                   │ ResourceDescriptor
//! ┌─────────────────▼───────────────────────────────┐
//! │                tfrestore-core                    │
//! │  ┌──────────────────────────────────────────┐   │
//! │  │     Restorer (phase state machine)        │   │
//! │  └──────────────────────────────────────────┘   │
//! │  ┌──────────┐ ┌──────────┐ ┌──────────────┐     │
//! │  │ context  │ │  state   │ │    status    │     │
//! │  └──────────┘ └──────────┘ └──────────────┘     │
//! └───────┬───────────┬───────────────┬─────────────┘
//!         │           │               │
//! ┌───────▼──────┐ ┌──▼───────────┐ ┌─▼──────────────┐
//! │  secret      │ │  chart       │ │  terraform     │
//! │  resolvers   │ │  renderer    │ │  driver        │
//! └──────────────┘ └──────────────┘ └────────────────┘
//! ```

pub mod context;
pub mod decode;
pub mod error;
pub mod model;
pub mod provider;
pub mod restore;
pub mod state;
pub mod status;

// Re-exports
pub use context::{EnvVars, TemplateContext};
pub use decode::SerdeConfigDecoder;
pub use error::{
    ApplyError, BoxError, Cancelled, CredentialError, DecodeError, ErrorKind, RenderError,
    RestoreError, StatusError,
};
pub use model::{
    Credentials, InfrastructureConfig, Networks, RenderedBundle, ResourceDescriptor, ResourceId,
    SecretRef, VpcConfig, Workspace, Zone,
};
pub use provider::{
    ApplyOutput, ApplyRequest, ConfigDecoder, CredentialResolver, EngineOutputs,
    ProvisioningDriver, TemplateRenderer,
};
pub use restore::{Rendered, RestoreOptions, RestoreOutcome, RestorePhase, Restorer};
pub use state::RawState;
pub use status::InfrastructureStatus;
pub use tokio_util::sync::CancellationToken;
