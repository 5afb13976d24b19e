//! Restore orchestrator
//!
//! Runs the pipeline
//!
//! ```text
//! ResolvingCredentials -> DecodingConfig -> BuildingContext -> RenderingTemplate
//!   -> DecodingPriorState -> Applying -> ExtractingStatus -> Done
//! ```
//!
//! strictly in order. The first failing phase ends the run. Only an apply
//! failure is retry-hinted; every other failure is fatal.

use crate::context;
use crate::error::{ApplyError, BoxError, Cancelled, ErrorKind, RenderError, RestoreError};
use crate::model::{
    Credentials, InfrastructureConfig, RenderedBundle, ResourceDescriptor, Workspace,
};
use crate::provider::{
    ApplyOutput, ApplyRequest, ConfigDecoder, CredentialResolver, ProvisioningDriver,
    TemplateRenderer,
};
use crate::state::{self, RawState};
use crate::status::{self, InfrastructureStatus};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Delay before the caller should retry after an apply failure
pub const DEFAULT_REQUEUE_AFTER: Duration = Duration::from_secs(30);
/// Chart rendered for infrastructure restores
pub const DEFAULT_CHART: &str = "aws-infra";
/// Workspace purpose for infrastructure restores
pub const PURPOSE_INFRA: &str = "infra";

/// Tunables of the orchestrator
#[derive(Debug, Clone)]
pub struct RestoreOptions {
    pub chart: String,
    pub purpose: String,
    /// Base directory for per-resource workspaces
    pub work_dir: PathBuf,
    pub requeue_after: Duration,
}

impl Default for RestoreOptions {
    fn default() -> Self {
        Self {
            chart: DEFAULT_CHART.to_string(),
            purpose: PURPOSE_INFRA.to_string(),
            work_dir: std::env::temp_dir().join("tfrestore"),
            requeue_after: DEFAULT_REQUEUE_AFTER,
        }
    }
}

/// Pipeline phases, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestorePhase {
    ResolvingCredentials,
    DecodingConfig,
    BuildingContext,
    RenderingTemplate,
    DecodingPriorState,
    Applying,
    ExtractingStatus,
    Done,
}

impl RestorePhase {
    /// Kind reported when this phase fails
    pub fn error_kind(self) -> ErrorKind {
        match self {
            RestorePhase::ResolvingCredentials => ErrorKind::Credential,
            RestorePhase::DecodingConfig | RestorePhase::DecodingPriorState => ErrorKind::Decode,
            RestorePhase::BuildingContext | RestorePhase::RenderingTemplate => ErrorKind::Render,
            RestorePhase::Applying => ErrorKind::Apply,
            RestorePhase::ExtractingStatus | RestorePhase::Done => ErrorKind::StatusExtraction,
        }
    }
}

impl fmt::Display for RestorePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RestorePhase::ResolvingCredentials => "resolving-credentials",
            RestorePhase::DecodingConfig => "decoding-config",
            RestorePhase::BuildingContext => "building-context",
            RestorePhase::RenderingTemplate => "rendering-template",
            RestorePhase::DecodingPriorState => "decoding-prior-state",
            RestorePhase::Applying => "applying",
            RestorePhase::ExtractingStatus => "extracting-status",
            RestorePhase::Done => "done",
        };
        write!(f, "{}", name)
    }
}

/// Successful restore; the caller persists `status` and `state`
#[derive(Debug, Clone)]
pub struct RestoreOutcome {
    pub status: InfrastructureStatus,
    pub state: RawState,
    /// Fingerprint of the bundle that was applied
    pub fingerprint: String,
}

impl RestoreOutcome {
    /// State in its persisted envelope form
    pub fn encoded_state(&self) -> Vec<u8> {
        state::encode(&self.state)
    }
}

/// Output of the phases before apply
#[derive(Debug, Clone)]
pub struct Rendered {
    pub config: InfrastructureConfig,
    pub credentials: Credentials,
    pub bundle: RenderedBundle,
}

/// Sequences the collaborators of one restore
///
/// Holds no per-resource state, so one instance can serve concurrent restores
/// of different resources.
pub struct Restorer {
    credentials: Arc<dyn CredentialResolver>,
    decoder: Arc<dyn ConfigDecoder>,
    renderer: Arc<dyn TemplateRenderer>,
    driver: Arc<dyn ProvisioningDriver>,
    options: RestoreOptions,
}

impl Restorer {
    pub fn new(
        credentials: Arc<dyn CredentialResolver>,
        decoder: Arc<dyn ConfigDecoder>,
        renderer: Arc<dyn TemplateRenderer>,
        driver: Arc<dyn ProvisioningDriver>,
    ) -> Self {
        Self {
            credentials,
            decoder,
            renderer,
            driver,
            options: RestoreOptions::default(),
        }
    }

    pub fn with_options(mut self, options: RestoreOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> &RestoreOptions {
        &self.options
    }

    /// Restore one resource to its recorded state
    #[tracing::instrument(skip_all, fields(resource = %descriptor.id))]
    pub async fn restore(
        &self,
        descriptor: &ResourceDescriptor,
        cancel: &CancellationToken,
    ) -> Result<RestoreOutcome, RestoreError> {
        info!(driver = self.driver.name(), "Starting restore");

        let resource = descriptor.id.to_string();
        let Rendered {
            config,
            credentials,
            bundle,
        } = self.render_phases(descriptor, cancel).await?;

        checkpoint(cancel, RestorePhase::DecodingPriorState, &resource)?;
        let prior_state = state::decode(descriptor.state.as_deref())
            .map_err(|e| fail(RestorePhase::DecodingPriorState, e))?;
        debug!(
            prior_state_bytes = prior_state.len(),
            first_restore = prior_state.is_empty(),
            "Decoded prior state"
        );

        checkpoint(cancel, RestorePhase::Applying, &resource)?;
        let fingerprint = bundle.fingerprint();
        let workspace =
            Workspace::for_resource(&self.options.work_dir, &self.options.purpose, &descriptor.id);
        let request = ApplyRequest {
            bundle,
            prior_state,
            env: context::variables_environment(&credentials),
        };
        let output = self
            .apply(&workspace, &request, cancel, &resource)
            .await?;

        enter(RestorePhase::ExtractingStatus);
        let status = status::extract(&config, &output.outputs)
            .map_err(|e| fail(RestorePhase::ExtractingStatus, e))?;

        enter(RestorePhase::Done);
        info!(
            vpc_id = %status.vpc.id,
            state_bytes = output.state.len(),
            fingerprint = %fingerprint,
            "Restore completed"
        );

        Ok(RestoreOutcome {
            status,
            state: output.state,
            fingerprint,
        })
    }

    /// Run the phases up to rendering, without touching the engine
    #[tracing::instrument(skip_all, fields(resource = %descriptor.id))]
    pub async fn render(&self, descriptor: &ResourceDescriptor) -> Result<Rendered, RestoreError> {
        self.render_phases(descriptor, &CancellationToken::new()).await
    }

    async fn render_phases(
        &self,
        descriptor: &ResourceDescriptor,
        cancel: &CancellationToken,
    ) -> Result<Rendered, RestoreError> {
        let resource = descriptor.id.to_string();

        checkpoint(cancel, RestorePhase::ResolvingCredentials, &resource)?;
        let credentials = self
            .credentials
            .resolve(&descriptor.secret_ref)
            .await
            .map_err(|e| fail(RestorePhase::ResolvingCredentials, e))?;
        debug!(
            secret = %descriptor.secret_ref,
            keys = credentials.len(),
            "Resolved credentials"
        );

        checkpoint(cancel, RestorePhase::DecodingConfig, &resource)?;
        let config = self
            .decoder
            .decode(&descriptor.provider_config)
            .map_err(|e| fail(RestorePhase::DecodingConfig, e))?;

        checkpoint(cancel, RestorePhase::BuildingContext, &resource)?;
        let context = context::build(&descriptor.id, &config, &credentials);

        checkpoint(cancel, RestorePhase::RenderingTemplate, &resource)?;
        let bundle = self
            .renderer
            .render(&self.options.chart, &descriptor.id.namespace, &context)
            .map_err(|e| fail(RestorePhase::RenderingTemplate, e))?;
        if let Some(file) = bundle.missing_required_file() {
            return Err(fail(
                RestorePhase::RenderingTemplate,
                RenderError::MissingFile {
                    chart: self.options.chart.clone(),
                    file: file.to_string(),
                },
            ));
        }
        debug!(fingerprint = %bundle.fingerprint(), "Rendered chart");

        Ok(Rendered {
            config,
            credentials,
            bundle,
        })
    }

    async fn apply(
        &self,
        workspace: &Workspace,
        request: &ApplyRequest,
        cancel: &CancellationToken,
        resource: &str,
    ) -> Result<ApplyOutput, RestoreError> {
        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(cancelled(RestorePhase::Applying, resource)),
            result = self.driver.apply(workspace, request) => result,
        };

        // a successful apply must hand back state to persist
        let result = match result {
            Ok(output) if output.state.is_empty() => Err(ApplyError::StateLost),
            other => other,
        };

        result.map_err(|e| {
            error!(
                error = %e,
                requeue_after_secs = self.options.requeue_after.as_secs(),
                "Failed to apply the terraform config"
            );
            RestoreError::retry_after(self.options.requeue_after, e)
        })
    }
}

fn enter(phase: RestorePhase) {
    debug!(phase = %phase, "Entering phase");
}

/// Enter `phase` unless the restore was cancelled before it
fn checkpoint(
    cancel: &CancellationToken,
    phase: RestorePhase,
    resource: &str,
) -> Result<(), RestoreError> {
    if cancel.is_cancelled() {
        return Err(cancelled(phase, resource));
    }
    enter(phase);
    Ok(())
}

fn fail(phase: RestorePhase, err: impl Into<BoxError>) -> RestoreError {
    let err = RestoreError::fatal(phase.error_kind(), err);
    warn!(phase = %phase, error = %err, "Restore aborted");
    err
}

fn cancelled(phase: RestorePhase, resource: &str) -> RestoreError {
    warn!(phase = %phase, "Restore cancelled");
    RestoreError::fatal(ErrorKind::Cancelled, Cancelled(resource.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_error_kinds() {
        assert_eq!(
            RestorePhase::ResolvingCredentials.error_kind(),
            ErrorKind::Credential
        );
        assert_eq!(RestorePhase::DecodingConfig.error_kind(), ErrorKind::Decode);
        assert_eq!(
            RestorePhase::DecodingPriorState.error_kind(),
            ErrorKind::Decode
        );
        assert_eq!(RestorePhase::RenderingTemplate.error_kind(), ErrorKind::Render);
        assert_eq!(RestorePhase::Applying.error_kind(), ErrorKind::Apply);
        assert_eq!(
            RestorePhase::ExtractingStatus.error_kind(),
            ErrorKind::StatusExtraction
        );
    }

    #[test]
    fn test_default_options() {
        let options = RestoreOptions::default();
        assert_eq!(options.requeue_after, Duration::from_secs(30));
        assert_eq!(options.chart, "aws-infra");
        assert_eq!(options.purpose, "infra");
    }

    #[test]
    fn test_phase_display() {
        assert_eq!(RestorePhase::DecodingPriorState.to_string(), "decoding-prior-state");
    }
}
