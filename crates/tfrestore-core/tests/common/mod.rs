use async_trait::async_trait;
use serde_json::json;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use tfrestore_core::context::TemplateContext;
use tfrestore_core::model::{MAIN_TF, TERRAFORM_TFVARS, VARIABLES_TF};
use tfrestore_core::{
    ApplyError, ApplyOutput, ApplyRequest, CancellationToken, CredentialError, CredentialResolver, Credentials,
    EngineOutputs, ProvisioningDriver, RawState, RenderError, RenderedBundle, ResourceDescriptor,
    ResourceId, SecretRef, TemplateRenderer, Workspace,
};

pub fn descriptor(config: &str) -> ResourceDescriptor {
    ResourceDescriptor::new(
        ResourceId::new("shoot--dev--a", "infra"),
        config.as_bytes().to_vec(),
        SecretRef::new("shoot--dev--a", "cloudprovider"),
    )
}

/// Resolver returning fixed credentials or a not-found error
pub struct StaticCredentials {
    credentials: Option<Credentials>,
    /// Cancelled while resolving, as a Ctrl-C mid-restore would
    cancel: Option<CancellationToken>,
    pub calls: AtomicUsize,
}

impl StaticCredentials {
    pub fn ok(credentials: Credentials) -> Self {
        Self {
            credentials: Some(credentials),
            cancel: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn missing() -> Self {
        Self {
            credentials: None,
            cancel: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn cancelling(credentials: Credentials, cancel: CancellationToken) -> Self {
        Self {
            cancel: Some(cancel),
            ..Self::ok(credentials)
        }
    }
}

#[async_trait]
impl CredentialResolver for StaticCredentials {
    async fn resolve(&self, secret_ref: &SecretRef) -> Result<Credentials, CredentialError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(cancel) = &self.cancel {
            cancel.cancel();
        }
        self.credentials
            .clone()
            .ok_or_else(|| CredentialError::NotFound(secret_ref.to_string()))
    }
}

/// Renderer producing files straight from the context
pub struct ContextRenderer {
    omit: Option<&'static str>,
    pub calls: AtomicUsize,
}

impl ContextRenderer {
    pub fn new() -> Self {
        Self {
            omit: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn omitting(file: &'static str) -> Self {
        Self {
            omit: Some(file),
            calls: AtomicUsize::new(0),
        }
    }
}

impl TemplateRenderer for ContextRenderer {
    fn render(
        &self,
        chart: &str,
        namespace: &str,
        context: &TemplateContext,
    ) -> Result<RenderedBundle, RenderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut bundle = RenderedBundle::new();
        let files = [
            (
                MAIN_TF,
                format!("# {} in {}\nprovider \"aws\" {{ region = var.region }}", chart, namespace),
            ),
            (VARIABLES_TF, "variable \"region\" {}".to_string()),
            (
                TERRAFORM_TFVARS,
                format!("region = {}", context["region"]),
            ),
        ];
        for (name, content) in files {
            if Some(name) != self.omit {
                bundle.insert(name, content);
            }
        }
        Ok(bundle)
    }
}

pub enum DriverBehavior {
    Succeed(EngineOutputs),
    Fail,
    /// Fails the first apply, succeeds afterwards
    FailOnce(EngineOutputs),
    /// Succeeds with outputs but hands back no state
    ReturnEmptyState(EngineOutputs),
    Hang,
}

/// Driver that records every request and acts per [`DriverBehavior`]
pub struct RecordingDriver {
    behavior: DriverBehavior,
    pub requests: Mutex<Vec<ApplyRequest>>,
}

impl RecordingDriver {
    pub fn new(behavior: DriverBehavior) -> Self {
        Self {
            behavior,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn succeeding_with_vpc(vpc_id: &str) -> Self {
        Self::new(DriverBehavior::Succeed(vpc_outputs(vpc_id)))
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn last_request(&self) -> ApplyRequest {
        self.requests.lock().unwrap().last().cloned().unwrap()
    }
}

#[async_trait]
impl ProvisioningDriver for RecordingDriver {
    fn name(&self) -> &str {
        "recording"
    }

    async fn apply(
        &self,
        _workspace: &Workspace,
        request: &ApplyRequest,
    ) -> Result<ApplyOutput, ApplyError> {
        let call = {
            let mut requests = self.requests.lock().unwrap();
            requests.push(request.clone());
            requests.len()
        };

        match &self.behavior {
            DriverBehavior::FailOnce(_) if call == 1 => Err(failed_apply()),
            DriverBehavior::Succeed(outputs) | DriverBehavior::FailOnce(outputs) => {
                // Deterministic for a given bundle and prior state
                let state = json!({
                    "version": 4,
                    "lineage": request.bundle.fingerprint(),
                    "prior_bytes": request.prior_state.len(),
                });
                Ok(ApplyOutput {
                    outputs: outputs.clone(),
                    state: RawState::from_bytes(state.to_string().into_bytes()),
                })
            }
            DriverBehavior::Fail => Err(failed_apply()),
            DriverBehavior::ReturnEmptyState(outputs) => Ok(ApplyOutput {
                outputs: outputs.clone(),
                state: RawState::empty(),
            }),
            DriverBehavior::Hang => {
                std::future::pending::<()>().await;
                unreachable!()
            }
        }
    }
}

pub fn vpc_outputs(vpc_id: &str) -> EngineOutputs {
    let mut outputs = EngineOutputs::new();
    outputs.insert("vpcId".to_string(), json!(vpc_id));
    outputs
}

fn failed_apply() -> ApplyError {
    ApplyError::CommandFailed {
        command: "terraform apply".to_string(),
        stderr: "Error: RequestLimitExceeded".to_string(),
    }
}
