//! Terraform provisioning driver
//!
//! One apply:
//!
//! 1. write the bundle into the workspace, dropping stale `.tf`/`.tfvars` files
//! 2. write the prior state to `terraform.tfstate` (or remove a stale one)
//! 3. `terraform init`, `terraform apply`, `terraform output -json`
//! 4. read back `terraform.tfstate`
//!
//! The whole sequence is bounded by the apply timeout.

use crate::command::TerraformCli;
use async_trait::async_trait;
use std::path::Path;
use std::time::Duration;
use tfrestore_core::{
    ApplyError, ApplyOutput, ApplyRequest, ProvisioningDriver, RawState, RenderedBundle,
    Workspace,
};
use tracing::{debug, info, warn};

/// Local state file managed by terraform
pub const STATE_FILE: &str = "terraform.tfstate";
/// Backup terraform writes next to the state file
pub const STATE_BACKUP_FILE: &str = "terraform.tfstate.backup";

/// Default bound for one apply
pub const DEFAULT_APPLY_TIMEOUT: Duration = Duration::from_secs(30 * 60);

const CONFIG_EXTENSIONS: [&str; 2] = ["tf", "tfvars"];

/// Applies rendered bundles with the terraform CLI
#[derive(Debug, Clone)]
pub struct TerraformDriver {
    cli: TerraformCli,
    timeout: Duration,
}

impl TerraformDriver {
    pub fn new(cli: TerraformCli) -> Self {
        Self {
            cli,
            timeout: DEFAULT_APPLY_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn run(
        &self,
        workspace: &Workspace,
        request: &ApplyRequest,
    ) -> Result<ApplyOutput, ApplyError> {
        let dir = workspace.root();
        prepare_workspace(dir, &request.bundle, &request.prior_state).await?;

        info!("Running terraform init");
        self.cli.init(dir, &request.env).await?;

        info!("Running terraform apply");
        let log = self.cli.apply(dir, &request.env).await?;
        debug!(lines = log.lines().count(), "terraform apply finished");

        let outputs = self.cli.output(dir, &request.env).await?;
        let state = read_state(dir).await?;

        Ok(ApplyOutput { outputs, state })
    }
}

impl Default for TerraformDriver {
    fn default() -> Self {
        Self::new(TerraformCli::default())
    }
}

#[async_trait]
impl ProvisioningDriver for TerraformDriver {
    fn name(&self) -> &str {
        "terraform"
    }

    #[tracing::instrument(skip_all, fields(workspace = %workspace.root().display()))]
    async fn apply(
        &self,
        workspace: &Workspace,
        request: &ApplyRequest,
    ) -> Result<ApplyOutput, ApplyError> {
        match tokio::time::timeout(self.timeout, self.run(workspace, request)).await {
            Ok(result) => result,
            Err(_) => {
                warn!(timeout_secs = self.timeout.as_secs(), "terraform timed out");
                Err(ApplyError::Timeout(self.timeout))
            }
        }
    }
}

/// Lay out bundle and prior state in `dir`
async fn prepare_workspace(
    dir: &Path,
    bundle: &RenderedBundle,
    prior_state: &RawState,
) -> Result<(), ApplyError> {
    tokio::fs::create_dir_all(dir).await?;

    let mut entries = tokio::fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let is_config = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| CONFIG_EXTENSIONS.contains(&e));
        let in_bundle = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| bundle.file_content(n).is_some());
        if is_config && !in_bundle && entry.file_type().await?.is_file() {
            debug!(file = %path.display(), "Removing stale file");
            tokio::fs::remove_file(&path).await?;
        }
    }

    for (name, content) in bundle.files() {
        tokio::fs::write(dir.join(name), content).await?;
        debug!(file = %name, bytes = content.len(), "Wrote bundle file");
    }

    let state_path = dir.join(STATE_FILE);
    if prior_state.is_empty() {
        for stale in [STATE_FILE, STATE_BACKUP_FILE] {
            remove_if_exists(&dir.join(stale)).await?;
        }
        debug!("No prior state, starting from scratch");
    } else {
        tokio::fs::write(&state_path, prior_state.as_bytes()).await?;
        debug!(bytes = prior_state.len(), "Wrote prior state");
    }
    Ok(())
}

/// State left by terraform; empty when no state file was written
async fn read_state(dir: &Path) -> Result<RawState, ApplyError> {
    let path = dir.join(STATE_FILE);
    let bytes = match tokio::fs::read(&path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(RawState::empty()),
        Err(e) => return Err(e.into()),
    };

    serde_json::from_slice::<serde_json::Value>(&bytes)
        .map_err(|e| ApplyError::InvalidOutput(format!("{} is not valid JSON: {}", STATE_FILE, e)))?;
    Ok(RawState::from_bytes(bytes))
}

async fn remove_if_exists(path: &Path) -> Result<(), ApplyError> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
#[cfg(unix)]
mod tests {
    use super::*;
    use serde_json::{Value, json};
    use tempfile::TempDir;
    use tfrestore_core::EnvVars;
    use tfrestore_core::model::{MAIN_TF, TERRAFORM_TFVARS, VARIABLES_TF};

    /// Stand-in for terraform, steered through the environment
    const FAKE_TERRAFORM: &str = r#"
case "$1" in
  init)
    [ "$FAKE_TF_FAIL" = init ] && { echo 'Error: Failed to query available provider packages' >&2; exit 1; }
    echo 'Terraform has been successfully initialized!'
    ;;
  apply)
    [ -n "$FAKE_TF_SLEEP" ] && sleep "$FAKE_TF_SLEEP"
    [ "$FAKE_TF_FAIL" = apply ] && { echo 'Error: RequestLimitExceeded' >&2; exit 1; }
    [ -f main.tf ] || { echo 'Error: No configuration files' >&2; exit 1; }
    if [ -f terraform.tfstate ]; then prior=true; else prior=false; fi
    files=$(ls | tr '\n' ' ')
    if [ "$FAKE_TF_STATE" = garbage ]; then
      printf 'not json' > terraform.tfstate
    elif [ "$FAKE_TF_STATE" = none ]; then
      rm -f terraform.tfstate
    else
      printf '{"version":4,"prior":%s,"region":"%s","files":"%s"}' "$prior" "$TF_VAR_REGION" "$files" > terraform.tfstate
    fi
    echo 'Apply complete! Resources: 0 added, 0 changed, 0 destroyed.'
    ;;
  output)
    printf '{"vpcId":{"sensitive":false,"type":"string","value":"vpc-123"}}'
    ;;
esac
"#;

    fn driver() -> TerraformDriver {
        TerraformDriver::new(TerraformCli::new("sh").with_args(["-c", FAKE_TERRAFORM, "terraform"]))
    }

    fn request(prior_state: RawState, extra_env: &[(&str, &str)]) -> ApplyRequest {
        let mut env = EnvVars::new();
        env.insert("TF_VAR_REGION".to_string(), "eu-1".to_string());
        for (key, value) in extra_env {
            env.insert(key.to_string(), value.to_string());
        }
        ApplyRequest {
            bundle: RenderedBundle::new()
                .with_file(MAIN_TF, "# main")
                .with_file(VARIABLES_TF, "variable \"REGION\" {}")
                .with_file(TERRAFORM_TFVARS, ""),
            prior_state,
            env,
        }
    }

    fn state_json(output: &ApplyOutput) -> Value {
        serde_json::from_slice(output.state.as_bytes()).unwrap()
    }

    #[tokio::test]
    async fn test_first_apply() {
        let dir = TempDir::new().unwrap();
        let workspace = Workspace::new(dir.path().join("ns/infra"));

        let output = driver()
            .apply(&workspace, &request(RawState::empty(), &[]))
            .await
            .unwrap();

        assert_eq!(output.outputs["vpcId"], json!("vpc-123"));
        let state = state_json(&output);
        assert_eq!(state["prior"], json!(false));
        assert_eq!(state["region"], json!("eu-1"));
        assert!(workspace.path(MAIN_TF).is_file());
    }

    #[tokio::test]
    async fn test_prior_state_is_written_before_apply() {
        let dir = TempDir::new().unwrap();
        let workspace = Workspace::new(dir.path());
        let prior = RawState::from_bytes(br#"{"version":4,"serial":7}"#.to_vec());

        let output = driver()
            .apply(&workspace, &request(prior, &[]))
            .await
            .unwrap();

        assert_eq!(state_json(&output)["prior"], json!(true));
    }

    #[tokio::test]
    async fn test_stale_state_and_files_are_removed() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(STATE_FILE), "{}").unwrap();
        std::fs::write(dir.path().join(STATE_BACKUP_FILE), "{}").unwrap();
        std::fs::write(dir.path().join("old.tf"), "# removed").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "kept").unwrap();
        let workspace = Workspace::new(dir.path());

        let output = driver()
            .apply(&workspace, &request(RawState::empty(), &[]))
            .await
            .unwrap();

        let state = state_json(&output);
        assert_eq!(state["prior"], json!(false));
        let files = state["files"].as_str().unwrap();
        assert!(!files.contains("old.tf"));
        assert!(!files.contains(STATE_BACKUP_FILE));
        assert!(files.contains("notes.txt"));
    }

    #[tokio::test]
    async fn test_apply_failure_carries_stderr() {
        let dir = TempDir::new().unwrap();

        let err = driver()
            .apply(
                &Workspace::new(dir.path()),
                &request(RawState::empty(), &[("FAKE_TF_FAIL", "apply")]),
            )
            .await
            .unwrap_err();

        match err {
            ApplyError::CommandFailed { command, stderr } => {
                assert_eq!(command, "terraform apply");
                assert!(stderr.contains("RequestLimitExceeded"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_init_failure() {
        let dir = TempDir::new().unwrap();

        let err = driver()
            .apply(
                &Workspace::new(dir.path()),
                &request(RawState::empty(), &[("FAKE_TF_FAIL", "init")]),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, ApplyError::CommandFailed { command, .. } if command == "terraform init"));
    }

    #[tokio::test]
    async fn test_apply_times_out() {
        let dir = TempDir::new().unwrap();

        let err = driver()
            .with_timeout(Duration::from_millis(200))
            .apply(
                &Workspace::new(dir.path()),
                &request(RawState::empty(), &[("FAKE_TF_SLEEP", "10")]),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, ApplyError::Timeout(t) if t == Duration::from_millis(200)));
    }

    #[tokio::test]
    async fn test_invalid_state_is_rejected() {
        let dir = TempDir::new().unwrap();

        let err = driver()
            .apply(
                &Workspace::new(dir.path()),
                &request(RawState::empty(), &[("FAKE_TF_STATE", "garbage")]),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, ApplyError::InvalidOutput(msg) if msg.contains(STATE_FILE)));
    }

    #[tokio::test]
    async fn test_missing_state_reads_as_empty() {
        let dir = TempDir::new().unwrap();

        let output = driver()
            .apply(
                &Workspace::new(dir.path()),
                &request(RawState::empty(), &[("FAKE_TF_STATE", "none")]),
            )
            .await
            .unwrap();

        assert!(output.state.is_empty());
    }

    #[tokio::test]
    async fn test_missing_binary() {
        let dir = TempDir::new().unwrap();
        let driver = TerraformDriver::new(TerraformCli::new("tfrestore-no-such-terraform"));

        let err = driver
            .apply(&Workspace::new(dir.path()), &request(RawState::empty(), &[]))
            .await
            .unwrap_err();

        assert!(matches!(err, ApplyError::EngineNotFound(name) if name == "tfrestore-no-such-terraform"));
    }
}
