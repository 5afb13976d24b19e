//! terraform CLI wrapper

use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use std::process::Stdio;
use tfrestore_core::{ApplyError, EngineOutputs, EnvVars};
use tokio::process::Command;
use tracing::debug;

/// Invocation of the terraform binary
#[derive(Debug, Clone)]
pub struct TerraformCli {
    program: String,
    args: Vec<String>,
}

impl TerraformCli {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// Arguments placed before every subcommand
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// `terraform init`
    pub async fn init(&self, dir: &Path, env: &EnvVars) -> Result<String, ApplyError> {
        self.run_command(dir, env, &["init", "-input=false", "-no-color"])
            .await
    }

    /// `terraform apply`, without prompting
    pub async fn apply(&self, dir: &Path, env: &EnvVars) -> Result<String, ApplyError> {
        self.run_command(
            dir,
            env,
            &["apply", "-auto-approve", "-input=false", "-no-color"],
        )
        .await
    }

    /// `terraform output -json`, flattened to `name -> value`
    pub async fn output(&self, dir: &Path, env: &EnvVars) -> Result<EngineOutputs, ApplyError> {
        let stdout = self
            .run_command(dir, env, &["output", "-json", "-no-color"])
            .await?;
        parse_outputs(&stdout)
    }

    /// Run a terraform command in `dir` and return stdout
    async fn run_command(
        &self,
        dir: &Path,
        env: &EnvVars,
        args: &[&str],
    ) -> Result<String, ApplyError> {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        cmd.args(args);
        cmd.current_dir(dir);
        cmd.envs(env);
        cmd.env("TF_IN_AUTOMATION", "1");
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        // a timed-out apply drops this future; the child must not outlive it
        cmd.kill_on_drop(true);

        debug!(
            dir = %dir.display(),
            "Running: terraform {}",
            args.join(" ")
        );

        let output = cmd.output().await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ApplyError::EngineNotFound(self.program.clone())
            } else {
                ApplyError::Io(e)
            }
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ApplyError::CommandFailed {
                command: format!("terraform {}", args[0]),
                stderr: stderr.trim().to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }
}

impl Default for TerraformCli {
    fn default() -> Self {
        Self::new("terraform")
    }
}

/// One entry of `terraform output -json`
#[derive(Debug, Deserialize)]
struct OutputValue {
    value: serde_json::Value,
}

/// Parse `terraform output -json`
///
/// An empty document means the configuration declares no outputs.
pub fn parse_outputs(stdout: &str) -> Result<EngineOutputs, ApplyError> {
    if stdout.trim().is_empty() {
        return Ok(EngineOutputs::new());
    }

    let raw: BTreeMap<String, OutputValue> = serde_json::from_str(stdout)
        .map_err(|e| ApplyError::InvalidOutput(format!("terraform output -json: {}", e)))?;
    Ok(raw.into_iter().map(|(name, o)| (name, o.value)).collect())
}
