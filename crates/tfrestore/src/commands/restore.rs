use crate::descriptor;
use crate::pipeline;
use anyhow::Context;
use chrono::{DateTime, Utc};
use colored::Colorize;
use serde::Serialize;
use std::path::Path;
use std::process::ExitCode;
use tfrestore_core::{CancellationToken, InfrastructureStatus, RestoreOutcome};

/// `EX_TEMPFAIL`: 後で再試行すべき失敗
pub const EXIT_RETRY: u8 = 75;

/// 復元成功時に `--output`（または標準出力）へ書き出すレポート
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RestoreReport {
    status: InfrastructureStatus,
    /// 保存用ステート（そのまま `statePath` に使える）
    state: serde_json::Value,
    fingerprint: String,
    restored_at: DateTime<Utc>,
}

impl RestoreReport {
    fn new(outcome: RestoreOutcome) -> anyhow::Result<Self> {
        let state = serde_json::from_slice(&outcome.encoded_state())
            .context("failed to encode state envelope")?;
        Ok(Self {
            status: outcome.status,
            state,
            fingerprint: outcome.fingerprint,
            restored_at: Utc::now(),
        })
    }
}

pub async fn handle(
    descriptor_path: &Path,
    config_path: Option<&Path>,
    output: Option<&Path>,
) -> anyhow::Result<ExitCode> {
    let config = pipeline::load_config(config_path)?;
    let descriptor = descriptor::load(descriptor_path)?;
    let restorer = pipeline::build_restorer(&config);

    eprintln!(
        "{} {}",
        "Restoring".green().bold(),
        descriptor.id.to_string().cyan()
    );

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_interrupt.cancel();
        }
    });

    match restorer.restore(&descriptor, &cancel).await {
        Ok(outcome) => {
            eprintln!("  VPC: {}", outcome.status.vpc.id.cyan());
            eprintln!("  Subnets: {}", outcome.status.vpc.subnets.len());
            eprintln!("  State: {} bytes", outcome.state.len());

            let report = serde_json::to_string_pretty(&RestoreReport::new(outcome)?)?;
            match output {
                Some(path) => {
                    std::fs::write(path, report + "\n")
                        .with_context(|| format!("failed to write {}", path.display()))?;
                    eprintln!("  Report: {}", path.display().to_string().cyan());
                }
                None => println!("{}", report),
            }

            eprintln!("{}", "✓ Restore completed".green().bold());
            Ok(ExitCode::SUCCESS)
        }
        Err(err) if err.is_retryable() => {
            let after = err.retry_after_hint().unwrap_or_default();
            eprintln!("{} {}", "✗".yellow().bold(), err);
            eprintln!(
                "  {} retry in {}s",
                "→".yellow(),
                after.as_secs().to_string().bold()
            );
            Ok(ExitCode::from(EXIT_RETRY))
        }
        Err(err) => {
            eprintln!("{} {}", "✗".red().bold(), err);
            eprintln!("  kind: {}", err.kind());
            Ok(ExitCode::FAILURE)
        }
    }
}
