//! 設定から [`Restorer`] を組み立てる

use anyhow::Context;
use colored::Colorize;
use std::path::Path;
use std::sync::Arc;
use tfrestore_chart::ChartRenderer;
use tfrestore_config::{RestoreConfig, SecretsConfig};
use tfrestore_core::{CredentialResolver, Restorer, SerdeConfigDecoder};
use tfrestore_secret::{DirectorySecretResolver, OnePasswordResolver};
use tfrestore_terraform::{TerraformCli, TerraformDriver};

/// `--config` 指定、自動検索、デフォルトの順で設定を読み込む
pub fn load_config(path: Option<&Path>) -> anyhow::Result<RestoreConfig> {
    match path {
        Some(path) => RestoreConfig::load(path)
            .with_context(|| format!("failed to load config {}", path.display())),
        None => {
            let (config, found) = RestoreConfig::discover()?;
            match found {
                Some(found) => eprintln!("Config: {}", found.display().to_string().cyan()),
                None => eprintln!("{}", "No config file found, using defaults".dimmed()),
            }
            Ok(config)
        }
    }
}

pub fn credential_resolver(config: &RestoreConfig) -> Arc<dyn CredentialResolver> {
    let keys = config.required_credential_keys.clone();
    match &config.secrets {
        SecretsConfig::Directory { path } => {
            Arc::new(DirectorySecretResolver::new(path).with_required_keys(keys))
        }
        SecretsConfig::OnePassword { vault, account } => {
            let resolver = OnePasswordResolver::new(vault.clone(), keys);
            match account {
                Some(account) => Arc::new(resolver.with_account(account.clone())),
                None => Arc::new(resolver),
            }
        }
    }
}

pub fn build_restorer(config: &RestoreConfig) -> Restorer {
    let cli = TerraformCli::new(&config.terraform_bin).with_args(config.terraform_args.clone());
    let driver = TerraformDriver::new(cli).with_timeout(config.apply_timeout());

    Restorer::new(
        credential_resolver(config),
        Arc::new(SerdeConfigDecoder::new()),
        Arc::new(ChartRenderer::new(&config.charts_dir)),
        Arc::new(driver),
    )
    .with_options(config.restore_options())
}
