//! tfrestoreの設定
//!
//! `tfrestore.yaml` の例:
//!
//! ```yaml
//! requeue_after_secs: 30
//! apply_timeout_secs: 1800
//! charts_dir: charts
//! chart: aws-infra
//! work_dir: /var/lib/tfrestore
//! terraform_bin: terraform
//! secrets:
//!   directory:
//!     path: /var/run/secrets/tfrestore
//! required_credential_keys: [accessKeyID, secretAccessKey]
//! ```
//!
//! 相対パスは設定ファイルのディレクトリを基準に解決されます。

pub mod error;

pub use error::*;

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tfrestore_core::RestoreOptions;
use tfrestore_core::restore::{DEFAULT_CHART, DEFAULT_REQUEUE_AFTER, PURPOSE_INFRA};
use tracing::{debug, info};

/// 設定ファイルのパスを指定する環境変数
pub const CONFIG_ENV: &str = "TFRESTORE_CONFIG";

const CONFIG_FILE_NAME: &str = "tfrestore.yaml";
const PROJECT_CONFIG_DIR: &str = ".tfrestore";
const CONFIG_DIR_NAME: &str = "tfrestore";
const DIR_CONFIG_FILE_NAME: &str = "config.yaml";

/// プロバイダ認証情報の取得元
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SecretsConfig {
    /// `<path>/<namespace>/<name>/<key>` ファイル
    Directory { path: PathBuf },
    /// `op://<vault>/<namespace>.<name>/<key>`
    OnePassword {
        vault: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        account: Option<String>,
    },
}

impl Default for SecretsConfig {
    fn default() -> Self {
        SecretsConfig::Directory {
            path: PathBuf::from("/var/run/secrets/tfrestore"),
        }
    }
}

/// `tfrestore` の設定
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RestoreConfig {
    pub requeue_after_secs: u64,
    pub apply_timeout_secs: u64,
    pub charts_dir: PathBuf,
    pub chart: String,
    /// terraformワークスペースのベースディレクトリ
    pub work_dir: PathBuf,
    pub terraform_bin: String,
    /// terraformの各サブコマンドの前に付ける引数
    pub terraform_args: Vec<String>,
    /// `directory: {path}` または `one_password: {vault, account}`
    #[serde(with = "serde_yaml::with::singleton_map")]
    pub secrets: SecretsConfig,
    pub required_credential_keys: Vec<String>,
}

impl Default for RestoreConfig {
    fn default() -> Self {
        Self {
            requeue_after_secs: DEFAULT_REQUEUE_AFTER.as_secs(),
            apply_timeout_secs: 30 * 60,
            charts_dir: PathBuf::from("charts"),
            chart: DEFAULT_CHART.to_string(),
            work_dir: std::env::temp_dir().join("tfrestore"),
            terraform_bin: "terraform".to_string(),
            terraform_args: Vec::new(),
            secrets: SecretsConfig::default(),
            required_credential_keys: vec![
                "accessKeyID".to_string(),
                "secretAccessKey".to_string(),
            ],
        }
    }
}

impl RestoreConfig {
    /// YAMLをパースして検証
    pub fn from_yaml_str(yaml: &str, path: &Path) -> Result<Self> {
        let config: RestoreConfig = serde_yaml::from_str(yaml).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// 設定ファイルを読み込み、相対パスをそのディレクトリ基準で解決
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = Self::from_yaml_str(&content, path)?;
        let base = path.parent().unwrap_or_else(|| Path::new("."));
        Ok(config.resolve_relative_to(base))
    }

    /// 検索で見つかった設定ファイルを読み込む（無ければデフォルト）
    pub fn discover() -> Result<(Self, Option<PathBuf>)> {
        match find_config_file()? {
            Some(path) => {
                info!(path = %path.display(), "Loading config");
                Ok((Self::load(&path)?, Some(path)))
            }
            None => {
                debug!("No config file found, using defaults");
                Ok((Self::default(), None))
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.requeue_after_secs == 0 {
            return Err(ConfigError::Invalid(
                "requeue_after_secs must be greater than 0".to_string(),
            ));
        }
        if self.apply_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "apply_timeout_secs must be greater than 0".to_string(),
            ));
        }
        if self.chart.trim().is_empty() {
            return Err(ConfigError::Invalid("chart must not be empty".to_string()));
        }
        if self.terraform_bin.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "terraform_bin must not be empty".to_string(),
            ));
        }
        if let SecretsConfig::OnePassword { vault, .. } = &self.secrets
            && vault.trim().is_empty()
        {
            return Err(ConfigError::Invalid(
                "secrets.one_password.vault must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    pub fn requeue_after(&self) -> Duration {
        Duration::from_secs(self.requeue_after_secs)
    }

    pub fn apply_timeout(&self) -> Duration {
        Duration::from_secs(self.apply_timeout_secs)
    }

    /// インフラ復元用のオーケストレータ設定
    pub fn restore_options(&self) -> RestoreOptions {
        RestoreOptions {
            chart: self.chart.clone(),
            purpose: PURPOSE_INFRA.to_string(),
            work_dir: self.work_dir.clone(),
            requeue_after: self.requeue_after(),
        }
    }

    fn resolve_relative_to(mut self, base: &Path) -> Self {
        let resolve = |p: PathBuf| if p.is_relative() { base.join(p) } else { p };
        self.charts_dir = resolve(self.charts_dir);
        self.work_dir = resolve(self.work_dir);
        if let SecretsConfig::Directory { path } = &mut self.secrets {
            *path = resolve(std::mem::take(path));
        }
        self
    }
}

/// tfrestoreの設定ディレクトリを取得（Linuxでは `~/.config/tfrestore`）
pub fn get_config_dir() -> Result<PathBuf> {
    Ok(dirs::config_dir()
        .ok_or(ConfigError::ConfigDirNotFound)?
        .join(CONFIG_DIR_NAME))
}

/// 設定ファイルを探す
///
/// 以下の優先順位で検索:
/// 1. 環境変数 `TFRESTORE_CONFIG`（指定時はファイルが存在すること）
/// 2. カレントディレクトリ: `./tfrestore.yaml`
/// 3. `./.tfrestore/config.yaml`
/// 4. グローバル設定: `<config_dir>/tfrestore/config.yaml`
pub fn find_config_file() -> Result<Option<PathBuf>> {
    let current_dir = std::env::current_dir()?;
    find_config_file_from(&current_dir)
}

/// 作業ディレクトリを指定する [`find_config_file`]
pub fn find_config_file_from(current_dir: &Path) -> Result<Option<PathBuf>> {
    if let Ok(config_path) = std::env::var(CONFIG_ENV) {
        let path = PathBuf::from(config_path);
        if path.is_file() {
            return Ok(Some(path));
        }
        return Err(ConfigError::NotFound(path));
    }

    let candidates = [
        current_dir.join(CONFIG_FILE_NAME),
        current_dir.join(PROJECT_CONFIG_DIR).join(DIR_CONFIG_FILE_NAME),
    ];
    if let Some(path) = candidates.into_iter().find(|p| p.is_file()) {
        return Ok(Some(path));
    }

    if let Ok(config_dir) = get_config_dir() {
        let global_config = config_dir.join(DIR_CONFIG_FILE_NAME);
        if global_config.is_file() {
            return Ok(Some(global_config));
        }
    }

    Ok(None)
}
