//! 1Passwordリゾルバ
//!
//! 各認証キーを1Password CLIで以下の参照から読み込みます。
//!
//! ```text
//! op://<vault>/<namespace>.<name>/<key>
//! ```
//!
//! ## 必要な環境
//!
//! - 1Password CLI (`op`) がインストールされていること
//! - `OP_SERVICE_ACCOUNT_TOKEN` 環境変数が設定されていること（サーバー環境）
//!   または1Password CLIでサインイン済みであること
//!
//! ## セキュリティ
//!
//! - 解決された値はログにもエラーメッセージにも出力されません

use async_trait::async_trait;
use std::process::Stdio;
use tfrestore_core::{CredentialError, CredentialResolver, Credentials, SecretRef};
use tokio::process::Command;
use tracing::{debug, info};

const OP_PREFIX: &str = "op://";
const OP_ACCOUNT_ENV: &str = "OP_ACCOUNT";

/// `op read` で認証情報を解決するリゾルバ
#[derive(Debug, Clone)]
pub struct OnePasswordResolver {
    vault: String,
    account: Option<String>,
    keys: Vec<String>,
    program: String,
    program_args: Vec<String>,
}

impl OnePasswordResolver {
    /// `vault` 内のアイテムから `keys` を読み込むリゾルバを作成
    pub fn new<I, S>(vault: impl Into<String>, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            vault: vault.into(),
            account: None,
            keys: keys.into_iter().map(Into::into).collect(),
            program: "op".to_string(),
            program_args: Vec::new(),
        }
    }

    /// `--account` に渡すアカウント（未指定時は `OP_ACCOUNT`）
    pub fn with_account(mut self, account: impl Into<String>) -> Self {
        self.account = Some(account.into());
        self
    }

    /// `op` の代わりに別のプログラムを先頭引数付きで実行する
    pub fn with_program<I, S>(mut self, program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.program = program.into();
        self.program_args = args.into_iter().map(Into::into).collect();
        self
    }

    /// 1キー分の `op://` 参照
    pub fn reference(&self, secret_ref: &SecretRef, key: &str) -> String {
        format!(
            "{}{}/{}.{}/{}",
            OP_PREFIX, self.vault, secret_ref.namespace, secret_ref.name, key
        )
    }

    /// 1Password CLIが利用可能かチェック
    pub async fn is_available(&self) -> bool {
        self.command()
            .arg("--version")
            .output()
            .await
            .map(|output| output.status.success())
            .unwrap_or(false)
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.program_args);
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        cmd
    }

    fn account(&self) -> Option<String> {
        self.account
            .clone()
            .or_else(|| std::env::var(OP_ACCOUNT_ENV).ok())
    }

    async fn read(&self, secret_ref: &SecretRef, key: &str) -> Result<String, CredentialError> {
        let reference = self.reference(secret_ref, key);
        debug!(reference = %reference, "Resolving 1Password reference");

        let mut cmd = self.command();
        cmd.arg("read").arg(&reference);
        if let Some(account) = self.account() {
            debug!(account = %account, "Using 1Password account");
            cmd.arg("--account").arg(account);
        }

        let output = cmd.output().await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                CredentialError::Backend(format!(
                    "1Password CLI ({}) is not installed or not in PATH",
                    self.program
                ))
            } else {
                CredentialError::Io(e)
            }
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            if stderr.contains("isn't a field") || stderr.contains("no item found") {
                return Err(CredentialError::MissingKey {
                    secret: secret_ref.to_string(),
                    key: key.to_string(),
                });
            }

            let hint = if stderr.contains("not signed in") || stderr.contains("session expired") {
                " (run `op signin` or set OP_SERVICE_ACCOUNT_TOKEN)"
            } else if stderr.contains("multiple accounts") {
                " (set OP_ACCOUNT to pick an account)"
            } else {
                ""
            };
            return Err(CredentialError::Backend(format!(
                "failed to read {}: {}{}",
                reference,
                stderr.trim(),
                hint
            )));
        }

        let value = String::from_utf8_lossy(&output.stdout);
        Ok(value.trim_end_matches(['\n', '\r']).to_string())
    }
}

#[async_trait]
impl CredentialResolver for OnePasswordResolver {
    #[tracing::instrument(skip(self), fields(secret = %secret_ref, vault = %self.vault))]
    async fn resolve(&self, secret_ref: &SecretRef) -> Result<Credentials, CredentialError> {
        if self.keys.is_empty() {
            return Err(CredentialError::Backend(
                "no credential keys configured for 1Password".to_string(),
            ));
        }

        let mut credentials = Credentials::new();
        for key in &self.keys {
            let value = self.read(secret_ref, key).await?;
            credentials.insert(key.as_str(), value);
        }

        info!(keys = credentials.len(), "Resolved 1Password references");
        Ok(credentials)
    }
}
