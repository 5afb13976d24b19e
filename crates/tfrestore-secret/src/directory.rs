//! ディレクトリとしてマウントされたシークレット
//!
//! Kubernetesのシークレットボリュームと同じレイアウト:
//!
//! ```text
//! <root>/<namespace>/<name>/<key>
//! ```
//!
//! 1ファイルに1つの値。`.` で始まるエントリ（projected volumeの `..data`
//! シンボリックリンク群）は無視します。

use crate::require_keys;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tfrestore_core::{CredentialError, CredentialResolver, Credentials, SecretRef};
use tracing::debug;

/// `<root>/<namespace>/<name>/` から認証情報を読み込む
#[derive(Debug, Clone)]
pub struct DirectorySecretResolver {
    root: PathBuf,
    required_keys: Vec<String>,
}

impl DirectorySecretResolver {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            required_keys: Vec::new(),
        }
    }

    /// シークレットに必須のキー
    pub fn with_required_keys<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.required_keys = keys.into_iter().map(Into::into).collect();
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn secret_dir(&self, secret_ref: &SecretRef) -> PathBuf {
        self.root.join(&secret_ref.namespace).join(&secret_ref.name)
    }
}

#[async_trait]
impl CredentialResolver for DirectorySecretResolver {
    #[tracing::instrument(skip(self), fields(secret = %secret_ref))]
    async fn resolve(&self, secret_ref: &SecretRef) -> Result<Credentials, CredentialError> {
        let dir = self.secret_dir(secret_ref);
        if !tokio::fs::try_exists(&dir).await? {
            return Err(CredentialError::NotFound(secret_ref.to_string()));
        }

        let mut credentials = Credentials::new();
        let mut entries = tokio::fs::read_dir(&dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let Some(key) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            if key.starts_with('.') {
                continue;
            }
            // シンボリックリンクを辿る
            if !tokio::fs::metadata(entry.path()).await?.is_file() {
                continue;
            }

            let value = tokio::fs::read_to_string(entry.path()).await?;
            credentials.insert(key, value.trim_end_matches(['\n', '\r']));
        }

        debug!(dir = %dir.display(), keys = credentials.len(), "Read secret directory");
        require_keys(secret_ref, &credentials, &self.required_keys)?;
        Ok(credentials)
    }
}
