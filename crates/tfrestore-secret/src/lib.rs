//! 認証情報リゾルバ
//!
//! - [`DirectorySecretResolver`]: `<root>/<namespace>/<name>/<key>` にマウントされたシークレット
//! - [`OnePasswordResolver`]: 1Passwordのアイテムとして保存されたシークレット

pub mod directory;
pub mod onepassword;

pub use directory::DirectorySecretResolver;
pub use onepassword::OnePasswordResolver;

use tfrestore_core::{CredentialError, Credentials, SecretRef};

/// `keys` のうち `credentials` に無い最初のキーでエラーにする
pub(crate) fn require_keys(
    secret_ref: &SecretRef,
    credentials: &Credentials,
    keys: &[String],
) -> Result<(), CredentialError> {
    match keys.iter().find(|key| credentials.get(key).is_none()) {
        Some(key) => Err(CredentialError::MissingKey {
            secret: secret_ref.to_string(),
            key: key.clone(),
        }),
        None => Ok(()),
    }
}
