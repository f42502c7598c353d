//! Persisted OAuth credential
//!
//! The service owns exactly one credential. It is read from the
//! `GOOGLE_TOKEN_B64` blob when the deployment supplies one (hosts without a
//! writable disk at boot), otherwise from the credential file. Writes always
//! go to the credential file, atomically via temp file + rename.

use std::path::{Path, PathBuf};

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::constants::EXPIRY_SKEW_MILLIS;
use crate::error::{Error, Result};
use crate::token::TokenResponse;

/// The access/refresh token pair authorizing calendar calls.
///
/// `expires` is a unix timestamp in milliseconds, computed at storage time
/// from the token endpoint's `expires_in` delta.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Credential {
    pub access: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh: Option<String>,
    pub expires: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
}

impl Credential {
    /// Build a credential from a token endpoint response.
    ///
    /// `previous_refresh` is kept when the response carries no new refresh token.
    pub fn from_token_response(
        response: TokenResponse,
        now_millis: u64,
        previous_refresh: Option<String>,
    ) -> Self {
        Self {
            access: response.access_token,
            refresh: response.refresh_token.or(previous_refresh),
            expires: now_millis.saturating_add(response.expires_in.saturating_mul(1000)),
            scope: response.scope,
        }
    }

    pub fn is_expired(&self, now_millis: u64) -> bool {
        self.expires <= now_millis + EXPIRY_SKEW_MILLIS
    }
}

/// Where the credential is loaded from and persisted to.
#[derive(Debug, Clone)]
pub struct CredentialSlot {
    path: PathBuf,
    env_blob: Option<String>,
}

impl CredentialSlot {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            env_blob: None,
        }
    }

    /// Prefer a base64-encoded credential over the file on load.
    pub fn with_env_blob(mut self, blob: Option<String>) -> Self {
        self.env_blob = blob.filter(|b| !b.trim().is_empty());
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the stored credential, if any.
    ///
    /// A missing file is not an error: the service starts unauthorized and
    /// reports `AuthRequired` until the consent flow completes.
    pub async fn load(&self) -> Result<Option<Credential>> {
        if let Some(blob) = &self.env_blob {
            let credential = decode_blob(blob)?;
            info!("loaded credential from environment blob");
            return Ok(Some(credential));
        }

        if !tokio::fs::try_exists(&self.path)
            .await
            .map_err(|e| Error::Io(format!("checking credential file: {e}")))?
        {
            info!(path = %self.path.display(), "credential file not found, starting unauthorized");
            return Ok(None);
        }

        let contents = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| Error::Io(format!("reading credential file: {e}")))?;
        let credential: Credential = serde_json::from_str(&contents)
            .map_err(|e| Error::CredentialParse(format!("parsing credential file: {e}")))?;
        info!(path = %self.path.display(), "loaded credential");
        Ok(Some(credential))
    }

    /// Persist the credential to the credential file.
    pub async fn persist(&self, credential: &Credential) -> Result<()> {
        write_atomic(&self.path, credential).await
    }
}

/// Decode a `GOOGLE_TOKEN_B64` value: standard base64 over the credential JSON.
pub fn decode_blob(blob: &str) -> Result<Credential> {
    let bytes = STANDARD
        .decode(blob.trim())
        .map_err(|e| Error::CredentialParse(format!("decoding credential blob: {e}")))?;
    serde_json::from_slice(&bytes)
        .map_err(|e| Error::CredentialParse(format!("parsing credential blob: {e}")))
}

/// Current wall-clock time as unix milliseconds.
pub(crate) fn now_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Write the credential atomically with 0600 permissions.
async fn write_atomic(path: &Path, credential: &Credential) -> Result<()> {
    let json = serde_json::to_string_pretty(credential)
        .map_err(|e| Error::CredentialParse(format!("serializing credential: {e}")))?;

    let dir = path
        .parent()
        .ok_or_else(|| Error::Io("credential path has no parent directory".into()))?;
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("credential");
    let tmp_path = dir.join(format!(".{file_name}.tmp.{}", std::process::id()));

    tokio::fs::write(&tmp_path, json.as_bytes())
        .await
        .map_err(|e| Error::Io(format!("writing temp credential file: {e}")))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        tokio::fs::set_permissions(&tmp_path, perms)
            .await
            .map_err(|e| Error::Io(format!("setting credential file permissions: {e}")))?;
    }

    tokio::fs::rename(&tmp_path, path)
        .await
        .map_err(|e| Error::Io(format!("renaming temp credential file: {e}")))?;

    debug!(path = %path.display(), "persisted credential");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_credential() -> Credential {
        Credential {
            access: "ya29.access".into(),
            refresh: Some("1//refresh".into()),
            expires: 1_735_500_000_000,
            scope: None,
        }
    }

    #[test]
    fn huge_expires_in_saturates() {
        let response = TokenResponse {
            access_token: "ya29.access".into(),
            refresh_token: None,
            expires_in: u64::MAX / 10,
            scope: None,
        };
        let credential = Credential::from_token_response(response, 1_735_500_000_000, None);
        assert_eq!(credential.expires, u64::MAX);
        assert!(!credential.is_expired(1_735_500_000_000));
    }

    #[tokio::test]
    async fn missing_file_loads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let slot = CredentialSlot::new(dir.path().join("token.json"));
        assert!(slot.load().await.unwrap().is_none());
        assert!(!slot.path().exists(), "loading must not create the file");
    }

    #[tokio::test]
    async fn persist_then_load_roundtrips() {
        let dir = tempfile::tempdir().unwrap();
        let slot = CredentialSlot::new(dir.path().join("token.json"));
        slot.persist(&test_credential()).await.unwrap();

        let loaded = slot.load().await.unwrap().unwrap();
        assert_eq!(loaded, test_credential());
    }

    #[tokio::test]
    async fn env_blob_takes_precedence_over_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("token.json");
        CredentialSlot::new(path.clone())
            .persist(&test_credential())
            .await
            .unwrap();

        let from_env = Credential {
            access: "ya29.from-env".into(),
            ..test_credential()
        };
        let blob = STANDARD.encode(serde_json::to_vec(&from_env).unwrap());
        let slot = CredentialSlot::new(path).with_env_blob(Some(blob));

        let loaded = slot.load().await.unwrap().unwrap();
        assert_eq!(loaded.access, "ya29.from-env");
    }

    #[tokio::test]
    async fn blank_env_blob_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let slot = CredentialSlot::new(dir.path().join("token.json"))
            .with_env_blob(Some("   ".into()));
        assert!(slot.load().await.unwrap().is_none());
    }

    #[test]
    fn garbage_blob_is_parse_error() {
        assert!(matches!(
            decode_blob("%%%not-base64%%%"),
            Err(Error::CredentialParse(_))
        ));
        let not_json = STANDARD.encode("hello");
        assert!(matches!(
            decode_blob(&not_json),
            Err(Error::CredentialParse(_))
        ));
    }

    #[tokio::test]
    async fn corrupt_file_is_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("token.json");
        tokio::fs::write(&path, "{ not json").await.unwrap();
        let err = CredentialSlot::new(path).load().await.unwrap_err();
        assert!(matches!(err, Error::CredentialParse(_)));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn file_permissions_are_0600() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("token.json");
        CredentialSlot::new(path.clone())
            .persist(&test_credential())
            .await
            .unwrap();

        let mode = tokio::fs::metadata(&path).await.unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o600, "credential file must be 0600, got {mode:o}");
    }

    #[test]
    fn refresh_response_keeps_previous_refresh_token() {
        let response = TokenResponse {
            access_token: "ya29.new".into(),
            refresh_token: None,
            expires_in: 3600,
            scope: None,
        };
        let credential =
            Credential::from_token_response(response, 1_000, Some("1//old".into()));
        assert_eq!(credential.refresh.as_deref(), Some("1//old"));
        assert_eq!(credential.expires, 1_000 + 3_600_000);
    }

    #[test]
    fn expiry_includes_skew() {
        let credential = Credential {
            expires: 100_000,
            ..test_credential()
        };
        assert!(!credential.is_expired(100_000 - EXPIRY_SKEW_MILLIS - 1));
        assert!(credential.is_expired(100_000 - EXPIRY_SKEW_MILLIS));
        assert!(credential.is_expired(200_000));
    }
}
