//! SSH-signature request authentication.
//!
//! Mutating admin requests carry a key id, a base64 `ssh-keygen -Y sign`
//! signature, and a Unix timestamp. The server rebuilds the exact signed
//! message from the request (verb, percent-decoded path, timestamp, body
//! hash) and hands verification to `ssh-keygen -Y verify` against the
//! allowed-signers registry. No signature math happens in-process.

use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use axum::http::{HeaderMap, Method};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use sha2::{Digest, Sha256};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use crate::errors::AppError;

/// Header carrying the signer identity from the allowed-signers registry.
pub const KEY_ID_HEADER: &str = "x-ssh-key-id";
/// Header carrying the base64-encoded SSH signature.
pub const SIGNATURE_HEADER: &str = "x-ssh-signature";
/// Header carrying the signing time as Unix seconds.
pub const TIMESTAMP_HEADER: &str = "x-ssh-timestamp";

/// Accepted clock skew between the request timestamp and server time.
pub const CLOCK_SKEW_SECS: i64 = 5 * 60;

/// Build the canonical message both sides sign:
/// `METHOD\npath\ntimestamp\nsha256hex(body)\n`.
///
/// The path is the percent-decoded request path. Tampering with any of the
/// four components invalidates the signature.
pub fn canonical_message(method: &str, path: &str, timestamp: &str, body: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(body);
    format!("{}\n{}\n{}\n{:x}\n", method, path, timestamp, hasher.finalize())
}

/// Verifies a signature over the canonical message for a given key id.
///
/// The production implementation shells out to `ssh-keygen`; tests inject
/// an in-memory fake.
#[async_trait]
pub trait SignatureVerifier: Send + Sync {
    async fn verify(&self, key_id: &str, signature: &[u8], message: &[u8])
        -> Result<(), AppError>;
}

/// Check the auth headers and signature on a mutating request.
///
/// The checks run in a fixed order: header presence, timestamp parse,
/// freshness window, then signature verification. Failure reasons stay
/// short and never distinguish a bad key id from a bad signature.
pub async fn authorize(
    verifier: &dyn SignatureVerifier,
    method: &Method,
    path: &str,
    headers: &HeaderMap,
    body: &[u8],
) -> Result<(), AppError> {
    let key_id = header_value(headers, KEY_ID_HEADER);
    let signature_b64 = header_value(headers, SIGNATURE_HEADER);
    let timestamp = header_value(headers, TIMESTAMP_HEADER);

    let (Some(key_id), Some(signature_b64), Some(timestamp)) =
        (key_id, signature_b64, timestamp)
    else {
        return Err(AppError::Unauthorized(
            "Missing SSH auth headers".to_string(),
        ));
    };

    let Ok(timestamp_secs) = timestamp.parse::<i64>() else {
        return Err(AppError::Unauthorized("Invalid timestamp".to_string()));
    };
    let now = chrono::Utc::now().timestamp();
    // Widened so extreme header values cannot wrap the subtraction back
    // into the accepted window.
    let skew = (i128::from(now) - i128::from(timestamp_secs)).abs();
    if skew > i128::from(CLOCK_SKEW_SECS) {
        return Err(AppError::Unauthorized(
            "Timestamp out of range".to_string(),
        ));
    }

    let signature = BASE64.decode(signature_b64).map_err(|_| {
        AppError::Unauthorized("SSH signature verification failed".to_string())
    })?;

    let message = canonical_message(method.as_str(), path, timestamp, body);
    verifier.verify(key_id, &signature, message.as_bytes()).await
}

fn header_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

/// Production verifier backed by `ssh-keygen -Y verify` and an
/// allowed-signers file.
pub struct SshKeygenVerifier {
    allowed_signers: PathBuf,
    namespace: String,
}

impl SshKeygenVerifier {
    pub fn new(allowed_signers: impl Into<PathBuf>, namespace: impl Into<String>) -> Self {
        Self {
            allowed_signers: allowed_signers.into(),
            namespace: namespace.into(),
        }
    }
}

#[async_trait]
impl SignatureVerifier for SshKeygenVerifier {
    async fn verify(
        &self,
        key_id: &str,
        signature: &[u8],
        message: &[u8],
    ) -> Result<(), AppError> {
        if !self.allowed_signers.is_file() {
            return Err(AppError::Unauthorized(
                "Allowed signers file not found".to_string(),
            ));
        }

        // The signature must be a file for ssh-keygen; the temp file is
        // removed on drop whichever way this function exits.
        let sig_file = tempfile::Builder::new()
            .prefix("mira-sig-")
            .suffix(".sig")
            .tempfile()
            .and_then(|mut file| {
                use std::io::Write;
                file.write_all(signature)?;
                file.flush()?;
                Ok(file)
            })
            .map_err(|err| {
                tracing::error!("Could not stage signature file: {}", err);
                AppError::Unauthorized("SSH signature verification failed".to_string())
            })?;

        let mut child = Command::new("ssh-keygen")
            .arg("-Y")
            .arg("verify")
            .arg("-f")
            .arg(&self.allowed_signers)
            .arg("-I")
            .arg(key_id)
            .arg("-n")
            .arg(&self.namespace)
            .arg("-s")
            .arg(sig_file.path())
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|err| {
                tracing::error!("Could not spawn ssh-keygen: {}", err);
                AppError::Unauthorized("ssh-keygen failed to run".to_string())
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            if stdin.write_all(message).await.is_err() {
                return Err(AppError::Unauthorized(
                    "ssh-keygen failed to run".to_string(),
                ));
            }
            // Close stdin so ssh-keygen sees EOF on the message.
            drop(stdin);
        }

        let status = child.wait().await.map_err(|err| {
            tracing::error!("ssh-keygen did not exit cleanly: {}", err);
            AppError::Unauthorized("ssh-keygen failed to run".to_string())
        })?;

        if status.success() {
            Ok(())
        } else {
            Err(AppError::Unauthorized(
                "SSH signature verification failed".to_string(),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Accepts everything; isolates the header/timestamp checks.
    struct AcceptAll;

    #[async_trait]
    impl SignatureVerifier for AcceptAll {
        async fn verify(&self, _: &str, _: &[u8], _: &[u8]) -> Result<(), AppError> {
            Ok(())
        }
    }

    fn signed_headers(timestamp: i64) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(KEY_ID_HEADER, "admin".parse().unwrap());
        headers.insert(
            SIGNATURE_HEADER,
            BASE64.encode(b"sig").parse().unwrap(),
        );
        headers.insert(
            TIMESTAMP_HEADER,
            timestamp.to_string().parse().unwrap(),
        );
        headers
    }

    #[test]
    fn test_canonical_message_is_deterministic() {
        let a = canonical_message("PUT", "/api/projects/1", "1700000000", b"{}");
        let b = canonical_message("PUT", "/api/projects/1", "1700000000", b"{}");
        assert_eq!(a, b);
        assert!(a.ends_with('\n'));
        assert_eq!(a.matches('\n').count(), 4);
    }

    #[test]
    fn test_canonical_message_binds_every_component() {
        let base = canonical_message("PUT", "/api/projects/1", "1700000000", b"{}");
        assert_ne!(
            base,
            canonical_message("POST", "/api/projects/1", "1700000000", b"{}")
        );
        assert_ne!(
            base,
            canonical_message("PUT", "/api/projects/2", "1700000000", b"{}")
        );
        assert_ne!(
            base,
            canonical_message("PUT", "/api/projects/1", "1700000001", b"{}")
        );
        assert_ne!(
            base,
            canonical_message("PUT", "/api/projects/1", "1700000000", b"{} ")
        );
    }

    #[test]
    fn test_body_hash_is_hex_sha256() {
        let message = canonical_message("GET", "/", "0", b"");
        // sha256 of the empty string
        assert!(message.contains(
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        ));
    }

    #[tokio::test]
    async fn test_missing_headers_rejected() {
        let err = authorize(
            &AcceptAll,
            &Method::POST,
            "/api/projects",
            &HeaderMap::new(),
            b"{}",
        )
        .await
        .unwrap_err();
        assert_eq!(err.message(), "Missing SSH auth headers");
    }

    #[tokio::test]
    async fn test_garbage_timestamp_rejected() {
        let mut headers = signed_headers(0);
        headers.insert(TIMESTAMP_HEADER, "soon".parse().unwrap());
        let err = authorize(&AcceptAll, &Method::POST, "/api/projects", &headers, b"{}")
            .await
            .unwrap_err();
        assert_eq!(err.message(), "Invalid timestamp");
    }

    #[tokio::test]
    async fn test_stale_timestamp_rejected() {
        let stale = chrono::Utc::now().timestamp() - CLOCK_SKEW_SECS - 30;
        let headers = signed_headers(stale);
        let err = authorize(&AcceptAll, &Method::POST, "/api/projects", &headers, b"{}")
            .await
            .unwrap_err();
        assert_eq!(err.message(), "Timestamp out of range");
    }

    #[tokio::test]
    async fn test_future_timestamp_rejected() {
        let future = chrono::Utc::now().timestamp() + CLOCK_SKEW_SECS + 30;
        let headers = signed_headers(future);
        let err = authorize(&AcceptAll, &Method::POST, "/api/projects", &headers, b"{}")
            .await
            .unwrap_err();
        assert_eq!(err.message(), "Timestamp out of range");
    }

    #[tokio::test]
    async fn test_extreme_timestamps_rejected() {
        for extreme in [i64::MIN, i64::MAX] {
            let headers = signed_headers(extreme);
            let err = authorize(&AcceptAll, &Method::POST, "/api/projects", &headers, b"{}")
                .await
                .unwrap_err();
            assert_eq!(err.message(), "Timestamp out of range");
        }
    }

    #[tokio::test]
    async fn test_fresh_timestamp_accepted() {
        let headers = signed_headers(chrono::Utc::now().timestamp());
        authorize(&AcceptAll, &Method::POST, "/api/projects", &headers, b"{}")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_invalid_base64_signature_rejected() {
        let mut headers = signed_headers(chrono::Utc::now().timestamp());
        headers.insert(SIGNATURE_HEADER, "%%%not-base64%%%".parse().unwrap());
        let err = authorize(&AcceptAll, &Method::POST, "/api/projects", &headers, b"{}")
            .await
            .unwrap_err();
        assert_eq!(err.message(), "SSH signature verification failed");
    }

    #[tokio::test]
    async fn test_missing_signers_file_rejected() {
        let verifier = SshKeygenVerifier::new("/nonexistent/allowed_signers", "mira-api");
        let err = verifier.verify("admin", b"sig", b"message").await.unwrap_err();
        assert_eq!(err.message(), "Allowed signers file not found");
    }
}
