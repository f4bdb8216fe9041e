//! Artifact manifest: SHA-256 binding of the artifact files, optionally
//! signed with Ed25519.
//!
//! `manifest.json` lists every artifact file with its SHA-256 hex digest.
//! `artifacts.sig` holds a 64-byte Ed25519 signature over the exact manifest
//! bytes. The `sign_artifacts` binary produces both.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use base64::Engine;
use ed25519_dalek::{Signature, Verifier, VerifyingKey};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::{ARTIFACT_FILES, MANIFEST_FILE, SIGNATURE_FILE};
use crate::ports::ArtifactError;

pub const MANIFEST_VERSION: u32 = 1;

/// Clock skew tolerated on `created_at`.
const MAX_FUTURE_SKEW_SECS: i64 = 300;

/// How strictly artifact provenance is enforced at load time.
#[derive(Debug, Clone, Default)]
pub struct SignaturePolicy {
    /// Refuse to load without a manifest and a valid signature.
    pub require_signature: bool,
    /// Key that signatures must verify under.
    pub verifying_key: Option<VerifyingKey>,
}

impl SignaturePolicy {
    #[must_use]
    pub fn unsigned() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_key(mut self, key: VerifyingKey) -> Self {
        self.verifying_key = Some(key);
        self
    }

    #[must_use]
    pub fn required(mut self) -> Self {
        self.require_signature = true;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactManifest {
    pub version: u32,
    #[serde(default)]
    pub created_at: Option<i64>,
    /// File name → SHA-256 hex digest.
    pub files: BTreeMap<String, String>,
}

impl ArtifactManifest {
    /// Hash the five artifact files in `dir`.
    ///
    /// # Errors
    /// Returns `ArtifactError` if any artifact file is missing or unreadable.
    pub fn for_directory(dir: &Path) -> Result<Self, ArtifactError> {
        let mut files = BTreeMap::new();
        for name in ARTIFACT_FILES {
            let path = dir.join(name);
            let bytes = fs::read(&path).map_err(|source| io_or_missing("artifact file", &path, source))?;
            files.insert(name.to_string(), sha256_hex(&bytes));
        }
        Ok(Self {
            version: MANIFEST_VERSION,
            created_at: Some(chrono::Utc::now().timestamp()),
            files,
        })
    }

    #[must_use]
    pub fn binds(&self, file: &str) -> bool {
        self.files.contains_key(file)
    }
}

pub(super) fn io_or_missing(
    artifact: &'static str,
    path: &Path,
    source: std::io::Error,
) -> ArtifactError {
    if source.kind() == std::io::ErrorKind::NotFound {
        ArtifactError::Missing {
            artifact,
            path: path.to_path_buf(),
        }
    } else {
        ArtifactError::Io { artifact, source }
    }
}

#[must_use]
pub fn sha256_hex(bytes: &[u8]) -> String {
    Sha256::digest(bytes)
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}

/// Decode a base64 Ed25519 public key.
///
/// # Errors
/// Returns `ArtifactError::Signature` for bad base64 or a bad key.
pub fn verifying_key_from_b64(b64: &str) -> Result<VerifyingKey, ArtifactError> {
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(b64.trim())
        .map_err(|_| ArtifactError::Signature("invalid public key base64".into()))?;
    let key: [u8; 32] = bytes.as_slice().try_into().map_err(|_| {
        ArtifactError::Signature("invalid public key length (expected 32 bytes)".into())
    })?;
    VerifyingKey::from_bytes(&key)
        .map_err(|_| ArtifactError::Signature("invalid verifying key".into()))
}

/// Verify the manifest in `dir` (if any) against `policy` and the files on disk.
///
/// Returns `None` when there is no manifest and the policy allows that.
///
/// # Errors
/// Fails closed on a missing required signature, a bad signature, an
/// unsupported manifest, an unbound artifact file or a hash mismatch.
pub fn verify(dir: &Path, policy: &SignaturePolicy) -> Result<Option<ArtifactManifest>, ArtifactError> {
    let manifest_path = dir.join(MANIFEST_FILE);
    let sig_path = dir.join(SIGNATURE_FILE);

    if !manifest_path.exists() {
        if policy.require_signature {
            tracing::error!(path = ?manifest_path, "artifact manifest not found; signed artifacts are required");
            return Err(ArtifactError::Signature(format!(
                "{MANIFEST_FILE} is required when signed artifacts are enforced"
            )));
        }
        tracing::warn!("No artifact manifest; loading artifacts without integrity checks");
        return Ok(None);
    }

    let manifest_bytes = fs::read(&manifest_path)
        .map_err(|source| io_or_missing("artifact manifest", &manifest_path, source))?;

    if sig_path.exists() {
        verify_signature(&sig_path, &manifest_bytes, policy)?;
    } else if policy.require_signature {
        return Err(ArtifactError::Signature(format!(
            "{SIGNATURE_FILE} is required when signed artifacts are enforced"
        )));
    } else {
        tracing::warn!("Artifact manifest is not signed; checking hashes only");
    }

    let manifest: ArtifactManifest = serde_json::from_slice(&manifest_bytes).map_err(|e| {
        ArtifactError::Parse {
            artifact: "artifact manifest",
            reason: e.to_string(),
        }
    })?;
    if manifest.version != MANIFEST_VERSION {
        return Err(ArtifactError::Integrity(format!(
            "unsupported manifest version {}",
            manifest.version
        )));
    }

    if let Some(created_at) = manifest.created_at {
        if created_at > chrono::Utc::now().timestamp() + MAX_FUTURE_SKEW_SECS {
            return Err(ArtifactError::Integrity(
                "manifest created_at is in the future".into(),
            ));
        }
    }

    for name in ARTIFACT_FILES {
        if !manifest.binds(name) {
            return Err(ArtifactError::Integrity(format!(
                "manifest does not bind {name}"
            )));
        }
    }

    for (name, expected_hex) in &manifest.files {
        let path = dir.join(name);
        let bytes = fs::read(&path).map_err(|e| {
            ArtifactError::Integrity(format!(
                "manifest references missing/unreadable file {path:?}: {e}"
            ))
        })?;
        if !constant_time_eq_str(&sha256_hex(&bytes), expected_hex) {
            return Err(ArtifactError::Integrity(format!("hash mismatch for {name}")));
        }
    }

    tracing::info!(files = manifest.files.len(), "Artifact manifest verified");
    Ok(Some(manifest))
}

fn verify_signature(
    sig_path: &Path,
    manifest_bytes: &[u8],
    policy: &SignaturePolicy,
) -> Result<(), ArtifactError> {
    let key = policy.verifying_key.as_ref().ok_or_else(|| {
        ArtifactError::Signature("artifacts are signed but no verifying key is configured".into())
    })?;

    let sig_bytes = fs::read(sig_path)
        .map_err(|source| io_or_missing("artifact signature", sig_path, source))?;
    let sig: [u8; 64] = sig_bytes.as_slice().try_into().map_err(|_| {
        ArtifactError::Signature("invalid signature length (expected 64 bytes)".into())
    })?;

    key.verify(manifest_bytes, &Signature::from_bytes(&sig))
        .map_err(|_| ArtifactError::Signature("invalid artifact signature".into()))?;

    tracing::debug!("Artifact manifest signature verified");
    Ok(())
}

// Constant-time compare for hex digests.
fn constant_time_eq_str(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.bytes().zip(b.bytes()).fold(0u8, |diff, (x, y)| diff | (x ^ y)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha256_hex_known_vector() {
        assert_eq!(
            sha256_hex(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_constant_time_eq() {
        assert!(constant_time_eq_str("abcd", "abcd"));
        assert!(!constant_time_eq_str("abcd", "abce"));
        assert!(!constant_time_eq_str("abc", "abcd"));
    }

    #[test]
    fn test_verifying_key_from_b64_rejects_garbage() {
        assert!(verifying_key_from_b64("not base64!").is_err());
        let short = base64::engine::general_purpose::STANDARD.encode([1u8; 16]);
        assert!(verifying_key_from_b64(&short).is_err());
    }
}
