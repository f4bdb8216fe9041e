//! Artifact signing utility.
//!
//! Hashes the five scoring artifacts into `manifest.json` and writes an
//! Ed25519 signature over the manifest bytes to `artifacts.sig`.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin sign_artifacts -- <artifact_dir>
//! ```
//!
//! The base64 signing seed is read from, in order:
//! `READMIT_ARTIFACT_SIGNING_KEY_B64_FD`, `READMIT_ARTIFACT_SIGNING_KEY_B64_FILE`,
//! the `/run/secrets/readmit_artifact_signing_key_b64` Docker secret, and (debug
//! builds only) `READMIT_ARTIFACT_SIGNING_KEY_B64`. The seed is zeroized after use.

use std::env;
use std::fs;
#[cfg(unix)]
use std::os::unix::io::FromRawFd;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use base64::engine::general_purpose;
use base64::Engine;
use ed25519_dalek::{Signature, Signer, SigningKey};
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use readmit::adapters::fs_artifacts::{ArtifactManifest, MANIFEST_FILE, SIGNATURE_FILE};

const KEY_FD_ENV: &str = "READMIT_ARTIFACT_SIGNING_KEY_B64_FD";
const KEY_FILE_ENV: &str = "READMIT_ARTIFACT_SIGNING_KEY_B64_FILE";
const KEY_ENV_DEV: &str = "READMIT_ARTIFACT_SIGNING_KEY_B64";
const DOCKER_SECRET_PATH: &str = "/run/secrets/readmit_artifact_signing_key_b64";

const USAGE: &str = "Usage: sign_artifacts <artifact_dir>";

#[derive(Zeroize, ZeroizeOnDrop)]
struct Seed([u8; 32]);

fn non_empty_secret(raw: &str) -> Result<Zeroizing<String>> {
    let secret = Zeroizing::new(raw.trim_end_matches(['\n', '\r']).to_string());
    if secret.is_empty() {
        bail!("Empty signing key");
    }
    Ok(secret)
}

fn read_signing_seed_b64() -> Result<Zeroizing<String>> {
    #[cfg(unix)]
    if let Ok(fd_str) = env::var(KEY_FD_ENV) {
        use std::io::Read;

        let fd: i32 = fd_str.trim().parse().context("Invalid key FD")?;
        if fd <= 2 {
            bail!("Refusing to read signing key from stdio FD");
        }
        // SAFETY: take ownership of FD for one-time secret read.
        let mut file = unsafe { fs::File::from_raw_fd(fd) };
        let mut buf = Zeroizing::new(String::new());
        file.read_to_string(&mut buf)
            .context("Failed reading signing key from FD")?;
        return non_empty_secret(&buf);
    }

    if let Ok(path) = env::var(KEY_FILE_ENV) {
        let content = Zeroizing::new(
            fs::read_to_string(path.trim()).context("Failed reading signing key file")?,
        );
        return non_empty_secret(&content);
    }

    if Path::new(DOCKER_SECRET_PATH).exists() {
        let content = Zeroizing::new(
            fs::read_to_string(DOCKER_SECRET_PATH).context("Failed reading docker secret")?,
        );
        return non_empty_secret(&content);
    }

    if cfg!(debug_assertions) {
        if let Ok(v) = env::var(KEY_ENV_DEV) {
            return non_empty_secret(&Zeroizing::new(v));
        }
    }

    bail!(
        "Missing signing key. Provide one of: {KEY_FD_ENV}, {KEY_FILE_ENV}, or \
         {DOCKER_SECRET_PATH} ({KEY_ENV_DEV} only in debug builds)."
    )
}

fn read_signing_seed() -> Result<Seed> {
    let b64 = read_signing_seed_b64()?;
    let raw = Zeroizing::new(
        general_purpose::STANDARD
            .decode(b64.trim())
            .context("Invalid base64 in signing key")?,
    );
    if raw.len() != 32 {
        bail!(
            "Signing key seed must be 32 bytes after base64 decode (got {})",
            raw.len()
        );
    }
    let mut seed = Seed([0u8; 32]);
    seed.0.copy_from_slice(&raw);
    Ok(seed)
}

fn parse_args() -> Result<PathBuf> {
    let mut dir = None;
    for arg in env::args().skip(1) {
        match arg.as_str() {
            "-h" | "--help" => bail!(USAGE),
            _ if dir.is_none() => dir = Some(PathBuf::from(arg)),
            _ => bail!(USAGE),
        }
    }
    dir.context(USAGE)
}

fn main() -> Result<()> {
    let dir = parse_args()?;
    if !dir.is_dir() {
        bail!("{dir:?} is not a directory");
    }

    let seed = read_signing_seed()?;
    let signing_key = SigningKey::from_bytes(&seed.0);
    drop(seed);

    let manifest = ArtifactManifest::for_directory(&dir)
        .with_context(|| format!("Failed to hash artifacts in {dir:?}"))?;
    let manifest_bytes =
        serde_json::to_vec_pretty(&manifest).context("Failed to serialize manifest.json")?;

    let manifest_path = dir.join(MANIFEST_FILE);
    fs::write(&manifest_path, &manifest_bytes)
        .with_context(|| format!("Failed to write {manifest_path:?}"))?;

    let sig: Signature = signing_key.sign(&manifest_bytes);
    let sig_path = dir.join(SIGNATURE_FILE);
    fs::write(&sig_path, sig.to_bytes()).with_context(|| format!("Failed to write {sig_path:?}"))?;

    println!("Signed manifest: {manifest_path:?} ({} files)", manifest.files.len());
    println!("Wrote signature: {sig_path:?}");
    println!(
        "READMIT_ARTIFACT_PUBKEY_B64={}",
        general_purpose::STANDARD.encode(signing_key.verifying_key().as_bytes())
    );
    Ok(())
}
