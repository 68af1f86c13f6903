//! Configuration module for the Mira backend.
//!
//! All configuration is loaded from environment variables with sensible
//! defaults. Directory layout defaults to `<admin root>/data` and
//! `<admin root>/keys`; if those cannot be created and no path was set
//! explicitly, the admin root falls back to a writable temp location.

use std::env;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

/// Default maximum accepted request body size in bytes.
pub const MAX_BODY_BYTES: usize = 1_000_000;

const DEFAULT_ADMIN_ROOT: &str = "/var/mira";

/// Application configuration resolved once at startup and shared
/// immutably through `AppState`.
#[derive(Debug, Clone)]
pub struct Config {
    /// Address to bind the server to
    pub bind_addr: SocketAddr,
    /// Root directory for admin storage
    pub admin_root: PathBuf,
    /// Directory holding one JSON file per resource
    pub data_dir: PathBuf,
    /// Directory holding admin key material
    pub keys_dir: PathBuf,
    /// The ssh allowed-signers registry (identity -> public key)
    pub allowed_signers: PathBuf,
    /// Namespace string passed to `ssh-keygen -Y sign/verify`
    pub ssh_namespace: String,
    /// Optional directory of seed resource files synced into the data dir
    /// at startup
    pub seed_data_dir: Option<PathBuf>,
    /// Maximum accepted request body size in bytes
    pub max_body_bytes: usize,
}

impl Config {
    /// Load configuration from environment variables, creating the data and
    /// keys directories (falling back to a temp root when necessary).
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let bind_addr = env::var("MIRA_BIND_ADDR")
            .unwrap_or_else(|_| "127.0.0.1:3000".to_string())
            .parse()
            .expect("Invalid MIRA_BIND_ADDR format");

        let explicit_paths = ["MIRA_ADMIN_ROOT", "MIRA_DATA_DIR", "MIRA_KEYS_DIR", "MIRA_ALLOWED_SIGNERS"]
            .iter()
            .any(|name| env::var(name).is_ok());

        let mut admin_root: PathBuf = env::var("MIRA_ADMIN_ROOT")
            .unwrap_or_else(|_| DEFAULT_ADMIN_ROOT.to_string())
            .into();
        let mut data_dir: PathBuf = env::var("MIRA_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| admin_root.join("data"));
        let mut keys_dir: PathBuf = env::var("MIRA_KEYS_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| admin_root.join("keys"));

        if (!ensure_dir(&data_dir) || !ensure_dir(&keys_dir)) && !explicit_paths {
            admin_root = env::temp_dir().join("mira");
            data_dir = admin_root.join("data");
            keys_dir = admin_root.join("keys");
            ensure_dir(&data_dir);
            ensure_dir(&keys_dir);
            tracing::warn!(
                "Falling back to {} for admin storage",
                admin_root.display()
            );
        }

        let allowed_signers = env::var("MIRA_ALLOWED_SIGNERS")
            .map(PathBuf::from)
            .unwrap_or_else(|_| keys_dir.join("allowed_signers"));

        let ssh_namespace =
            env::var("MIRA_SSH_NAMESPACE").unwrap_or_else(|_| "mira-api".to_string());

        let seed_data_dir = env::var("MIRA_SEED_DATA_DIR").ok().map(PathBuf::from);

        let max_body_bytes = env::var("MIRA_MAX_BODY_BYTES")
            .ok()
            .and_then(|value| value.parse().ok())
            .unwrap_or(MAX_BODY_BYTES);

        Self {
            bind_addr,
            admin_root,
            data_dir,
            keys_dir,
            allowed_signers,
            ssh_namespace,
            seed_data_dir,
            max_body_bytes,
        }
    }
}

fn ensure_dir(path: &Path) -> bool {
    match std::fs::create_dir_all(path) {
        Ok(()) => true,
        Err(err) => {
            tracing::warn!("Could not create {}: {}", path.display(), err);
            false
        }
    }
}
