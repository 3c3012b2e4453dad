//! Server configuration loaded from environment variables.
//!
//! Every setting has a default so the server starts with zero
//! configuration for local development. Without an identity provider key
//! authenticated routes answer 401, and without a webhook secret the
//! webhook endpoints are disabled.

use std::net::SocketAddr;
use std::path::PathBuf;

use ltm_core::WorkflowConfig;

/// Server configuration.
#[derive(Clone)]
pub struct ServerConfig {
    /// Socket address for the HTTP (axum) API server.
    /// Env: `HTTP_ADDR`
    /// Default: `0.0.0.0:8080`
    pub http_addr: SocketAddr,

    /// SQLite database file.
    /// Env: `DATABASE_PATH`
    /// Default: `./ltm.db`
    pub database_path: PathBuf,

    /// Filesystem path where uploaded pictures are stored.
    /// Env: `MEDIA_STORAGE_PATH`
    /// Default: `./media`
    pub media_storage_path: PathBuf,

    /// Maximum upload size in bytes.
    /// Env: `MAX_MEDIA_SIZE`
    /// Default: 10 MiB
    pub max_media_size: usize,

    /// Ed25519 public key of the identity provider (hex-encoded, 64 chars).
    /// Env: `IDENTITY_PROVIDER_PUBKEY`
    pub identity_provider_pubkey: Option<[u8; 32]>,

    /// Shared secret the payment provider sends as a bearer token.
    /// Env: `WEBHOOK_SECRET`
    pub webhook_secret: Option<String>,

    /// Human-readable name for this server instance.
    /// Env: `INSTANCE_NAME`
    pub instance_name: String,

    /// Lawyer seating for the privilege workflow.
    /// Env: `LAWYER_USER_ID`, `LAWYER_NICKNAME`, `LAWYER_INTRO`
    pub workflow: WorkflowConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_addr: ([0, 0, 0, 0], 8080).into(),
            database_path: PathBuf::from("./ltm.db"),
            media_storage_path: PathBuf::from("./media"),
            max_media_size: 10 * 1024 * 1024,
            identity_provider_pubkey: None,
            webhook_secret: None,
            instance_name: "LTM Chat".to_string(),
            workflow: WorkflowConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(addr) = std::env::var("HTTP_ADDR") {
            if let Ok(parsed) = addr.parse::<SocketAddr>() {
                config.http_addr = parsed;
            } else {
                tracing::warn!(value = %addr, "Invalid HTTP_ADDR, using default");
            }
        }

        if let Ok(path) = std::env::var("DATABASE_PATH") {
            config.database_path = PathBuf::from(path);
        }

        if let Ok(path) = std::env::var("MEDIA_STORAGE_PATH") {
            config.media_storage_path = PathBuf::from(path);
        }

        if let Ok(val) = std::env::var("MAX_MEDIA_SIZE") {
            match val.parse::<usize>() {
                Ok(n) if n > 0 => config.max_media_size = n,
                _ => tracing::warn!(value = %val, "Invalid MAX_MEDIA_SIZE, using default"),
            }
        }

        if let Ok(hex_key) = std::env::var("IDENTITY_PROVIDER_PUBKEY") {
            match parse_hex_pubkey(&hex_key) {
                Ok(key) => config.identity_provider_pubkey = Some(key),
                Err(e) => {
                    tracing::warn!(error = %e, "Invalid IDENTITY_PROVIDER_PUBKEY, authentication disabled");
                }
            }
        }

        config.webhook_secret = non_empty_var("WEBHOOK_SECRET");

        if let Some(name) = non_empty_var("INSTANCE_NAME") {
            config.instance_name = name;
        }

        config.workflow.lawyer_user_id = non_empty_var("LAWYER_USER_ID");
        if let Some(nickname) = non_empty_var("LAWYER_NICKNAME") {
            config.workflow.lawyer_nickname = nickname;
        }
        if let Some(intro) = non_empty_var("LAWYER_INTRO") {
            config.workflow.lawyer_intro = intro;
        }

        config
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Parse a 64-character hex string into a 32-byte array.
fn parse_hex_pubkey(hex_key: &str) -> Result<[u8; 32], String> {
    let hex_key = hex_key.trim();
    if hex_key.len() != 64 {
        return Err(format!("expected 64 hex chars, got {}", hex_key.len()));
    }
    let bytes = hex::decode(hex_key).map_err(|e| e.to_string())?;
    bytes
        .try_into()
        .map_err(|_| "expected 32 bytes".to_string())
}
