//! # ltm-server
//!
//! HTTP backend for the LTM group chat.
//!
//! Surfaces:
//! - **REST API** (axum) for profiles, groups, memberships and messages,
//!   authenticated with identity-provider tokens
//! - **Server-Sent Events** streaming committed changes per group and per user
//! - **Picture storage** for chat images and profile pictures
//! - **Payment webhooks** driving the attorney-client privilege and VIP workflows

mod api;
mod auth;
mod config;
mod error;
mod events;
mod media_store;

use std::sync::Arc;

use ltm_core::{ChangeFeed, ChatService};
use ltm_store::Database;
use tokio::sync::Mutex;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::api::AppState;
use crate::config::ServerConfig;
use crate::media_store::MediaStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // -----------------------------------------------------------------------
    // Logging: RUST_LOG overrides the default filter
    // -----------------------------------------------------------------------
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,ltm_server=debug")),
        )
        .init();

    info!("Starting LTM chat server v{}", env!("CARGO_PKG_VERSION"));

    // -----------------------------------------------------------------------
    // Environment
    // -----------------------------------------------------------------------
    let config = ServerConfig::from_env();
    info!(
        http_addr = %config.http_addr,
        database = %config.database_path.display(),
        media = %config.media_storage_path.display(),
        max_media_size = config.max_media_size,
        "Loaded configuration"
    );
    info!(
        instance = %config.instance_name,
        auth_enabled = config.identity_provider_pubkey.is_some(),
        webhooks_enabled = config.webhook_secret.is_some(),
        lawyer = ?config.workflow.lawyer_user_id,
        "Instance settings"
    );
    if config.identity_provider_pubkey.is_none() {
        warn!("IDENTITY_PROVIDER_PUBKEY not set; every authenticated request will be rejected");
    }
    if config.workflow.lawyer_user_id.is_none() {
        warn!("LAWYER_USER_ID not set; privilege activation will not seat a lawyer");
    }

    // -----------------------------------------------------------------------
    // Storage, media and the chat service
    // -----------------------------------------------------------------------
    let db = Database::open_at(&config.database_path)?;

    let media = Arc::new(
        MediaStore::new(config.media_storage_path.clone(), config.max_media_size).await?,
    );

    let feed = ChangeFeed::default();
    let chat = ChatService::with_feed(db, config.workflow.clone(), feed.clone());

    let http_addr = config.http_addr;
    let app_state = AppState {
        chat: Arc::new(Mutex::new(chat)),
        feed,
        media,
        config: Arc::new(config),
    };

    // -----------------------------------------------------------------------
    // Serve until the listener fails or Ctrl+C
    // -----------------------------------------------------------------------
    tokio::select! {
        result = api::serve(app_state, http_addr) => {
            if let Err(e) = result {
                tracing::error!(error = %e, "HTTP server failed");
                return Err(e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    Ok(())
}
