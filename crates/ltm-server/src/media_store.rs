//! On-disk storage for uploaded pictures.
//!
//! Objects live under one directory per prefix (`chat-pics/`,
//! `profile-pics/`) and are named by a random UUID. The reference handed
//! back to clients is `<prefix>/<uuid>`, which is what messages and
//! profiles store.

use std::path::{Component, Path, PathBuf};

use bytes::Bytes;
use ltm_shared::constants::{CHAT_PICS_PREFIX, PROFILE_PICS_PREFIX};
use tokio::fs;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::ServerError;

/// Where an upload goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaPrefix {
    ChatPics,
    ProfilePics,
}

impl MediaPrefix {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaPrefix::ChatPics => CHAT_PICS_PREFIX,
            MediaPrefix::ProfilePics => PROFILE_PICS_PREFIX,
        }
    }

    pub fn parse(hint: &str) -> Result<Self, ServerError> {
        match hint.trim().trim_matches('/') {
            CHAT_PICS_PREFIX => Ok(MediaPrefix::ChatPics),
            PROFILE_PICS_PREFIX => Ok(MediaPrefix::ProfilePics),
            other => Err(ServerError::BadRequest(format!(
                "Unknown media path '{other}', expected {CHAT_PICS_PREFIX} or {PROFILE_PICS_PREFIX}"
            ))),
        }
    }
}

/// Reject any target that escapes `base` through `..` components.
fn ensure_within(base: &Path, target: &Path) -> Result<PathBuf, ServerError> {
    let relative = target.strip_prefix(base).unwrap_or(target);
    let mut resolved = base.to_path_buf();
    for component in relative.components() {
        match component {
            Component::Normal(c) => resolved.push(c),
            Component::ParentDir => {
                return Err(ServerError::BadRequest("Path traversal detected".to_string()));
            }
            _ => {}
        }
    }
    Ok(resolved)
}

#[derive(Debug, Clone)]
pub struct MediaStore {
    base_path: PathBuf,
    max_size: usize,
}

impl MediaStore {
    pub async fn new(base_path: PathBuf, max_size: usize) -> Result<Self, ServerError> {
        for prefix in [MediaPrefix::ChatPics, MediaPrefix::ProfilePics] {
            let dir = base_path.join(prefix.as_str());
            fs::create_dir_all(&dir).await.map_err(|e| {
                ServerError::MediaStorage(format!(
                    "Failed to create media directory '{}': {}",
                    dir.display(),
                    e
                ))
            })?;
        }

        info!(path = %base_path.display(), "Media store initialized");

        Ok(Self {
            base_path,
            max_size,
        })
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    /// Store `data` and return its reference, e.g. `chat-pics/<uuid>`.
    pub async fn store(&self, prefix: MediaPrefix, data: &[u8]) -> Result<String, ServerError> {
        if data.is_empty() {
            return Err(ServerError::BadRequest("Empty upload".to_string()));
        }
        if data.len() > self.max_size {
            return Err(ServerError::MediaTooLarge {
                size: data.len(),
                max: self.max_size,
            });
        }

        let id = Uuid::new_v4();
        let path = self.object_path(prefix, &id.to_string())?;

        fs::write(&path, data).await.map_err(|e| {
            ServerError::MediaStorage(format!("Failed to write {}: {}", path.display(), e))
        })?;

        let reference = format!("{}/{}", prefix.as_str(), id);
        debug!(reference = %reference, size = data.len(), "Stored media object");
        Ok(reference)
    }

    pub async fn load(&self, prefix: MediaPrefix, id: Uuid) -> Result<Bytes, ServerError> {
        let path = self.object_path(prefix, &id.to_string())?;
        let reference = format!("{}/{}", prefix.as_str(), id);

        if !fs::try_exists(&path).await.unwrap_or(false) {
            return Err(ServerError::MediaNotFound(reference));
        }

        let data = fs::read(&path).await.map_err(|e| {
            ServerError::MediaStorage(format!("Failed to read {reference}: {e}"))
        })?;

        debug!(reference = %reference, size = data.len(), "Loaded media object");
        Ok(Bytes::from(data))
    }

    fn object_path(&self, prefix: MediaPrefix, name: &str) -> Result<PathBuf, ServerError> {
        let raw = self.base_path.join(prefix.as_str()).join(name);
        ensure_within(&self.base_path, &raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn test_store() -> (MediaStore, TempDir) {
        let dir = TempDir::new().unwrap();
        let store = MediaStore::new(dir.path().to_path_buf(), 1024).await.unwrap();
        (store, dir)
    }

    fn id_of(reference: &str) -> Uuid {
        Uuid::parse_str(reference.rsplit('/').next().unwrap()).unwrap()
    }

    #[tokio::test]
    async fn test_store_and_load() {
        let (store, _dir) = test_store().await;

        let reference = store.store(MediaPrefix::ChatPics, b"png-bytes").await.unwrap();
        assert!(reference.starts_with("chat-pics/"));

        let data = store.load(MediaPrefix::ChatPics, id_of(&reference)).await.unwrap();
        assert_eq!(&data[..], b"png-bytes");
    }

    #[tokio::test]
    async fn test_prefixes_are_separate() {
        let (store, _dir) = test_store().await;
        let reference = store.store(MediaPrefix::ProfilePics, b"me").await.unwrap();

        let result = store.load(MediaPrefix::ChatPics, id_of(&reference)).await;
        assert!(matches!(result, Err(ServerError::MediaNotFound(_))));
    }

    #[tokio::test]
    async fn test_size_limits() {
        let (store, _dir) = test_store().await;
        assert!(matches!(
            store.store(MediaPrefix::ChatPics, b"").await,
            Err(ServerError::BadRequest(_))
        ));
        assert!(matches!(
            store.store(MediaPrefix::ChatPics, &[0u8; 2048]).await,
            Err(ServerError::MediaTooLarge { size: 2048, max: 1024 })
        ));
    }

    #[test]
    fn test_prefix_hint() {
        assert_eq!(MediaPrefix::parse("chat-pics").unwrap(), MediaPrefix::ChatPics);
        assert_eq!(MediaPrefix::parse("/profile-pics/").unwrap(), MediaPrefix::ProfilePics);
        assert!(MediaPrefix::parse("../etc").is_err());
    }

    #[test]
    fn test_traversal_rejected() {
        let base = Path::new("/srv/media");
        assert!(ensure_within(base, &base.join("chat-pics/../../etc/passwd")).is_err());
        assert_eq!(
            ensure_within(base, &base.join("chat-pics/abc")).unwrap(),
            base.join("chat-pics/abc")
        );
    }
}
