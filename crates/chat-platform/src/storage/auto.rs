//! Pick the storage backend named by configuration.
//!
//! `Auto` prefers file storage when a directory is configured and falls
//! back to memory when it cannot be opened.

use std::sync::Arc;

use chat_core::ports::StoragePort;
use chat_types::{
    config::{StorageBackendType, StorageConfig},
    ChatError, Result,
};

use super::{FileStorage, MemoryStorage};

/// Open the configured backend as a trait object so callers are backend-agnostic.
pub async fn open_storage(config: &StorageConfig) -> Result<Arc<dyn StoragePort>> {
    match (config.backend, &config.dir) {
        (StorageBackendType::Memory, _) => Ok(Arc::new(MemoryStorage::new())),
        (StorageBackendType::File, Some(dir)) => Ok(Arc::new(FileStorage::open(dir).await?)),
        (StorageBackendType::File, None) => Err(ChatError::Config(
            "storage.dir is required for the file backend".to_string(),
        )),
        (StorageBackendType::Auto, Some(dir)) => match FileStorage::open(dir).await {
            Ok(file) => {
                log::info!("Storage backend: file ({})", dir.display());
                Ok(Arc::new(file))
            }
            Err(e) => {
                log::warn!("File storage unavailable ({}), falling back to memory", e);
                Ok(Arc::new(MemoryStorage::new()))
            }
        },
        (StorageBackendType::Auto, None) => {
            log::info!("Storage backend: memory");
            Ok(Arc::new(MemoryStorage::new()))
        }
    }
}
