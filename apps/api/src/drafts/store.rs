//! Draft persistence.
//!
//! `DraftStore` is the seam; `RedisDraftStore` keeps each session as one JSON
//! value under `draft:{id}` and refreshes its TTL on every save, so an idle
//! wizard expires on its own.

use async_trait::async_trait;
use redis::AsyncCommands;
use tracing::debug;
use uuid::Uuid;

use crate::drafts::session::DraftSession;
use crate::errors::AppError;

#[async_trait]
pub trait DraftStore: Send + Sync {
    async fn load(&self, id: Uuid) -> Result<Option<DraftSession>, AppError>;
    async fn save(&self, draft: &DraftSession) -> Result<(), AppError>;
    /// Removes the draft. Returns false if it did not exist.
    async fn discard(&self, id: Uuid) -> Result<bool, AppError>;
}

pub fn draft_key(id: Uuid) -> String {
    format!("draft:{id}")
}

pub struct RedisDraftStore {
    client: redis::Client,
    ttl_secs: u64,
}

impl RedisDraftStore {
    pub fn new(client: redis::Client, ttl_secs: u64) -> Self {
        RedisDraftStore { client, ttl_secs }
    }

    async fn connection(&self) -> Result<redis::aio::MultiplexedConnection, AppError> {
        Ok(self.client.get_multiplexed_async_connection().await?)
    }
}

#[async_trait]
impl DraftStore for RedisDraftStore {
    async fn load(&self, id: Uuid) -> Result<Option<DraftSession>, AppError> {
        let mut conn = self.connection().await?;
        let raw: Option<String> = conn.get(draft_key(id)).await?;
        raw.map(|json| {
            serde_json::from_str(&json).map_err(|e| {
                AppError::Internal(anyhow::anyhow!("Draft {id} holds unreadable JSON: {e}"))
            })
        })
        .transpose()
    }

    async fn save(&self, draft: &DraftSession) -> Result<(), AppError> {
        let json = serde_json::to_string(draft)
            .map_err(|e| AppError::Internal(anyhow::anyhow!("Failed to encode draft: {e}")))?;
        let mut conn = self.connection().await?;
        conn.set_ex::<_, _, ()>(draft_key(draft.id), json, self.ttl_secs)
            .await?;
        debug!("Saved draft {} (ttl {}s)", draft.id, self.ttl_secs);
        Ok(())
    }

    async fn discard(&self, id: Uuid) -> Result<bool, AppError> {
        let mut conn = self.connection().await?;
        let removed: u32 = conn.del(draft_key(id)).await?;
        Ok(removed > 0)
    }
}

#[cfg(test)]
pub(crate) mod memory {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use super::*;

    /// In-process store with the same JSON encoding as Redis.
    #[derive(Default)]
    pub struct MemoryDraftStore {
        entries: Mutex<HashMap<String, String>>,
    }

    #[async_trait]
    impl DraftStore for MemoryDraftStore {
        async fn load(&self, id: Uuid) -> Result<Option<DraftSession>, AppError> {
            let entries = self.entries.lock().unwrap();
            Ok(entries
                .get(&draft_key(id))
                .map(|json| serde_json::from_str(json).unwrap()))
        }

        async fn save(&self, draft: &DraftSession) -> Result<(), AppError> {
            let json = serde_json::to_string(draft).unwrap();
            self.entries.lock().unwrap().insert(draft_key(draft.id), json);
            Ok(())
        }

        async fn discard(&self, id: Uuid) -> Result<bool, AppError> {
            Ok(self.entries.lock().unwrap().remove(&draft_key(id)).is_some())
        }
    }
}
