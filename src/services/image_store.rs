// src/services/image_store.rs
use crate::errors::StudioError;
use crate::models::ImageRecord;
use async_trait::async_trait;
use redis::{AsyncCommands, Client};

/// Where successful results are recorded. Inserts are append-only.
#[async_trait]
pub trait ImageStore: Send + Sync {
    async fn insert(&self, record: &ImageRecord) -> Result<(), StudioError>;
}

pub struct RedisImageStore {
    client: Client,
}

impl RedisImageStore {
    pub async fn new(redis_url: &str) -> Result<Self, StudioError> {
        let client = Client::open(redis_url)?;

        // Test connection
        let mut conn = client.get_async_connection().await?;
        redis::cmd("PING")
            .query_async::<_, String>(&mut conn)
            .await?;

        Ok(Self { client })
    }

    pub fn record_key(record: &ImageRecord) -> String {
        format!("image:{}", record.id)
    }

    pub fn user_index_key(user_id: &str) -> String {
        format!("user:{}:images", user_id)
    }
}

#[async_trait]
impl ImageStore for RedisImageStore {
    async fn insert(&self, record: &ImageRecord) -> Result<(), StudioError> {
        let mut conn = self.client.get_async_connection().await?;

        let value = serde_json::to_string(record)
            .map_err(|e| StudioError::Serialization(e.to_string()))?;

        conn.set::<_, _, ()>(Self::record_key(record), value).await?;
        conn.rpush::<_, _, ()>(
            Self::user_index_key(&record.user_id),
            record.id.to_string(),
        )
        .await?;

        Ok(())
    }
}
