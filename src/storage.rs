use std::collections::HashMap;

use anyhow::Context;
use aws_config::{defaults, BehaviorVersion};
use aws_credential_types::Credentials;
use aws_sdk_s3::{
    config::{Builder as S3ConfigBuilder, Region},
    presigning::PresigningConfig,
    Client,
};
use aws_smithy_types::byte_stream::ByteStream;
use axum::async_trait;
use bytes::Bytes;

use crate::config::StorageConfig;

/// Object read back from the store.
#[derive(Debug, Clone)]
pub struct StoredObject {
    pub body: Bytes,
    pub content_type: Option<String>,
}

#[async_trait]
pub trait StorageClient: Send + Sync {
    async fn put_object(
        &self,
        key: &str,
        body: Bytes,
        content_type: &str,
        metadata: &HashMap<String, String>,
    ) -> anyhow::Result<()>;
    async fn get_object(&self, key: &str) -> anyhow::Result<StoredObject>;
    async fn delete_object(&self, key: &str) -> anyhow::Result<()>;
    async fn presign_get(&self, key: &str, seconds: u64) -> anyhow::Result<String>;
}

#[derive(Clone)]
pub struct Storage {
    client: Client,
    bucket: String,
}

impl Storage {
    pub async fn new(cfg: &StorageConfig) -> anyhow::Result<Self> {
        let shared = defaults(BehaviorVersion::latest())
            .region(Region::new(cfg.region.clone()))
            .credentials_provider(Credentials::new(
                &cfg.access_key,
                &cfg.secret_key,
                None,
                None,
                "static",
            ))
            .endpoint_url(&cfg.endpoint)
            .load()
            .await;

        let conf = S3ConfigBuilder::from(&shared)
            .endpoint_url(&cfg.endpoint)
            .force_path_style(true)
            .build();

        Ok(Self {
            client: Client::from_conf(conf),
            bucket: cfg.bucket.clone(),
        })
    }
}

#[async_trait]
impl StorageClient for Storage {
    async fn put_object(
        &self,
        key: &str,
        body: Bytes,
        content_type: &str,
        metadata: &HashMap<String, String>,
    ) -> anyhow::Result<()> {
        let mut req = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(body))
            .content_type(content_type);
        for (k, v) in metadata {
            req = req.metadata(k, v);
        }
        req.send().await.context("s3 put_object")?;
        Ok(())
    }

    async fn get_object(&self, key: &str) -> anyhow::Result<StoredObject> {
        let out = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .context("s3 get_object")?;
        let content_type = out.content_type().map(str::to_string);
        let body = out
            .body
            .collect()
            .await
            .context("s3 read object body")?
            .into_bytes();
        Ok(StoredObject { body, content_type })
    }

    async fn delete_object(&self, key: &str) -> anyhow::Result<()> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .context("s3 delete_object")?;
        Ok(())
    }

    async fn presign_get(&self, key: &str, seconds: u64) -> anyhow::Result<String> {
        let req = self.client.get_object().bucket(&self.bucket).key(key);
        let presigned = req
            .presigned(PresigningConfig::expires_in(
                std::time::Duration::from_secs(seconds),
            )?)
            .await
            .context("s3 presign_get")?;
        Ok(presigned.uri().to_string())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Keeps objects in memory. `fail_puts` simulates an unreachable store.
    #[derive(Default)]
    pub(crate) struct FakeStorage {
        pub objects: Mutex<HashMap<String, StoredObject>>,
        pub fail_puts: bool,
    }

    #[async_trait]
    impl StorageClient for FakeStorage {
        async fn put_object(
            &self,
            key: &str,
            body: Bytes,
            content_type: &str,
            _metadata: &HashMap<String, String>,
        ) -> anyhow::Result<()> {
            anyhow::ensure!(!self.fail_puts, "storage unreachable");
            self.objects
                .lock()
                .map_err(|_| anyhow::anyhow!("poisoned"))?
                .insert(
                    key.to_string(),
                    StoredObject {
                        body,
                        content_type: Some(content_type.to_string()),
                    },
                );
            Ok(())
        }

        async fn get_object(&self, key: &str) -> anyhow::Result<StoredObject> {
            self.objects
                .lock()
                .map_err(|_| anyhow::anyhow!("poisoned"))?
                .get(key)
                .cloned()
                .with_context(|| format!("no object {key}"))
        }

        async fn delete_object(&self, key: &str) -> anyhow::Result<()> {
            self.objects
                .lock()
                .map_err(|_| anyhow::anyhow!("poisoned"))?
                .remove(key);
            Ok(())
        }

        async fn presign_get(&self, key: &str, _seconds: u64) -> anyhow::Result<String> {
            Ok(format!("https://fake.local/{key}"))
        }
    }

    #[tokio::test]
    async fn fake_storage_round_trips_objects() {
        let s = FakeStorage::default();
        s.put_object("a/b.pdf", Bytes::from_static(b"%PDF"), "application/pdf", &HashMap::new())
            .await
            .unwrap();
        let obj = s.get_object("a/b.pdf").await.unwrap();
        assert_eq!(obj.content_type.as_deref(), Some("application/pdf"));
        s.delete_object("a/b.pdf").await.unwrap();
        assert!(s.get_object("a/b.pdf").await.is_err());
    }
}
