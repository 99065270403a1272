use anyhow::Context;
use async_trait::async_trait;
use aws_config::{defaults, BehaviorVersion};
use aws_credential_types::Credentials;
use aws_sdk_s3::{
    config::{Builder as S3ConfigBuilder, Region},
    presigning::PresigningConfig,
    Client,
};
use aws_smithy_types::byte_stream::ByteStream;
use bytes::Bytes;
use uuid::Uuid;

use crate::config::StorageConfig;

const AVATAR_PREFIX: &str = "avatars";

/// Image formats accepted as avatars.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageType {
    Jpeg,
    Png,
    Webp,
    Gif,
}

impl ImageType {
    /// Reads a `Content-Type` value; parameters and case are ignored.
    pub fn from_content_type(ct: &str) -> Option<Self> {
        let essence = ct.split(';').next().unwrap_or_default().trim();
        match essence.to_ascii_lowercase().as_str() {
            "image/jpeg" | "image/jpg" => Some(ImageType::Jpeg),
            "image/png" => Some(ImageType::Png),
            "image/webp" => Some(ImageType::Webp),
            "image/gif" => Some(ImageType::Gif),
            _ => None,
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            ImageType::Jpeg => "jpg",
            ImageType::Png => "png",
            ImageType::Webp => "webp",
            ImageType::Gif => "gif",
        }
    }

    /// Content type stored with the object.
    pub fn mime(self) -> &'static str {
        match self {
            ImageType::Jpeg => "image/jpeg",
            ImageType::Png => "image/png",
            ImageType::Webp => "image/webp",
            ImageType::Gif => "image/gif",
        }
    }
}

/// `avatars/{user_id}/{random}.{ext}`; every upload gets a fresh name.
pub fn avatar_key(user_id: Uuid, image: ImageType) -> String {
    format!(
        "{}/{}/{}.{}",
        AVATAR_PREFIX,
        user_id,
        Uuid::new_v4(),
        image.extension()
    )
}

/// True when `key` lies under the avatar folder of `user_id`.
pub fn is_avatar_of(key: &str, user_id: Uuid) -> bool {
    let folder = format!("{}/{}/", AVATAR_PREFIX, user_id);
    key.len() > folder.len() && key.starts_with(&folder)
}

/// Blob storage for user uploads (avatars).
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn put(&self, key: &str, body: Bytes, content_type: &str) -> anyhow::Result<()>;
    async fn delete(&self, key: &str) -> anyhow::Result<()>;
    async fn presign_get(&self, key: &str, seconds: u64) -> anyhow::Result<String>;
}

#[derive(Clone)]
pub struct S3Store {
    client: Client,
    bucket: String,
}

impl S3Store {
    pub async fn from_config(cfg: &StorageConfig) -> anyhow::Result<Self> {
        let shared = defaults(BehaviorVersion::latest())
            .region(Region::new("us-east-1"))
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

        // MinIO only serves path-style URLs
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
impl ObjectStore for S3Store {
    async fn put(&self, key: &str, body: Bytes, content_type: &str) -> anyhow::Result<()> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(body))
            .content_type(content_type)
            .send()
            .await
            .with_context(|| format!("s3 put {}", key))?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> anyhow::Result<()> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .with_context(|| format!("s3 delete {}", key))?;
        Ok(())
    }

    async fn presign_get(&self, key: &str, seconds: u64) -> anyhow::Result<String> {
        let presigned = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .presigned(PresigningConfig::expires_in(
                std::time::Duration::from_secs(seconds),
            )?)
            .await
            .with_context(|| format!("s3 presign {}", key))?;
        Ok(presigned.uri().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_types() {
        assert_eq!(ImageType::from_content_type("image/jpeg"), Some(ImageType::Jpeg));
        assert_eq!(ImageType::from_content_type("image/jpg"), Some(ImageType::Jpeg));
        assert_eq!(ImageType::from_content_type("IMAGE/PNG"), Some(ImageType::Png));
        assert_eq!(
            ImageType::from_content_type("image/webp; charset=binary"),
            Some(ImageType::Webp)
        );
        assert_eq!(ImageType::from_content_type("application/pdf"), None);
        assert_eq!(ImageType::from_content_type(""), None);
        assert_eq!(ImageType::Jpeg.mime(), "image/jpeg");
        assert_eq!(ImageType::Gif.extension(), "gif");
    }

    #[test]
    fn avatar_keys_are_per_user_and_unique() {
        let user = Uuid::new_v4();
        let a = avatar_key(user, ImageType::Png);
        let b = avatar_key(user, ImageType::Png);
        assert_ne!(a, b);
        assert!(a.starts_with(&format!("avatars/{}/", user)));
        assert!(a.ends_with(".png"));
        assert!(is_avatar_of(&a, user));
        assert!(!is_avatar_of(&a, Uuid::new_v4()));
        assert!(!is_avatar_of(&format!("avatars/{}/", user), user));
        assert!(!is_avatar_of("products/cover.png", user));
    }
}
