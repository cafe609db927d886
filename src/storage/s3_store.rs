use async_trait::async_trait;
use aws_sdk_s3::config::Credentials;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::ObjectCannedAcl;
use aws_sdk_s3::Client;
use tracing::debug;

use super::{ImageStore, ImageUpload};
use crate::error::StorageError;

/// S3-backed implementation of `ImageStore`.
///
/// Works against AWS S3 and S3-compatible services (MinIO, Ceph RGW, ...).
/// All objects are written with the `public-read` canned ACL.
#[derive(Clone)]
pub struct S3ImageStore {
    client: Client,
    bucket: String,
}

impl S3ImageStore {
    /// Create a new store writing into `bucket`.
    pub fn new(client: Client, bucket: String) -> Self {
        Self { client, bucket }
    }

    /// Get the bucket name.
    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// `CopySource` value for `key`: bucket and URL-encoded key.
    fn copy_source(&self, key: &str) -> String {
        format!("{}/{}", self.bucket, urlencoding::encode(key))
    }

    fn location(&self, key: &str) -> String {
        format!("s3://{}/{}", self.bucket, key)
    }
}

#[async_trait]
impl ImageStore for S3ImageStore {
    async fn put(&self, key: &str, upload: &ImageUpload) -> Result<(), StorageError> {
        debug!(key = key, size = upload.data.len(), "Uploading image");

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(upload.data.clone()))
            .content_type(&upload.content_type)
            .acl(ObjectCannedAcl::PublicRead)
            .send()
            .await
            .map_err(|e| StorageError::S3(e.to_string()))?;

        Ok(())
    }

    async fn copy(&self, from: &str, to: &str) -> Result<(), StorageError> {
        debug!(from = from, to = to, "Copying image");

        self.client
            .copy_object()
            .bucket(&self.bucket)
            .copy_source(self.copy_source(from))
            .key(to)
            .acl(ObjectCannedAcl::PublicRead)
            .send()
            .await
            .map_err(|e| {
                let status_is_404 = e
                    .raw_response()
                    .map(|r| r.status().as_u16() == 404)
                    .unwrap_or(false);

                let err_str = e.to_string();
                if status_is_404 || err_str.contains("NoSuchKey") {
                    return StorageError::NotFound(self.location(from));
                }

                StorageError::S3(err_str)
            })?;

        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        debug!(key = key, "Deleting image");

        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| StorageError::S3(e.to_string()))?;

        Ok(())
    }
}

/// Static access key pair for the object store.
#[derive(Debug, Clone)]
pub struct S3Credentials {
    pub access_key: String,
    pub secret_key: String,
}

/// Create an S3 client with optional custom endpoint and explicit credentials.
///
/// Use a custom endpoint for S3-compatible services like MinIO:
/// ```ignore
/// let client = create_s3_client(Some("http://localhost:9000"), "us-east-1", None).await;
/// ```
///
/// Without credentials the default AWS provider chain is used.
pub async fn create_s3_client(
    endpoint_url: Option<&str>,
    region: &str,
    credentials: Option<S3Credentials>,
) -> Client {
    let region = aws_config::Region::new(region.to_string());
    let mut config_loader =
        aws_config::defaults(aws_config::BehaviorVersion::latest()).region(region);

    if let Some(endpoint) = endpoint_url {
        config_loader = config_loader.endpoint_url(endpoint);
    }

    if let Some(creds) = credentials {
        config_loader = config_loader.credentials_provider(Credentials::new(
            creds.access_key,
            creds.secret_key,
            None,
            None,
            "stuff",
        ));
    }

    let sdk_config = config_loader.load().await;

    // S3-compatible services generally need path-style addressing
    let s3_config = if endpoint_url.is_some() {
        aws_sdk_s3::config::Builder::from(&sdk_config)
            .force_path_style(true)
            .build()
    } else {
        aws_sdk_s3::config::Builder::from(&sdk_config).build()
    };

    Client::from_conf(s3_config)
}
