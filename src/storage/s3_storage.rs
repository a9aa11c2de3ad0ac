use super::{BlobStore, ObjectDescriptor};
use crate::error::StoreError;
use async_trait::async_trait;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::{config::Region, Client};
use chrono::{DateTime, Utc};
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, info};

/// Bucket on S3 or an S3-compatible endpoint (GCS interoperability, MinIO).
pub struct S3Storage {
    client: Client,
    bucket: String,
    request_timeout: Duration,
}

impl S3Storage {
    pub async fn new(
        region: String,
        bucket: String,
        endpoint_url: Option<String>,
        force_path_style: bool,
        request_timeout: Duration,
    ) -> Result<Self, StoreError> {
        if bucket.trim().is_empty() {
            return Err(StoreError::S3Config("bucket name is empty".into()));
        }

        let sdk_config = aws_config::defaults(aws_config::BehaviorVersion::v2024_03_28())
            .region(Region::new(region))
            .load()
            .await;

        let mut builder = aws_sdk_s3::config::Builder::from(&sdk_config).force_path_style(force_path_style);
        if let Some(endpoint_url) = endpoint_url {
            info!("Using custom S3 endpoint: {}", endpoint_url);
            builder = builder.endpoint_url(endpoint_url);
        }

        Ok(Self {
            client: Client::from_conf(builder.build()),
            bucket,
            request_timeout,
        })
    }
}

fn to_chrono(timestamp: &aws_sdk_s3::primitives::DateTime) -> Option<DateTime<Utc>> {
    DateTime::<Utc>::from_timestamp(timestamp.secs(), timestamp.subsec_nanos())
}

#[async_trait]
impl BlobStore for S3Storage {
    fn describe(&self) -> String {
        format!("s3://{}", self.bucket)
    }

    async fn check(&self) -> Result<(), StoreError> {
        timeout(
            self.request_timeout,
            self.client.head_bucket().bucket(&self.bucket).send(),
        )
        .await
        .map_err(|_| StoreError::Timeout(self.request_timeout))?
        .map_err(|e| StoreError::ConnectionError(DisplayErrorContext(&e).to_string()))?;
        Ok(())
    }

    async fn list_objects(&self, prefix: Option<&str>) -> Result<Vec<ObjectDescriptor>, StoreError> {
        let mut pages = self
            .client
            .list_objects_v2()
            .bucket(&self.bucket)
            .set_prefix(prefix.map(str::to_string))
            .into_paginator()
            .send();

        let mut objects = Vec::new();
        let mut page_count = 0usize;
        loop {
            let page = timeout(self.request_timeout, pages.next())
                .await
                .map_err(|_| StoreError::Timeout(self.request_timeout))?;
            let Some(page) = page else { break };
            let page = page.map_err(|e| StoreError::S3List(DisplayErrorContext(&e).to_string()))?;
            page_count += 1;

            for object in page.contents() {
                let Some(key) = object.key() else { continue };
                let created_at = object.last_modified().and_then(to_chrono);
                objects.push(ObjectDescriptor::new(key, created_at));
            }
        }

        debug!(bucket = %self.bucket, pages = page_count, objects = objects.len(), "S3 listing complete");
        Ok(objects)
    }

    async fn delete_object(&self, name: &str) -> Result<(), StoreError> {
        timeout(
            self.request_timeout,
            self.client.delete_object().bucket(&self.bucket).key(name).send(),
        )
        .await
        .map_err(|_| StoreError::Timeout(self.request_timeout))?
        .map_err(|e| StoreError::S3Delete(DisplayErrorContext(&e).to_string()))?;

        debug!("Deleted S3 object: {}", name);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn converts_smithy_timestamps() {
        let smithy = aws_sdk_s3::primitives::DateTime::from_secs_and_nanos(1_714_543_200, 500);
        let expected = Utc.with_ymd_and_hms(2024, 5, 1, 6, 0, 0).unwrap() + chrono::TimeDelta::nanoseconds(500);
        assert_eq!(to_chrono(&smithy), Some(expected));
    }

    #[tokio::test]
    async fn rejects_empty_bucket_name() {
        let result = S3Storage::new("us-east-1".into(), " ".into(), None, false, Duration::from_secs(5)).await;
        assert!(matches!(result, Err(StoreError::S3Config(_))));
    }
}
