use dotenv::dotenv;
use retention_purge::prelude::*;
use retention_purge::storage::{BlobStore, S3Storage};
use std::env;
use std::time::Duration;

/// Lists a real bucket. Needs AWS_S3_BUCKET and AWS_REGION, optionally
/// AWS_ENDPOINT_URL for GCS interop.
#[tokio::test]
#[ignore]
async fn test_s3_connectivity() -> Result<()> {
    dotenv().ok();

    let bucket = env::var("AWS_S3_BUCKET").expect("AWS_S3_BUCKET must be set");
    let region = env::var("AWS_REGION").expect("AWS_REGION must be set");
    let endpoint = env::var("AWS_ENDPOINT_URL").ok();

    println!("Using bucket: {}", bucket);

    let s3_storage = S3Storage::new(region, bucket, endpoint, false, Duration::from_secs(30))
        .await
        .expect("Failed to create S3Storage");

    s3_storage.check().await?;
    let objects = s3_storage.list_objects(None).await?;
    println!("Listed {} objects", objects.len());

    Ok(())
}
