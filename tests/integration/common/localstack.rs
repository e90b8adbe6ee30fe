//! LocalStack test context and utilities.

use aws_sdk_s3::Client as S3Client;
use aws_sdk_s3::config::{Credentials, Region};
use sm_mirror::{S3Config, S3Store, create_s3_client};

const REGION: &str = "us-east-1";

/// LocalStack test context providing an S3 client.
pub struct LocalStackTestContext {
    pub s3: S3Client,
    pub endpoint: String,
}

impl LocalStackTestContext {
    /// Create a new LocalStack test context.
    ///
    /// Uses the `LOCALSTACK_ENDPOINT` environment variable if set,
    /// otherwise defaults to `http://localhost:4566`.
    pub async fn new() -> Self {
        let endpoint = std::env::var("LOCALSTACK_ENDPOINT")
            .unwrap_or_else(|_| "http://localhost:4566".to_string());

        let config = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(Region::new(REGION))
            .endpoint_url(&endpoint)
            .credentials_provider(Credentials::new("test", "test", None, None, "localstack"))
            .load()
            .await;

        let s3_config = aws_sdk_s3::config::Builder::from(&config)
            .force_path_style(true)
            .build();

        Self {
            s3: S3Client::from_conf(s3_config),
            endpoint,
        }
    }

    /// Check if LocalStack is available and healthy.
    pub async fn is_available(&self) -> bool {
        // Fails quickly if LocalStack isn't running
        self.s3.list_buckets().send().await.is_ok()
    }

    /// An [`S3Store`] built the way the CLI builds one, pointed at LocalStack.
    pub async fn store(&self) -> S3Store {
        let config = S3Config::new()
            .with_endpoint(&self.endpoint)
            .with_region(REGION)
            .with_credentials("test", "test")
            .with_timeout(60);

        let client = create_s3_client(&config)
            .await
            .expect("Failed to create S3 client");
        S3Store::new(client)
    }

    /// Create an empty S3 bucket for testing, clearing it if it already exists.
    pub async fn fresh_bucket(&self, name: &str) -> Result<(), aws_sdk_s3::Error> {
        let buckets = self.s3.list_buckets().send().await?;
        let exists = buckets
            .buckets()
            .iter()
            .any(|b| b.name().unwrap_or_default() == name);

        if exists {
            for key in self.list_keys(name, None).await? {
                self.delete_object(name, &key).await?;
            }
        } else {
            self.s3.create_bucket().bucket(name).send().await?;
        }
        Ok(())
    }

    /// Upload an object.
    pub async fn put(&self, bucket: &str, key: &str, data: Vec<u8>) -> Result<(), aws_sdk_s3::Error> {
        self.s3
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(data.into())
            .send()
            .await?;
        Ok(())
    }

    /// Delete an S3 object.
    pub async fn delete_object(&self, bucket: &str, key: &str) -> Result<(), aws_sdk_s3::Error> {
        self.s3
            .delete_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await?;
        Ok(())
    }

    /// Size and normalized ETag of an object.
    pub async fn head(&self, bucket: &str, key: &str) -> Result<(u64, String), aws_sdk_s3::Error> {
        let resp = self.s3.head_object().bucket(bucket).key(key).send().await?;
        Ok((
            resp.content_length().unwrap_or(0) as u64,
            resp.e_tag().unwrap_or_default().trim_matches('"').to_string(),
        ))
    }

    /// List keys in an S3 bucket with optional prefix, sorted.
    pub async fn list_keys(
        &self,
        bucket: &str,
        prefix: Option<&str>,
    ) -> Result<Vec<String>, aws_sdk_s3::Error> {
        let mut request = self.s3.list_objects_v2().bucket(bucket);
        if let Some(p) = prefix {
            request = request.prefix(p);
        }

        let result = request.send().await?;
        let mut keys: Vec<String> = result
            .contents()
            .iter()
            .filter_map(|o| o.key().map(String::from))
            .collect();
        keys.sort();
        Ok(keys)
    }
}

/// Deterministic test payload of `len` bytes.
pub fn test_data(len: usize, seed: u8) -> Vec<u8> {
    (0..len).map(|i| (i as u8).wrapping_mul(31).wrapping_add(seed)).collect()
}
