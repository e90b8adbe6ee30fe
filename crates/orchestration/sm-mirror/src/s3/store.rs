//! [`ObjectStore`] backed by `aws-sdk-s3`.

use async_trait::async_trait;
use aws_sdk_s3::Client;
use aws_sdk_s3::types::{
    CompletedMultipartUpload, CompletedPart, ObjectCannedAcl, ServerSideEncryption,
};
use chrono::DateTime;
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use sm_error::{StoreError, StoreResult};
use sm_traits::{KeyStream, ObjectStore, part_ranges};
use sm_types::{
    AclPolicy, CopyRequest, Grant, Grantee, ObjectAcl, ObjectMetadata, Permission, normalize_etag,
};
use tracing::{debug, warn};

use super::error::classify;
use super::list::list_objects;

/// Characters escaped in `x-amz-copy-source`. Slashes are kept.
const COPY_SOURCE_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~')
    .remove(b'/');

/// S3 object store.
#[derive(Debug, Clone)]
pub struct S3Store {
    client: Client,
}

impl S3Store {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &Client {
        &self.client
    }
}

/// Value of the `x-amz-copy-source` header for a source object.
pub fn copy_source(bucket: &str, key: &str) -> String {
    format!(
        "{bucket}/{}",
        utf8_percent_encode(key, COPY_SOURCE_ENCODE_SET)
    )
}

/// Apply storage class, encryption and ACL settings from a [`CopyRequest`]
/// to a copy or multipart-create builder.
macro_rules! with_copy_settings {
    ($builder:expr, $request:expr) => {{
        let request: &CopyRequest = $request;
        let mut builder = $builder.storage_class(aws_sdk_s3::types::StorageClass::from(
            request.storage_class.as_str(),
        ));
        if request.encrypt {
            builder = builder.server_side_encryption(ServerSideEncryption::Aes256);
        }
        match &request.acl {
            AclPolicy::BucketOwnerFullControl => {
                builder.acl(ObjectCannedAcl::BucketOwnerFullControl)
            }
            AclPolicy::Mirror(acl) => builder
                .set_grant_full_control(acl.grant_header(Permission::FullControl))
                .set_grant_read(acl.grant_header(Permission::Read))
                .set_grant_read_acp(acl.grant_header(Permission::ReadAcp))
                .set_grant_write_acp(acl.grant_header(Permission::WriteAcp)),
        }
    }};
}

fn convert_grant(grant: &aws_sdk_s3::types::Grant) -> Option<Grant> {
    use aws_sdk_s3::types::Permission as S3Permission;

    let grantee = grant.grantee()?;
    let grantee = if let Some(id) = grantee.id() {
        Grantee::CanonicalUser(id.to_string())
    } else if let Some(uri) = grantee.uri() {
        Grantee::Group(uri.to_string())
    } else if let Some(email) = grantee.email_address() {
        Grantee::Email(email.to_string())
    } else {
        return None;
    };

    let permission = match grant.permission()? {
        S3Permission::FullControl => Permission::FullControl,
        S3Permission::Read => Permission::Read,
        S3Permission::ReadAcp => Permission::ReadAcp,
        S3Permission::Write => Permission::Write,
        S3Permission::WriteAcp => Permission::WriteAcp,
        other => {
            warn!(permission = ?other, "Ignoring unknown ACL permission");
            return None;
        }
    };

    Some(Grant {
        grantee,
        permission,
    })
}

impl S3Store {
    async fn abort_upload(&self, request: &CopyRequest, upload_id: &str) {
        let result = self
            .client
            .abort_multipart_upload()
            .bucket(&request.dest_bucket)
            .key(&request.dest_key)
            .upload_id(upload_id)
            .send()
            .await;

        if let Err(e) = result {
            warn!(
                key = %request.dest_key,
                upload_id,
                error = %classify(&e, &request.dest_bucket, &request.dest_key),
                "Failed to abort multipart upload"
            );
        }
    }

    async fn copy_parts(
        &self,
        request: &CopyRequest,
        upload_id: &str,
        size: u64,
        part_size: u64,
    ) -> StoreResult<Vec<CompletedPart>> {
        let source = copy_source(&request.source_bucket, &request.source_key);
        let mut parts = Vec::new();

        for (index, (start, end)) in part_ranges(size, part_size).into_iter().enumerate() {
            let part_number = index as i32 + 1;

            let resp = self
                .client
                .upload_part_copy()
                .bucket(&request.dest_bucket)
                .key(&request.dest_key)
                .upload_id(upload_id)
                .part_number(part_number)
                .copy_source(&source)
                .copy_source_range(format!("bytes={start}-{end}"))
                .send()
                .await
                .map_err(|e| classify(&e, &request.dest_bucket, &request.dest_key))?;

            debug!(key = %request.dest_key, part_number, start, end, "Copied part");

            parts.push(
                CompletedPart::builder()
                    .part_number(part_number)
                    .set_e_tag(
                        resp.copy_part_result()
                            .and_then(|r| r.e_tag())
                            .map(str::to_string),
                    )
                    .build(),
            );
        }

        Ok(parts)
    }
}

#[async_trait]
impl ObjectStore for S3Store {
    fn list_keys<'a>(&'a self, bucket: &'a str, prefix: Option<&'a str>) -> KeyStream<'a> {
        Box::pin(list_objects(&self.client, bucket, prefix))
    }

    async fn head_object(&self, bucket: &str, key: &str) -> StoreResult<ObjectMetadata> {
        let resp = self
            .client
            .head_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| classify(&e, bucket, key))?;

        Ok(ObjectMetadata {
            content_length: resp.content_length().unwrap_or(0).max(0) as u64,
            etag: resp.e_tag().map(normalize_etag),
            last_modified: resp
                .last_modified()
                .and_then(|t| DateTime::from_timestamp(t.secs(), t.subsec_nanos())),
            content_type: resp.content_type().map(str::to_string),
        })
    }

    async fn get_object_acl(&self, bucket: &str, key: &str) -> StoreResult<ObjectAcl> {
        let resp = self
            .client
            .get_object_acl()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| classify(&e, bucket, key))?;

        Ok(ObjectAcl {
            owner: resp.owner().and_then(|o| o.id()).map(str::to_string),
            grants: resp.grants().iter().filter_map(convert_grant).collect(),
        })
    }

    async fn copy_object(&self, request: &CopyRequest) -> StoreResult<()> {
        let builder = self
            .client
            .copy_object()
            .copy_source(copy_source(&request.source_bucket, &request.source_key))
            .bucket(&request.dest_bucket)
            .key(&request.dest_key);

        with_copy_settings!(builder, request)
            .send()
            .await
            .map_err(|e| classify(&e, &request.dest_bucket, &request.dest_key))?;

        Ok(())
    }

    async fn multipart_copy(
        &self,
        request: &CopyRequest,
        size: u64,
        part_size: u64,
    ) -> StoreResult<()> {
        let builder = self
            .client
            .create_multipart_upload()
            .bucket(&request.dest_bucket)
            .key(&request.dest_key);

        let created = with_copy_settings!(builder, request)
            .send()
            .await
            .map_err(|e| classify(&e, &request.dest_bucket, &request.dest_key))?;

        let upload_id = created
            .upload_id()
            .ok_or_else(|| StoreError::Provider("CreateMultipartUpload returned no upload id".into()))?
            .to_string();

        let parts = match self.copy_parts(request, &upload_id, size, part_size).await {
            Ok(parts) => parts,
            Err(e) => {
                self.abort_upload(request, &upload_id).await;
                return Err(e);
            }
        };

        let completed = self
            .client
            .complete_multipart_upload()
            .bucket(&request.dest_bucket)
            .key(&request.dest_key)
            .upload_id(&upload_id)
            .multipart_upload(
                CompletedMultipartUpload::builder()
                    .set_parts(Some(parts))
                    .build(),
            )
            .send()
            .await;

        if let Err(e) = completed {
            let error = classify(&e, &request.dest_bucket, &request.dest_key);
            self.abort_upload(request, &upload_id).await;
            return Err(error);
        }

        Ok(())
    }

    async fn delete_object(&self, bucket: &str, key: &str) -> StoreResult<()> {
        self.client
            .delete_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| classify(&e, bucket, key))?;

        Ok(())
    }
}
