//! Mapping SDK failures onto [`StoreError`].

use aws_sdk_s3::config::http::HttpResponse;
use aws_sdk_s3::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use sm_error::StoreError;

/// Classify an SDK error for the object at `bucket`/`key`.
///
/// Uses the S3 error code when the service returned one, and the HTTP
/// status otherwise. Errors without a response (timeouts, connection
/// failures) are transient.
pub(crate) fn classify<E>(err: &SdkError<E, HttpResponse>, bucket: &str, key: &str) -> StoreError
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
{
    let status = err.raw_response().map(|r| r.status().as_u16());
    let code = err.as_service_error().and_then(|e| e.code());
    let message = DisplayErrorContext(err).to_string();

    StoreError::from_status(status, code, bucket, key, message)
}
