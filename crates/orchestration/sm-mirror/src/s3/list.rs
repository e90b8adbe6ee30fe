//! S3 object listing with pagination support.

use async_stream::try_stream;
use aws_sdk_s3::Client;
use chrono::DateTime;
use futures::Stream;
use sm_error::StoreResult;
use sm_types::KeySummary;

use super::error::classify;

/// List objects in an S3 bucket with optional prefix filtering.
///
/// Returns a stream of [`KeySummary`] items, handling pagination
/// automatically. Keys ending in `/` are kept: they are real objects and
/// get mirrored like any other. The first failed page ends the stream with
/// an error.
///
/// # Example
///
/// ```ignore
/// use futures::{StreamExt, pin_mut};
///
/// let stream = list_objects(&client, "my-bucket", Some("data/"));
/// pin_mut!(stream);
///
/// while let Some(result) = stream.next().await {
///     let summary = result?;
///     println!("Found: {} ({} bytes)", summary.key, summary.size);
/// }
/// ```
pub fn list_objects<'a>(
    client: &'a Client,
    bucket: &'a str,
    prefix: Option<&'a str>,
) -> impl Stream<Item = StoreResult<KeySummary>> + Send + 'a {
    try_stream! {
        let mut continuation_token: Option<String> = None;

        loop {
            let mut req = client.list_objects_v2().bucket(bucket);

            if let Some(prefix) = prefix {
                req = req.prefix(prefix);
            }

            if let Some(ref token) = continuation_token {
                req = req.continuation_token(token);
            }

            let resp = req
                .send()
                .await
                .map_err(|e| classify(&e, bucket, prefix.unwrap_or("")))?;

            for obj in resp.contents() {
                let Some(key) = obj.key() else {
                    continue;
                };
                if key.is_empty() {
                    continue;
                }

                let mut summary = KeySummary::new(key, obj.size().unwrap_or(0).max(0) as u64);
                if let Some(etag) = obj.e_tag() {
                    summary = summary.with_etag(etag);
                }
                if let Some(modified) = obj
                    .last_modified()
                    .and_then(|t| DateTime::from_timestamp(t.secs(), t.subsec_nanos()))
                {
                    summary = summary.with_last_modified(modified);
                }

                yield summary;
            }

            if resp.is_truncated() == Some(true) {
                continuation_token = resp.next_continuation_token().map(str::to_string);
                if continuation_token.is_none() {
                    break;
                }
            } else {
                break;
            }
        }
    }
}
