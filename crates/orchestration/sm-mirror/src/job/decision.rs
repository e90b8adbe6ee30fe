//! Decision helpers shared by job variants.

use sm_types::{KeySummary, MirrorOptions, ObjectMetadata};
use tracing::debug;

/// Whether the key survives the configured age filter.
///
/// A key without a last-modified timestamp always passes.
pub(crate) fn passes_age_filter(options: &MirrorOptions, summary: &KeySummary) -> bool {
    let Some(filter) = &options.age_filter else {
        return true;
    };

    match summary.last_modified {
        None => {
            debug!(key = %summary.key, "No last-modified timestamp, age filter does not apply");
            true
        }
        Some(modified) => {
            let admitted = filter.admits(Some(modified));
            if !admitted {
                debug!(
                    key = %summary.key,
                    last_modified = %modified,
                    filter = %filter.description(),
                    "Outside age filter, skipping"
                );
            }
            admitted
        }
    }
}

/// Whether the destination copy differs from the listed source object.
///
/// Objects above the multipart threshold compare by size only, since the
/// hash of a multipart upload is not a content hash.
pub(crate) fn differs(
    options: &MirrorOptions,
    source: &KeySummary,
    destination: &ObjectMetadata,
) -> bool {
    if source.size > options.multipart_threshold {
        return source.size != destination.content_length;
    }

    source.fingerprint(options.size_only) != destination.fingerprint(options.size_only)
}
