//! Duplicate resolver: exact content-hash lookup, then bounded
//! near-duplicate search by perceptual prefix.

use std::sync::Arc;

use crate::db::UploadStore;
use crate::models::{Fingerprint, Upload};
use crate::services::fingerprint::hamming_distance;

// Prefix bucketing keeps the candidate set bounded; no full-table scans.
const CANDIDATE_LIMIT: i64 = 25;

/// A previously classified upload matching the current fingerprint.
#[derive(Debug, Clone)]
pub struct DuplicateMatch {
    pub upload: Upload,
    /// 0 for an exact content-hash match.
    pub distance: u32,
}

pub struct DuplicateResolver {
    uploads: Arc<dyn UploadStore>,
    hamming_threshold: u32,
}

impl DuplicateResolver {
    pub fn new(uploads: Arc<dyn UploadStore>, hamming_threshold: u32) -> Self {
        Self {
            uploads,
            hamming_threshold,
        }
    }

    /// Best-effort lookup. A store failure degrades to "no match" so
    /// duplicate detection never blocks the request.
    pub async fn resolve(&self, fingerprint: &Fingerprint) -> Option<DuplicateMatch> {
        match self.uploads.find_by_content_hash(&fingerprint.content_hash).await {
            Ok(Some(upload)) => {
                return Some(DuplicateMatch {
                    upload,
                    distance: 0,
                })
            }
            Ok(None) => {}
            Err(e) => {
                tracing::warn!("exact duplicate lookup failed: {}", e);
                return None;
            }
        }

        let candidates = match self
            .uploads
            .find_by_perceptual_prefix(&fingerprint.perceptual_prefix, CANDIDATE_LIMIT)
            .await
        {
            Ok(candidates) => candidates,
            Err(e) => {
                tracing::warn!("near-duplicate lookup failed: {}", e);
                return None;
            }
        };

        let mut best: Option<DuplicateMatch> = None;
        for candidate in candidates {
            let Some(distance) = hamming_distance(
                &fingerprint.perceptual_hash,
                &candidate.fingerprint.perceptual_hash,
            ) else {
                continue;
            };
            if distance > self.hamming_threshold {
                continue;
            }
            if best.as_ref().map_or(true, |b| distance < b.distance) {
                best = Some(DuplicateMatch {
                    upload: candidate,
                    distance,
                });
            }
        }
        if let Some(m) = &best {
            tracing::debug!(
                matched_upload_id = %m.upload.id,
                distance = m.distance,
                "near-duplicate match"
            );
        }
        best
    }
}
