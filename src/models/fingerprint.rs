use serde::{Deserialize, Serialize};

/// Number of leading hex characters of the perceptual hash used as a coarse
/// bucket key for near-duplicate candidate lookup.
pub const PERCEPTUAL_PREFIX_LEN: usize = 4;

/// Content fingerprint of an uploaded image, derived purely from its bytes.
///
/// `content_hash` is a SHA-256 digest (exact-match key), `perceptual_hash`
/// is a 64-bit dHash encoded as 16 hex characters (near-duplicate key).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Fingerprint {
    pub content_hash: String,
    pub perceptual_hash: String,
    pub perceptual_prefix: String,
}

impl Fingerprint {
    pub fn new(content_hash: String, perceptual_hash: String) -> Self {
        let perceptual_prefix = perceptual_hash
            .chars()
            .take(PERCEPTUAL_PREFIX_LEN)
            .collect();
        Self {
            content_hash,
            perceptual_hash,
            perceptual_prefix,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefix_is_first_four_hex_chars() {
        let fp = Fingerprint::new("abc".to_string(), "d1e2f3a4b5c6d7e8".to_string());
        assert_eq!(fp.perceptual_prefix, "d1e2");
    }
}
