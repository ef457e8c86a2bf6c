//! Fingerprint engine: content hash plus perceptual dHash.

use image::imageops::FilterType;
use sha2::{Digest, Sha256};

use crate::error::{ModerationError, Result};
use crate::models::Fingerprint;

// dHash grid: one extra column so every pixel has a horizontal neighbor.
const DHASH_WIDTH: u32 = 9;
const DHASH_HEIGHT: u32 = 8;

/// Compute the fingerprint of raw image bytes. Deterministic and pure.
///
/// Malformed bytes are a hard failure; the pipeline must not substitute a
/// zero hash.
pub fn fingerprint(bytes: &[u8]) -> Result<Fingerprint> {
    let content_hash = hex::encode(Sha256::digest(bytes));
    let perceptual_hash = dhash(bytes)?;
    Ok(Fingerprint::new(content_hash, perceptual_hash))
}

/// Gradient hash: downsample to a 9x8 grayscale grid, compare each pixel to
/// its right neighbor, encode the 64 bits as 16 hex characters. Robust to
/// re-encoding and minor recompression.
fn dhash(bytes: &[u8]) -> Result<String> {
    let img = image::load_from_memory(bytes)
        .map_err(|e| ModerationError::ImageDecode(e.to_string()))?;
    let grid = img
        .resize_exact(DHASH_WIDTH, DHASH_HEIGHT, FilterType::Triangle)
        .to_luma8();

    let mut bits: u64 = 0;
    for y in 0..DHASH_HEIGHT {
        for x in 0..DHASH_WIDTH - 1 {
            let left = grid.get_pixel(x, y)[0];
            let right = grid.get_pixel(x + 1, y)[0];
            bits = (bits << 1) | u64::from(left > right);
        }
    }
    Ok(format!("{bits:016x}"))
}

/// Hamming distance between two hex-encoded bit vectors of equal length.
/// Returns `None` when the hashes are not comparable.
pub fn hamming_distance(a: &str, b: &str) -> Option<u32> {
    if a.is_empty() || a.len() != b.len() {
        return None;
    }
    let mut distance = 0;
    for (ca, cb) in a.chars().zip(b.chars()) {
        let na = ca.to_digit(16)?;
        let nb = cb.to_digit(16)?;
        distance += (na ^ nb).count_ones();
    }
    Some(distance)
}
