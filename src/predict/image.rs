//! Content-hash fallback for image uploads.
//!
//! No image analysis happens here: the label is picked from the MD5 digest
//! of the upload, so the same bytes always map to the same condition.
//! History written by earlier deployments used the same digest, indexing
//! and label order, so none of the three may change.

use md5::{Digest, Md5};

pub const IMAGE_LABELS: [&str; 11] = [
    "Eczema",
    "Melanoma",
    "Psoriasis",
    "Fungal Infection",
    "Acne",
    "Rosacea",
    "Hives",
    "Shingles",
    "Cold Sore",
    "Warts",
    "Healthy Skin",
];

/// Digest read as a big-endian integer, reduced modulo the label count.
pub fn label_index(bytes: &[u8]) -> usize {
    let mut digest = [0u8; 16];
    digest.copy_from_slice(&Md5::digest(bytes));
    (u128::from_be_bytes(digest) % IMAGE_LABELS.len() as u128) as usize
}

pub fn label_for_image(bytes: &[u8]) -> &'static str {
    IMAGE_LABELS[label_index(bytes)]
}
