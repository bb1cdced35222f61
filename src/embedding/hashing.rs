//! Offline feature-hashing embeddings.
//!
//! Each lowercase `\w+` token is hashed with SHA-256; the first eight digest
//! bytes pick a bucket and the ninth byte picks a sign. Counts accumulate per
//! bucket and the result is L2-normalized. Texts sharing vocabulary get
//! positive cosine similarity, which is all the pipeline needs when no model
//! is available.

use sha2::{Digest, Sha256};

use docqa_core::embedding::l2_normalize;
use docqa_core::text::tokenize;

pub const DEFAULT_DIMS: usize = 384;

fn bucket(token: &str, dims: usize) -> (usize, f32) {
    let digest = Sha256::digest(token.as_bytes());
    let mut head = [0u8; 8];
    head.copy_from_slice(&digest[..8]);
    let index = (u64::from_le_bytes(head) % dims as u64) as usize;
    let sign = if digest[8] & 1 == 0 { 1.0 } else { -1.0 };
    (index, sign)
}

/// Embed one text into `dims` buckets.
pub fn embed(text: &str, dims: usize) -> Vec<f32> {
    let mut vec = vec![0.0f32; dims];
    if dims == 0 {
        return vec;
    }
    for token in tokenize(text) {
        let (i, sign) = bucket(&token, dims);
        vec[i] += sign;
    }
    l2_normalize(&mut vec);
    vec
}
