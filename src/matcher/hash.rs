//! Hash matcher: SHA-1 of the ROI bytes equals a pre-computed hash, exact
//! binary equality (no threshold).

use crate::domain::frame::{Frame, Roi};
use crate::error::AppError;
use crate::matcher::Matcher;
use sha1::{Digest, Sha1};

pub struct HashMatcher {
    expected: [u8; 20],
    roi: Option<Roi>,
}

impl HashMatcher {
    pub fn new(expected: [u8; 20], roi: Option<Roi>) -> HashMatcher {
        HashMatcher { expected, roi }
    }

    /// Load the expected digest from a file containing its hex encoding.
    pub fn load(hash_path: &std::path::Path, roi: Option<Roi>) -> Result<HashMatcher, AppError> {
        let text = std::fs::read_to_string(hash_path)
            .map_err(|e| AppError::Configuration(format!("reading hash file {hash_path:?}: {e}")))?;
        let bytes = hex_decode(text.trim())
            .ok_or_else(|| AppError::Configuration(format!("invalid hash hex in {hash_path:?}")))?;
        Ok(HashMatcher { expected: bytes, roi })
    }
}

fn hex_decode(s: &str) -> Option<[u8; 20]> {
    if s.len() != 40 {
        return None;
    }
    let mut out = [0u8; 20];
    for (i, chunk) in s.as_bytes().chunks_exact(2).enumerate() {
        let byte = u8::from_str_radix(std::str::from_utf8(chunk).ok()?, 16).ok()?;
        out[i] = byte;
    }
    Some(out)
}

impl Matcher for HashMatcher {
    fn is_match(&self, frame: &Frame) -> bool {
        let roi = self.roi.unwrap_or_else(|| Roi::full(frame.width(), frame.height()));
        let bytes = frame.roi_bytes(roi);
        let digest = Sha1::digest(&bytes);
        digest.as_slice() == self.expected
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_only_the_exact_hashed_content() {
        let data = vec![1u8, 2, 3].repeat(4);
        let frame = Frame::from_bgr(data.clone(), 2, 2);
        let digest = Sha1::digest(&data);
        let matcher = HashMatcher::new(digest.into(), None);
        assert!(matcher.is_match(&frame));

        let other = Frame::from_bgr(vec![9u8, 9, 9].repeat(4), 2, 2);
        assert!(!matcher.is_match(&other));
    }
}
