//! Document identity derivation.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::path::Path;

/// Number of hex characters kept from the content-path digest.
///
/// The hash partitions the annotation store per document; it is not a
/// security boundary, so 8 hex characters (32 bits) is enough.
const HASH_LEN: usize = 8;

/// Sentinel hash for documents opened without a backing path.
const HASH_UNKNOWN: &str = "unknown";

/// Sentinel hash for paths that could not be digested.
const HASH_ERROR: &str = "error";

/// Stable, collision-resistant key for one presentation document.
///
/// Derived once when a document opens and immutable for the session. Two
/// sessions of the same document (same path) always map to the same
/// identity, including across application restarts.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DocumentIdentity {
    /// Display name of the document, as reported by the host.
    pub display_name: String,
    /// Total slide count at open time.
    pub slide_count: i32,
    /// Truncated one-way digest of the document's content path.
    pub content_hash: String,
}

impl DocumentIdentity {
    /// Derives the identity for a document.
    ///
    /// The content path is hashed with SHA-256 and truncated to
    /// [`HASH_LEN`] hex characters. An empty path yields the `"unknown"`
    /// sentinel and a path that cannot be represented as UTF-8 yields
    /// `"error"`; identity computation never fails, so document-open
    /// handling is never blocked on it.
    #[must_use]
    pub fn compute(display_name: impl Into<String>, slide_count: i32, content_path: &Path) -> Self {
        let content_hash = hash_path(content_path);
        Self {
            display_name: display_name.into(),
            slide_count,
            content_hash,
        }
    }

    /// Returns the identity-derived on-disk folder name.
    ///
    /// Shaped as `{display_name}_{slide_count}_{content_hash}` with the
    /// display name reduced to filename-safe characters.
    #[must_use]
    pub fn folder_name(&self) -> String {
        format!(
            "{}_{}_{}",
            sanitize_component(&self.display_name),
            self.slide_count,
            self.content_hash
        )
    }

    /// Returns true if the content hash is one of the fallback sentinels.
    #[must_use]
    pub fn has_sentinel_hash(&self) -> bool {
        self.content_hash == HASH_UNKNOWN || self.content_hash == HASH_ERROR
    }
}

impl fmt::Display for DocumentIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({} slides, {})",
            self.display_name, self.slide_count, self.content_hash
        )
    }
}

/// Digests a content path down to [`HASH_LEN`] hex characters.
fn hash_path(path: &Path) -> String {
    if path.as_os_str().is_empty() {
        return HASH_UNKNOWN.to_string();
    }
    let Some(utf8) = path.to_str() else {
        return HASH_ERROR.to_string();
    };
    let mut hasher = Sha256::new();
    hasher.update(utf8.as_bytes());
    let digest = hex::encode(hasher.finalize());
    digest[..HASH_LEN].to_string()
}

/// Reduces a display name to characters safe inside a folder name.
///
/// Alphanumerics, dashes, and underscores pass through; everything else
/// (separators, dots, whitespace) becomes an underscore so the folder can
/// never escape the data directory.
fn sanitize_component(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.is_empty() {
        "untitled".to_string()
    } else {
        cleaned
    }
}
