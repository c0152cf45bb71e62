//! Helpers for cleaning user-supplied names before they become object keys,
//! and for keeping identifiers out of span attributes.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::path::Path;

/// Reduces an uploaded filename to a safe, lowercase key segment.
///
/// Only the final path component survives; anything outside
/// `[A-Za-z0-9._-]` becomes `_`. An empty or dot-only result falls back to
/// `document`.
pub fn sanitize_filename(name: &str) -> String {
    let base = name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default();

    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c.to_ascii_lowercase()
            } else {
                '_'
            }
        })
        .collect();

    if cleaned.chars().all(|c| c == '.') {
        "document".to_string()
    } else {
        cleaned
    }
}

/// Returns only the filename component of a path.
pub fn redact_path(path: &Path) -> String {
    path.file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("<unknown>")
        .to_string()
}

/// Short deterministic hash for correlating an identifier across log lines
/// without printing it.
pub fn hash_id(value: &str) -> String {
    let mut hasher = DefaultHasher::new();
    value.hash(&mut hasher);
    format!("{:016x}", hasher.finish())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_keeps_safe_characters() {
        assert_eq!(sanitize_filename("Labels_Batch-01.PDF"), "labels_batch-01.pdf");
    }

    #[test]
    fn test_sanitize_replaces_unsafe_characters() {
        assert_eq!(sanitize_filename("my labels (2).pdf"), "my_labels__2_.pdf");
        assert_eq!(sanitize_filename("étiquettes.pdf"), "_tiquettes.pdf");
    }

    #[test]
    fn test_sanitize_strips_directories() {
        assert_eq!(sanitize_filename("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_filename("C:\\Users\\me\\Bulk.pdf"), "bulk.pdf");
    }

    #[test]
    fn test_sanitize_empty_falls_back() {
        assert_eq!(sanitize_filename(""), "document");
        assert_eq!(sanitize_filename(".."), "document");
        assert_eq!(sanitize_filename("dir/"), "document");
    }

    #[test]
    fn test_redact_path_returns_filename() {
        assert_eq!(redact_path(Path::new("/srv/objects/a/b.pdf")), "b.pdf");
        assert_eq!(redact_path(Path::new("/")), "<unknown>");
    }

    #[test]
    fn test_hash_id_is_stable() {
        assert_eq!(hash_id("order-1"), hash_id("order-1"));
        assert_ne!(hash_id("order-1"), hash_id("order-2"));
        assert_eq!(hash_id("x").len(), 16);
    }
}
