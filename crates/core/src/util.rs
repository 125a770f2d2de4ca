pub(crate) fn fnv1a64(bytes: &[u8]) -> u64 {
    const FNV_OFFSET_BASIS: u64 = 0xcbf29ce484222325;
    const FNV_PRIME: u64 = 0x100000001b3;

    let mut hash = FNV_OFFSET_BASIS;
    for &b in bytes {
        hash ^= u64::from(b);
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

/// Replaces every run of whitespace with a single space.
pub(crate) fn collapse_whitespace(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_space = false;
    for ch in text.chars() {
        if ch.is_whitespace() {
            if !in_space {
                out.push(' ');
                in_space = true;
            }
        } else {
            out.push(ch);
            in_space = false;
        }
    }
    out
}

/// A key is valid when it is non-empty and free of whitespace.
pub(crate) fn is_valid_key(key: &str) -> bool {
    !key.is_empty() && !key.chars().any(char::is_whitespace)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collapse_whitespace_merges_mixed_runs() {
        assert_eq!(collapse_whitespace("a \t\n b\r\nc"), "a b c");
        assert_eq!(collapse_whitespace("  x  "), " x ");
        assert_eq!(collapse_whitespace(""), "");
    }

    #[test]
    fn keys_reject_whitespace_and_empty() {
        assert!(is_valid_key("zlib_ncd_sim"));
        assert!(!is_valid_key(""));
        assert!(!is_valid_key("a b"));
        assert!(!is_valid_key("tab\tkey"));
    }

    #[test]
    fn fnv_distinguishes_inputs() {
        assert_ne!(fnv1a64(b"abc"), fnv1a64(b"abd"));
        assert_eq!(fnv1a64(b""), 0xcbf29ce484222325);
    }
}
