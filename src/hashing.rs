//! Stable string hashing used wherever a pool index must be reproducible.

/// Deterministic 32-bit rolling hash (`h = h * 31 + unit` over UTF-16 code units,
/// wrapping), returned as its absolute value.
///
/// The result only depends on the input text, never on process state, so the same
/// hostname selects the same pool entry on every run and platform.
pub fn stable_hash(input: &str) -> u32 {
    let mut hash: i32 = 0;
    for unit in input.encode_utf16() {
        hash = hash
            .wrapping_shl(5)
            .wrapping_sub(hash)
            .wrapping_add(i32::from(unit));
    }
    hash.unsigned_abs()
}

/// Index into `pool` with `stable_hash(key) % pool.len()`. `None` for an empty pool.
pub fn pick_stable<'a, T>(pool: &'a [T], key: &str) -> Option<&'a T> {
    if pool.is_empty() {
        return None;
    }
    pool.get(stable_hash(key) as usize % pool.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_values() {
        assert_eq!(stable_hash(""), 0);
        assert_eq!(stable_hash("a"), 97);
        assert_eq!(stable_hash("ab"), 97 * 31 + 98);
        assert_eq!(stable_hash("hello"), 99_162_322);
    }

    #[test]
    fn test_negative_hashes_are_folded() {
        // i32::MIN has no positive counterpart in i32; it must not panic
        assert_eq!(stable_hash("polygenelubricants"), 2_147_483_648);
    }

    #[test]
    fn test_repeatable() {
        for input in ["stripe.com", "www.example.co.uk", "zürich.ch", ""] {
            assert_eq!(stable_hash(input), stable_hash(input));
        }
    }

    #[test]
    fn test_pick_stable() {
        let pool = ["a", "b", "c"];
        assert_eq!(pick_stable(&pool, "ab"), Some(&pool[(3105 % 3) as usize]));
        assert_eq!(pick_stable::<&str>(&[], "ab"), None);
    }
}
