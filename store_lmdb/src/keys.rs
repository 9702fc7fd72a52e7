//! Composite key encoding for the secondary indexes.
//!
//! Index keys are `len(owner) as u32 BE ++ owner ++ suffix`. The length
//! prefix keeps `agent-1` from being a prefix scan hit for `agent-10`.

/// The scan prefix for every index entry belonging to `owner`.
pub(crate) fn owner_prefix(owner: &str) -> Vec<u8> {
    let bytes = owner.as_bytes();
    let mut key = Vec::with_capacity(4 + bytes.len());
    key.extend_from_slice(&(bytes.len() as u32).to_be_bytes());
    key.extend_from_slice(bytes);
    key
}

/// `owner_prefix(owner) ++ suffix`.
pub(crate) fn index_key(owner: &str, suffix: &[u8]) -> Vec<u8> {
    let mut key = owner_prefix(owner);
    key.extend_from_slice(suffix);
    key
}

/// The suffix of an index key whose owner prefix is `prefix`.
pub(crate) fn suffix<'a>(key: &'a [u8], prefix: &[u8]) -> &'a [u8] {
    key.get(prefix.len()..).unwrap_or_default()
}

/// Smallest key strictly greater than every key starting with `prefix`.
/// `None` when the prefix is all `0xFF` (no upper bound).
pub(crate) fn prefix_upper_bound(prefix: &[u8]) -> Option<Vec<u8>> {
    let mut upper = prefix.to_vec();
    while let Some(last) = upper.pop() {
        if last < u8::MAX {
            upper.push(last + 1);
            return Some(upper);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn owners_do_not_collide_on_shared_prefixes() {
        let short = owner_prefix("agent-1");
        let long = index_key("agent-10", b"r1");
        assert!(!long.starts_with(&short));
    }

    #[test]
    fn upper_bound_increments_last_byte() {
        assert_eq!(prefix_upper_bound(&[1, 2, 3]), Some(vec![1, 2, 4]));
        assert_eq!(prefix_upper_bound(&[1, 0xFF]), Some(vec![2]));
        assert_eq!(prefix_upper_bound(&[0xFF, 0xFF]), None);
    }

    #[test]
    fn suffix_strips_owner() {
        let key = index_key("b1", b"req-9");
        assert_eq!(suffix(&key, &owner_prefix("b1")), b"req-9");
    }
}
