use proptest::prelude::*;

use nexus_types::{NexusCode, Timestamp};

proptest! {
    /// Normalizing twice is the same as normalizing once.
    #[test]
    fn nexus_code_normalize_idempotent(raw in "[ a-zA-Z0-9]{0,12}") {
        let once = NexusCode::normalize(&raw);
        let twice = NexusCode::normalize(once.as_str());
        prop_assert_eq!(once, twice);
    }

    /// Lower- and upper-case spellings normalize to the same code.
    #[test]
    fn nexus_code_case_insensitive(raw in "[a-zA-Z0-9]{1,12}") {
        prop_assert_eq!(
            NexusCode::normalize(&raw.to_ascii_lowercase()),
            NexusCode::normalize(&raw.to_ascii_uppercase())
        );
    }

    /// Timestamp ordering: new(a) <= new(b) iff a <= b.
    #[test]
    fn timestamp_ordering(a in 0u64..u64::MAX, b in 0u64..u64::MAX) {
        let ta = Timestamp::new(a);
        let tb = Timestamp::new(b);
        prop_assert_eq!(ta <= tb, a <= b);
        prop_assert_eq!(ta == tb, a == b);
    }

    /// has_expired flips exactly at issued + duration.
    #[test]
    fn timestamp_expiry_boundary(issued in 0u64..1_000_000_000, ttl in 1u64..100_000) {
        let t = Timestamp::new(issued);
        prop_assert!(!t.has_expired(ttl, Timestamp::new(issued + ttl - 1)));
        prop_assert!(t.has_expired(ttl, Timestamp::new(issued + ttl)));
    }
}
