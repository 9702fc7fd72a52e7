//! Percent-encoding for the URLs this crate builds.

/// Encode everything outside the RFC 3986 unreserved set.
pub fn percent_encode(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for b in s.bytes() {
        if b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.' | b'~') {
            out.push(b as char);
        } else {
            out.push_str(&format!("%{b:02X}"));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unreserved_bytes_pass_through() {
        assert_eq!(percent_encode("Nexus-Trust_1.0~"), "Nexus-Trust_1.0~");
        assert_eq!(percent_encode("image/svg+xml"), "image%2Fsvg%2Bxml");
        assert_eq!(percent_encode("a b:c"), "a%20b%3Ac");
    }
}
