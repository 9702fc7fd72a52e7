//! RFC 4648 base32 (no padding) for TOTP secrets.
//!
//! Authenticator apps expect the shared secret in this form inside
//! `otpauth://` URIs. Decoding is case-insensitive and ignores spaces and
//! trailing `=` padding, since secrets are often copied by hand.

/// RFC 4648 base32 alphabet.
const BASE32_ALPHABET: &[u8; 32] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ234567";

/// Reverse lookup table: ASCII byte → 5-bit value (0xFF = invalid).
const BASE32_DECODE: [u8; 128] = {
    let mut table = [0xFFu8; 128];
    let alpha = BASE32_ALPHABET;
    let mut i = 0;
    while i < 32 {
        table[alpha[i] as usize] = i as u8;
        // Lower-case letters decode like their upper-case forms.
        if alpha[i] >= b'A' && alpha[i] <= b'Z' {
            table[(alpha[i] + 32) as usize] = i as u8;
        }
        i += 1;
    }
    table
};

/// Encode bytes as unpadded RFC 4648 base32.
pub fn encode_base32(bytes: &[u8]) -> String {
    let total_bits = bytes.len() * 8;
    let num_chars = total_bits.div_ceil(5);
    let mut result = String::with_capacity(num_chars);

    let mut buffer: u64 = 0;
    let mut bits_in_buffer = 0;

    for &byte in bytes {
        buffer = (buffer << 8) | byte as u64;
        bits_in_buffer += 8;
        while bits_in_buffer >= 5 {
            bits_in_buffer -= 5;
            let idx = ((buffer >> bits_in_buffer) & 0x1F) as usize;
            result.push(BASE32_ALPHABET[idx] as char);
        }
    }
    // Remaining bits (padded with zeros on the right).
    if bits_in_buffer > 0 {
        let idx = ((buffer << (5 - bits_in_buffer)) & 0x1F) as usize;
        result.push(BASE32_ALPHABET[idx] as char);
    }

    result
}

/// Decode base32 text into bytes. Returns `None` on any invalid character.
pub fn decode_base32(s: &str) -> Option<Vec<u8>> {
    let mut buffer: u64 = 0;
    let mut bits_in_buffer = 0;
    let mut result = Vec::with_capacity(s.len() * 5 / 8);

    for c in s.bytes() {
        if c == b' ' || c == b'=' {
            continue;
        }
        if c >= 128 {
            return None;
        }
        let val = BASE32_DECODE[c as usize];
        if val == 0xFF {
            return None;
        }
        buffer = (buffer << 5) | val as u64;
        bits_in_buffer += 5;
        if bits_in_buffer >= 8 {
            bits_in_buffer -= 8;
            result.push((buffer >> bits_in_buffer) as u8);
        }
    }

    Some(result)
}
