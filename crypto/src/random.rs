//! Random material: TOTP secrets, nexus codes and unguessable tokens.
//!
//! Every generator takes the RNG explicitly so production code passes
//! `OsRng` and tests pass a seeded generator.

use crate::error::CryptoError;
use crate::totp::TotpSecret;
use nexus_types::NexusCode;
use rand::{CryptoRng, Rng, RngCore};

/// Nexus code alphabet: upper-case letters and digits without the
/// visually ambiguous 0/O, 1/I/L.
pub const NEXUS_CODE_ALPHABET: &[u8; 31] = b"ABCDEFGHJKMNPQRSTUVWXYZ23456789";

/// Generate a fresh TOTP secret of `len` bytes.
pub fn generate_secret<R: RngCore + CryptoRng>(
    rng: &mut R,
    len: usize,
) -> Result<TotpSecret, CryptoError> {
    let mut bytes = vec![0u8; len];
    rng.fill_bytes(&mut bytes);
    TotpSecret::from_bytes(bytes)
}

/// Generate a human-presentable nexus code of `len` characters.
pub fn generate_nexus_code<R: RngCore + CryptoRng>(rng: &mut R, len: usize) -> NexusCode {
    let code: String = (0..len)
        .map(|_| NEXUS_CODE_ALPHABET[rng.gen_range(0..NEXUS_CODE_ALPHABET.len())] as char)
        .collect();
    NexusCode::normalize(&code)
}

/// Hex-encoded random token with `bytes` bytes of entropy.
pub fn random_token<R: RngCore + CryptoRng>(rng: &mut R, bytes: usize) -> String {
    let mut buf = vec![0u8; bytes];
    rng.fill_bytes(&mut buf);
    hex::encode(buf)
}
