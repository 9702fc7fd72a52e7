//! Cryptographic primitives for Nexus pairing.
//!
//! - **TOTP** (RFC 6238, HMAC-SHA1) for the rotating pairing code
//! - **Base32** (RFC 4648) for exporting secrets to authenticator apps
//! - **HMAC-SHA256** for signing time-boxed upload URLs
//! - Random secret, nexus code and token generation

pub mod base32;
pub mod error;
pub mod random;
pub mod signing;
pub mod totp;
pub mod url;

pub use base32::{decode_base32, encode_base32};
pub use error::CryptoError;
pub use random::{generate_nexus_code, generate_secret, random_token, NEXUS_CODE_ALPHABET};
pub use signing::UrlSigner;
pub use totp::{hotp, Totp, TotpSecret};
pub use url::percent_encode;
