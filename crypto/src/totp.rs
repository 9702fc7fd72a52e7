//! Time-step-keyed one-time codes (HOTP / TOTP, RFC 4226 and RFC 6238).
//!
//! A code is a pure function of `(secret, unix_time)`: the time is divided
//! into fixed steps, the step counter is MAC'd with HMAC-SHA1 under the
//! secret, and the MAC is dynamically truncated to `digits` decimal digits.
//! The broker's device renders the code for the current step; validation
//! recomputes the codes for the current step and `skew_steps` on either side.

use crate::base32::{decode_base32, encode_base32};
use crate::error::CryptoError;
use crate::url::percent_encode;
use hmac::{Hmac, Mac};
use nexus_types::{PairingParams, Timestamp};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha1::Sha1;
use std::fmt;
use subtle::{Choice, ConstantTimeEq};
use zeroize::{Zeroize, ZeroizeOnDrop};

type HmacSha1 = Hmac<Sha1>;

/// Smallest secret accepted (RFC 4226 requires at least 128 bits).
pub const MIN_SECRET_LEN: usize = 16;

/// Shared symmetric TOTP secret.
///
/// Never leaves the broker side except encoded in a provisioning URI for the
/// broker's own authenticator. `Debug` output is redacted and the bytes are
/// zeroized on drop.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct TotpSecret(Vec<u8>);

impl TotpSecret {
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self, CryptoError> {
        if bytes.len() < MIN_SECRET_LEN {
            return Err(CryptoError::SecretTooShort {
                len: bytes.len(),
                min: MIN_SECRET_LEN,
            });
        }
        Ok(Self(bytes))
    }

    /// Parse a base32 secret as shown to authenticator apps.
    pub fn from_base32(encoded: &str) -> Result<Self, CryptoError> {
        let bytes = decode_base32(encoded).ok_or(CryptoError::InvalidBase32)?;
        Self::from_bytes(bytes)
    }

    pub fn to_base32(&self) -> String {
        encode_base32(&self.0)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for TotpSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TotpSecret(<{} bytes redacted>)", self.0.len())
    }
}

impl Serialize for TotpSecret {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_bytes(&self.0)
    }
}

impl<'de> Deserialize<'de> for TotpSecret {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let bytes: Vec<u8> = serde::de::Deserialize::deserialize(deserializer)?;
        TotpSecret::from_bytes(bytes).map_err(serde::de::Error::custom)
    }
}

/// RFC 4226 HOTP value for one counter, reduced to `digits` digits.
pub fn hotp(secret: &[u8], counter: u64, digits: u32) -> Result<u32, CryptoError> {
    let mut mac =
        HmacSha1::new_from_slice(secret).map_err(|e| CryptoError::InvalidKey(e.to_string()))?;
    mac.update(&counter.to_be_bytes());
    let digest = mac.finalize().into_bytes();

    // Dynamic truncation: low nibble of the last byte picks a 4-byte window.
    let offset = (digest[digest.len() - 1] & 0x0F) as usize;
    let binary = u32::from_be_bytes([
        digest[offset] & 0x7F,
        digest[offset + 1],
        digest[offset + 2],
        digest[offset + 3],
    ]);
    Ok(binary % 10u32.pow(digits))
}

/// TOTP code generator / validator for one parameter set.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Totp {
    step_secs: u64,
    digits: u32,
    skew_steps: u64,
}

impl Totp {
    pub fn new(step_secs: u64, digits: u32, skew_steps: u64) -> Result<Self, CryptoError> {
        if step_secs == 0 {
            return Err(CryptoError::InvalidStep);
        }
        if !(6..=8).contains(&digits) {
            return Err(CryptoError::InvalidDigits(digits));
        }
        Ok(Self {
            step_secs,
            digits,
            skew_steps,
        })
    }

    pub fn from_params(params: &PairingParams) -> Result<Self, CryptoError> {
        Self::new(params.step_secs, params.digits, params.skew_steps)
    }

    pub fn digits(&self) -> u32 {
        self.digits
    }

    pub fn step_secs(&self) -> u64 {
        self.step_secs
    }

    /// The step counter containing `now`.
    pub fn time_step(&self, now: Timestamp) -> u64 {
        now.as_secs() / self.step_secs
    }

    /// Seconds until the code for `now` rotates.
    pub fn seconds_remaining(&self, now: Timestamp) -> u64 {
        self.step_secs - now.as_secs() % self.step_secs
    }

    /// Code for an explicit step counter.
    pub fn code_at_step(&self, secret: &TotpSecret, step: u64) -> Result<String, CryptoError> {
        let value = hotp(secret.as_bytes(), step, self.digits)?;
        Ok(format!("{:0width$}", value, width = self.digits as usize))
    }

    /// The code a broker's device shows at `now`.
    pub fn generate(&self, secret: &TotpSecret, now: Timestamp) -> Result<String, CryptoError> {
        self.code_at_step(secret, self.time_step(now))
    }

    /// Every code accepted at `now`: the current step and `skew_steps` on
    /// either side. Near the epoch the window is truncated, not wrapped.
    pub fn candidates(
        &self,
        secret: &TotpSecret,
        now: Timestamp,
    ) -> Result<Vec<String>, CryptoError> {
        let step = self.time_step(now);
        let first = step.saturating_sub(self.skew_steps);
        let last = step.saturating_add(self.skew_steps);
        (first..=last)
            .map(|s| self.code_at_step(secret, s))
            .collect()
    }

    /// Whether `submitted` matches one of the candidates at `now`.
    ///
    /// Malformed input (wrong length, non-digits) is rejected before any MAC
    /// is computed. All candidates are compared in constant time.
    pub fn verify(
        &self,
        secret: &TotpSecret,
        submitted: &str,
        now: Timestamp,
    ) -> Result<bool, CryptoError> {
        let submitted = submitted.trim();
        if submitted.len() != self.digits as usize
            || !submitted.bytes().all(|b| b.is_ascii_digit())
        {
            return Ok(false);
        }
        let mut matched = Choice::from(0);
        for candidate in self.candidates(secret, now)? {
            matched |= candidate.as_bytes().ct_eq(submitted.as_bytes());
        }
        Ok(matched.into())
    }

    /// `otpauth://` URI for enrolling the secret in an authenticator app.
    pub fn provisioning_uri(&self, secret: &TotpSecret, issuer: &str, account: &str) -> String {
        format!(
            "otpauth://totp/{issuer_enc}:{account_enc}?secret={secret}&issuer={issuer_enc}&algorithm=SHA1&digits={digits}&period={period}",
            issuer_enc = percent_encode(issuer),
            account_enc = percent_encode(account),
            secret = secret.to_base32(),
            digits = self.digits,
            period = self.step_secs,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rfc_secret() -> TotpSecret {
        TotpSecret::from_bytes(b"12345678901234567890".to_vec()).unwrap()
    }

    fn totp() -> Totp {
        Totp::new(30, 6, 1).unwrap()
    }

    #[test]
    fn rfc4226_hotp_vectors() {
        let expected = [
            755224, 287082, 359152, 969429, 338314, 254676, 287922, 162583, 399871, 520489,
        ];
        for (counter, want) in expected.iter().enumerate() {
            assert_eq!(hotp(b"12345678901234567890", counter as u64, 6).unwrap(), *want);
        }
    }

    #[test]
    fn rfc6238_sha1_vectors() {
        let eight = Totp::new(30, 8, 1).unwrap();
        let secret = rfc_secret();
        let cases = [
            (59, "94287082"),
            (1_111_111_109, "07081804"),
            (1_111_111_111, "14050471"),
            (1_234_567_890, "89005924"),
            (2_000_000_000, "69279037"),
            (20_000_000_000, "65353130"),
        ];
        for (t, want) in cases {
            assert_eq!(eight.generate(&secret, Timestamp::new(t)).unwrap(), want);
        }
    }

    #[test]
    fn six_digit_codes_are_zero_padded() {
        let code = totp()
            .generate(&rfc_secret(), Timestamp::new(1_234_567_890))
            .unwrap();
        assert_eq!(code, "005924");
    }

    #[test]
    fn exactly_three_candidates_mid_timeline() {
        let candidates = totp().candidates(&rfc_secret(), Timestamp::new(30_000)).unwrap();
        assert_eq!(candidates.len(), 3);
    }

    #[test]
    fn window_truncated_at_epoch() {
        let candidates = totp().candidates(&rfc_secret(), Timestamp::new(5)).unwrap();
        assert_eq!(candidates.len(), 2);
    }

    #[test]
    fn accepts_adjacent_steps_and_rejects_beyond() {
        let t = totp();
        let secret = rfc_secret();
        let issued = Timestamp::new(30_000);
        let code = t.generate(&secret, issued).unwrap();

        assert!(t.verify(&secret, &code, issued).unwrap());
        assert!(t.verify(&secret, &code, Timestamp::new(30_000 - 30)).unwrap());
        assert!(t.verify(&secret, &code, Timestamp::new(30_000 + 30)).unwrap());
        assert!(!t.verify(&secret, &code, Timestamp::new(30_000 + 60)).unwrap());
        assert!(!t.verify(&secret, &code, Timestamp::new(30_000 - 31)).unwrap());
    }

    #[test]
    fn any_candidate_in_the_window_matches_but_near_misses_do_not() {
        let t = totp();
        let secret = rfc_secret();
        let now = Timestamp::new(30_000);
        for candidate in t.candidates(&secret, now).unwrap() {
            assert!(t.verify(&secret, &candidate, now).unwrap(), "{candidate}");
            let last = candidate.as_bytes()[5];
            let flipped = if last == b'9' { '0' } else { (last + 1) as char };
            let near_miss = format!("{}{flipped}", &candidate[..5]);
            let in_window = t.candidates(&secret, now).unwrap().contains(&near_miss);
            assert_eq!(t.verify(&secret, &near_miss, now).unwrap(), in_window);
        }
    }

    #[test]
    fn malformed_submissions_never_match() {
        let t = totp();
        let secret = rfc_secret();
        let now = Timestamp::new(59);
        assert!(!t.verify(&secret, "", now).unwrap());
        assert!(!t.verify(&secret, "28708", now).unwrap());
        assert!(!t.verify(&secret, "2870822", now).unwrap());
        assert!(!t.verify(&secret, "28708a", now).unwrap());
        assert!(t.verify(&secret, " 287082 ", now).unwrap());
    }

    #[test]
    fn rejects_bad_parameters() {
        assert!(matches!(Totp::new(0, 6, 1), Err(CryptoError::InvalidStep)));
        assert!(matches!(Totp::new(30, 5, 1), Err(CryptoError::InvalidDigits(5))));
        assert!(matches!(Totp::new(30, 9, 1), Err(CryptoError::InvalidDigits(9))));
    }

    #[test]
    fn short_secrets_are_refused() {
        assert!(matches!(
            TotpSecret::from_bytes(vec![1; 8]),
            Err(CryptoError::SecretTooShort { len: 8, .. })
        ));
    }

    #[test]
    fn debug_output_is_redacted() {
        let rendered = format!("{:?}", rfc_secret());
        assert!(!rendered.contains("1234"));
        assert!(rendered.contains("redacted"));
    }

    #[test]
    fn seconds_remaining_counts_down_within_step() {
        let t = totp();
        assert_eq!(t.seconds_remaining(Timestamp::new(60)), 30);
        assert_eq!(t.seconds_remaining(Timestamp::new(89)), 1);
    }

    #[test]
    fn provisioning_uri_encodes_account() {
        let uri = totp().provisioning_uri(&rfc_secret(), "Nexus", "broker 7");
        assert!(uri.starts_with("otpauth://totp/Nexus:broker%207?"));
        assert!(uri.contains("secret=GEZDGNBVGY3TQOJQGEZDGNBVGY3TQOJQ"));
        assert!(uri.contains("digits=6&period=30"));
    }
}
