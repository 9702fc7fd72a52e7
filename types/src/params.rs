//! Tunable parameters for the pairing engine and the verification pipeline.
//!
//! Both structs deserialize from the `[pairing]` and `[verification]`
//! sections of the daemon configuration; every field has a default.

use serde::{Deserialize, Serialize};

/// Upper bound on upload credential lifetime, regardless of configuration.
pub const MAX_UPLOAD_TTL_SECS: u64 = 300;

/// Parameters for TOTP pairing.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PairingParams {
    /// Length of one TOTP time step in seconds.
    pub step_secs: u64,
    /// Number of decimal digits in a generated code.
    pub digits: u32,
    /// Steps accepted on either side of the current one.
    pub skew_steps: u64,
    /// Length of the human-presentable nexus code.
    pub nexus_code_len: usize,
    /// Size of the shared TOTP secret in bytes.
    pub secret_len: usize,
    /// Issuer label in provisioning URIs.
    pub issuer: String,
}

impl Default for PairingParams {
    fn default() -> Self {
        Self {
            step_secs: 30,
            digits: 6,
            skew_steps: 1,
            nexus_code_len: 6,
            secret_len: 20,
            issuer: "Nexus".to_string(),
        }
    }
}

/// Parameters for the identity-verification decision pipeline.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VerificationParams {
    /// Similarity at or above which a face match is `verified`.
    pub verified_threshold: f32,
    /// Similarity at or above which a face match goes to `review`.
    /// Also sent to the provider as its similarity floor.
    pub review_threshold: f32,
    /// Requested lifetime of upload credentials (clamped to 300 s).
    pub upload_ttl_secs: u64,
}

impl VerificationParams {
    /// Upload credential lifetime after clamping.
    pub fn effective_upload_ttl(&self) -> u64 {
        self.upload_ttl_secs.clamp(1, MAX_UPLOAD_TTL_SECS)
    }
}

impl Default for VerificationParams {
    fn default() -> Self {
        Self {
            verified_threshold: 90.0,
            review_threshold: 80.0,
            upload_ttl_secs: MAX_UPLOAD_TTL_SECS,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upload_ttl_never_exceeds_five_minutes() {
        let params = VerificationParams {
            upload_ttl_secs: 3_600,
            ..Default::default()
        };
        assert_eq!(params.effective_upload_ttl(), MAX_UPLOAD_TTL_SECS);
    }

    #[test]
    fn zero_ttl_is_raised_to_one_second() {
        let params = VerificationParams {
            upload_ttl_secs: 0,
            ..Default::default()
        };
        assert_eq!(params.effective_upload_ttl(), 1);
    }

    #[test]
    fn defaults_match_decision_thresholds() {
        let params = VerificationParams::default();
        assert_eq!(params.verified_threshold, 90.0);
        assert_eq!(params.review_threshold, 80.0);
        let pairing = PairingParams::default();
        assert_eq!((pairing.step_secs, pairing.digits, pairing.skew_steps), (30, 6, 1));
    }
}
