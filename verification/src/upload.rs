//! Upload-target issuance: single-use, time-boxed write credentials.

use crate::error::VerificationError;
use nexus_crypto::random_token;
use nexus_types::{Timestamp, UserId};
use rand::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};

/// Bytes of entropy in the random key suffix.
pub const KEY_ENTROPY_BYTES: usize = 16;

const MAX_DOCUMENT_TYPE_LEN: usize = 64;

/// A credential the caller uses to write one object directly to storage.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadTarget {
    pub url: String,
    pub key: String,
    pub expires_at: Timestamp,
}

/// Key prefix reserved for a user's uploads.
pub fn user_prefix(user: &UserId) -> String {
    format!("temp/{}/", user)
}

/// Whether `key` is an object directly under the user's upload prefix.
///
/// Issued keys are `{documentType}-{hex}`, so anything nested deeper than
/// one segment belongs to a different namespace.
pub fn key_belongs_to(key: &str, user: &UserId) -> bool {
    if user.as_str().contains('/') {
        return false;
    }
    key.strip_prefix(&user_prefix(user)).is_some_and(|rest| {
        !rest.is_empty() && !rest.contains('/') && !rest.contains("..")
    })
}

pub(crate) fn validate_document_type(document_type: &str) -> Result<(), VerificationError> {
    let ok = !document_type.is_empty()
        && document_type.len() <= MAX_DOCUMENT_TYPE_LEN
        && document_type
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_');
    if ok {
        Ok(())
    } else {
        Err(VerificationError::Validation(format!(
            "documentType must be 1-{MAX_DOCUMENT_TYPE_LEN} characters of [A-Za-z0-9_-]"
        )))
    }
}

pub(crate) fn validate_content_type(content_type: &str) -> Result<(), VerificationError> {
    let lowered = content_type.trim().to_ascii_lowercase();
    let ok = match lowered.split_once('/') {
        Some(("image", subtype)) => {
            !subtype.is_empty()
                && subtype
                    .bytes()
                    .all(|b| b.is_ascii_alphanumeric() || b"+-.".contains(&b))
        }
        Some(("application", "pdf")) => true,
        _ => false,
    };
    if ok {
        Ok(())
    } else {
        Err(VerificationError::Validation(
            "contentType must be image/* or application/pdf".into(),
        ))
    }
}

/// Build a fresh, unguessable storage key in the user's namespace.
pub(crate) fn new_upload_key<R: RngCore + CryptoRng>(
    rng: &mut R,
    user: &UserId,
    document_type: &str,
) -> String {
    format!(
        "{}{}-{}",
        user_prefix(user),
        document_type,
        random_token(rng, KEY_ENTROPY_BYTES)
    )
}

/// Validate upload inputs and mint the storage key they will be written to.
pub(crate) fn prepare<R: RngCore + CryptoRng>(
    rng: &mut R,
    user: &UserId,
    document_type: &str,
    content_type: &str,
) -> Result<String, VerificationError> {
    validate_document_type(document_type)?;
    validate_content_type(content_type)?;
    Ok(new_upload_key(rng, user, document_type))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn document_type_charset() {
        assert!(validate_document_type("passport").is_ok());
        assert!(validate_document_type("drivers_license-front").is_ok());
        assert!(validate_document_type("").is_err());
        assert!(validate_document_type("../etc").is_err());
        assert!(validate_document_type("id card").is_err());
        assert!(validate_document_type(&"a".repeat(65)).is_err());
    }

    #[test]
    fn content_type_allow_list() {
        assert!(validate_content_type("image/jpeg").is_ok());
        assert!(validate_content_type("IMAGE/PNG").is_ok());
        assert!(validate_content_type("image/svg+xml").is_ok());
        assert!(validate_content_type("application/pdf").is_ok());
        assert!(validate_content_type("application/zip").is_err());
        assert!(validate_content_type("image/").is_err());
        assert!(validate_content_type("text/html").is_err());
    }

    #[test]
    fn keys_are_namespaced_and_unpredictable() {
        let mut rng = StdRng::seed_from_u64(11);
        let user = UserId::new("u-42");
        let a = new_upload_key(&mut rng, &user, "passport");
        let b = new_upload_key(&mut rng, &user, "passport");
        assert!(a.starts_with("temp/u-42/passport-"));
        assert_eq!(a.len(), "temp/u-42/passport-".len() + KEY_ENTROPY_BYTES * 2);
        assert_ne!(a, b);
        assert!(key_belongs_to(&a, &user));
    }

    #[test]
    fn ownership_is_prefix_based() {
        let user = UserId::new("u1");
        assert!(key_belongs_to("temp/u1/passport-ab", &user));
        assert!(!key_belongs_to("temp/u10/passport-ab", &user));
        assert!(!key_belongs_to("temp/u1/", &user));
        assert!(!key_belongs_to("temp/u1/../u2/x", &user));
        assert!(!key_belongs_to("other/u1/x", &user));
    }

    #[test]
    fn nested_namespaces_are_not_owned_by_the_parent() {
        let mut rng = StdRng::seed_from_u64(5);
        let nested = UserId::new("u1/x");
        let key = new_upload_key(&mut rng, &nested, "passport");
        assert!(key.starts_with("temp/u1/x/passport-"));
        assert!(!key_belongs_to(&key, &UserId::new("u1")));
        assert!(!key_belongs_to(&key, &nested));
        assert!(UserId::parse("u1/x").is_err());
    }
}
