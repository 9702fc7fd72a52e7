//! Participant and record identifiers.
//!
//! Ids are opaque strings issued by the identity provider (users) or by the
//! store (requests). Each kind gets its own newtype so an agent id can never
//! be passed where a broker id is expected.

use crate::error::ParseError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Ids are embedded in storage keys, so they must stay a single path segment.
fn is_path_safe(id: &str) -> bool {
    !id.contains("..") && !id.chars().any(|c| c == '/' || c == '\\' || c.is_control())
}

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Wrap a raw id, rejecting empty input and anything that could
            /// split a storage path: separators, `..` or control characters.
            pub fn parse(raw: impl Into<String>) -> Result<Self, ParseError> {
                let raw = raw.into();
                let trimmed = raw.trim();
                if trimmed.is_empty() {
                    return Err(ParseError::EmptyId);
                }
                if !is_path_safe(trimmed) {
                    return Err(ParseError::InvalidId(trimmed.to_string()));
                }
                Ok(Self(trimmed.to_string()))
            }

            /// Wrap a raw id without validation (tests and trusted call sites).
            pub fn new(raw: impl Into<String>) -> Self {
                Self(raw.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

string_id!(
    /// Any authenticated user of the platform.
    UserId
);
string_id!(
    /// A field agent who pairs with a broker.
    AgentId
);
string_id!(
    /// A supervising broker who owns a nexus link.
    BrokerId
);
string_id!(
    /// Identifier of a pairing request row.
    RequestId
);

impl From<AgentId> for UserId {
    fn from(id: AgentId) -> Self {
        Self(id.0)
    }
}

impl From<BrokerId> for UserId {
    fn from(id: BrokerId) -> Self {
        Self(id.0)
    }
}

/// Short, human-presentable code a broker shares out-of-band.
///
/// Codes compare case-insensitively: the inner value is always stored
/// upper-cased and trimmed.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NexusCode(String);

impl NexusCode {
    /// Normalize a user-entered code (trim, upper-case).
    pub fn normalize(raw: &str) -> Self {
        Self(raw.trim().to_ascii_uppercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for NexusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
