//! Liveness session brokering.
//!
//! The pipeline does not track liveness progress; it only forwards
//! session ids to the provider. Polling cadence belongs to the caller.

use crate::error::VerificationError;
use crate::provider::{BiometricProvider, LivenessResult};
use serde::{Deserialize, Serialize};

/// Request shape of the liveness endpoint, dispatched on `action`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum LivenessAction {
    Create,
    GetResults {
        #[serde(default, rename = "sessionId", alias = "session_id")]
        session_id: Option<String>,
    },
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LivenessReply {
    Created {
        #[serde(rename = "sessionId")]
        session_id: String,
    },
    Results(LivenessResult),
}

pub(crate) async fn dispatch(
    biometrics: &dyn BiometricProvider,
    action: LivenessAction,
) -> Result<LivenessReply, VerificationError> {
    match action {
        LivenessAction::Create => {
            let session_id = biometrics.create_liveness_session().await?;
            tracing::debug!(session = %session_id, "liveness session created");
            Ok(LivenessReply::Created { session_id })
        }
        LivenessAction::GetResults { session_id } => {
            let session_id = required_session_id(session_id.as_deref())?;
            let result = biometrics.get_liveness_result(session_id).await?;
            Ok(LivenessReply::Results(result))
        }
    }
}

/// Trimmed session id, or [`VerificationError::MissingSessionId`].
pub(crate) fn required_session_id(raw: Option<&str>) -> Result<&str, VerificationError> {
    match raw.map(str::trim) {
        Some(id) if !id.is_empty() => Ok(id),
        _ => Err(VerificationError::MissingSessionId),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn action_discriminator_parses() {
        let create: LivenessAction = serde_json::from_str(r#"{"action":"create"}"#).unwrap();
        assert_eq!(create, LivenessAction::Create);

        let get: LivenessAction =
            serde_json::from_str(r#"{"action":"get_results","sessionId":"s-1"}"#).unwrap();
        assert_eq!(
            get,
            LivenessAction::GetResults {
                session_id: Some("s-1".into())
            }
        );

        let bare: LivenessAction = serde_json::from_str(r#"{"action":"get_results"}"#).unwrap();
        assert_eq!(bare, LivenessAction::GetResults { session_id: None });
    }

    #[test]
    fn unknown_action_is_a_parse_error() {
        assert!(serde_json::from_str::<LivenessAction>(r#"{"action":"delete"}"#).is_err());
    }

    #[test]
    fn blank_session_id_is_missing() {
        assert!(matches!(
            required_session_id(None),
            Err(VerificationError::MissingSessionId)
        ));
        assert!(matches!(
            required_session_id(Some("   ")),
            Err(VerificationError::MissingSessionId)
        ));
        assert_eq!(required_session_id(Some(" s-9 ")).unwrap(), "s-9");
    }
}
