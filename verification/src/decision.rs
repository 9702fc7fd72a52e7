//! Aggregate verdict over the pipeline stages.

use nexus_types::{LivenessStatus, VerificationOutcome};

/// Combine the liveness state, the extracted field count and the
/// face-compare outcome into the reported verdict.
///
/// | liveness | fields | face | verdict |
/// |---|---|---|---|
/// | not terminal | any | any | `pending` |
/// | failed | any | any | `rejected` |
/// | succeeded | non-empty | `x` | `x` |
/// | succeeded | empty | `verified` | `review` |
/// | succeeded | empty | other `x` | `x` |
pub fn aggregate(
    liveness: LivenessStatus,
    field_count: usize,
    face: VerificationOutcome,
) -> VerificationOutcome {
    match liveness {
        LivenessStatus::Created | LivenessStatus::InProgress => VerificationOutcome::Pending,
        LivenessStatus::Failed => VerificationOutcome::Rejected,
        LivenessStatus::Succeeded => document_gate(field_count, face),
    }
}

/// `verified` requires a non-empty field map; an unreadable document with a
/// matching face goes to a human.
pub fn document_gate(field_count: usize, face: VerificationOutcome) -> VerificationOutcome {
    match face {
        VerificationOutcome::Verified if field_count == 0 => VerificationOutcome::Review,
        other => other,
    }
}
