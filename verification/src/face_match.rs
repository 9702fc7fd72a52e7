//! Face-match threshold decisioning.

use crate::provider::FaceMatch;
use nexus_types::{VerificationOutcome, VerificationParams};
use serde::{Deserialize, Serialize};

/// Result of one face comparison.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct FaceComparison {
    pub outcome: VerificationOutcome,
    /// Similarity of the best candidate, if any was returned.
    pub similarity: Option<f32>,
}

/// Similarity thresholds for the decision table.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Thresholds {
    pub verified: f32,
    pub review: f32,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            verified: 90.0,
            review: 80.0,
        }
    }
}

impl From<&VerificationParams> for Thresholds {
    fn from(params: &VerificationParams) -> Self {
        Self {
            verified: params.verified_threshold,
            review: params.review_threshold,
        }
    }
}

impl Thresholds {
    /// Map a similarity score onto `verified`, `review` or `rejected`.
    pub fn classify(&self, similarity: f32) -> VerificationOutcome {
        if similarity >= self.verified {
            VerificationOutcome::Verified
        } else if similarity >= self.review {
            VerificationOutcome::Review
        } else {
            // Unreachable while the provider applies the review floor itself.
            VerificationOutcome::Rejected
        }
    }

    /// Decide on the best (first) candidate; no candidate is `no_match`.
    pub fn decide(&self, matches: &[FaceMatch]) -> FaceComparison {
        match matches.first() {
            None => FaceComparison {
                outcome: VerificationOutcome::NoMatch,
                similarity: None,
            },
            Some(best) => FaceComparison {
                outcome: self.classify(best.similarity),
                similarity: Some(best.similarity),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use VerificationOutcome::*;

    fn one(similarity: f32) -> Vec<FaceMatch> {
        vec![FaceMatch { similarity }]
    }

    #[test]
    fn decision_table() {
        let t = Thresholds::default();
        assert_eq!(t.decide(&one(95.0)).outcome, Verified);
        assert_eq!(t.decide(&one(85.0)).outcome, Review);
        assert_eq!(t.decide(&one(70.0)).outcome, Rejected);
        assert_eq!(t.decide(&[]).outcome, NoMatch);
        assert_eq!(t.decide(&[]).similarity, None);
    }

    #[test]
    fn boundaries_are_inclusive_from_below() {
        let t = Thresholds::default();
        assert_eq!(t.classify(90.0), Verified);
        assert_eq!(t.classify(89.99), Review);
        assert_eq!(t.classify(80.0), Review);
        assert_eq!(t.classify(79.99), Rejected);
    }

    #[test]
    fn only_the_first_candidate_counts() {
        let t = Thresholds::default();
        let matches = vec![FaceMatch { similarity: 82.0 }, FaceMatch { similarity: 99.0 }];
        let cmp = t.decide(&matches);
        assert_eq!(cmp.outcome, Review);
        assert_eq!(cmp.similarity, Some(82.0));
    }

    #[test]
    fn thresholds_follow_params() {
        let params = VerificationParams {
            verified_threshold: 97.0,
            review_threshold: 85.0,
            ..Default::default()
        };
        let t = Thresholds::from(&params);
        assert_eq!(t.classify(95.0), Review);
        assert_eq!(t.classify(84.0), Rejected);
    }
}
