//! Identity verification decision pipeline.
//!
//! Stages: upload-target issuance, document field extraction, liveness
//! session brokering, face-match decisioning and the aggregate verdict.
//! External collaborators (object store, OCR, biometrics) are reached only
//! through the traits in [`provider`].

pub mod blocks;
pub mod decision;
pub mod error;
pub mod extraction;
pub mod face_match;
pub mod liveness;
pub mod pipeline;
pub mod provider;
pub mod session;
pub mod upload;

pub use blocks::{Block, BlockKind, Relationship, RelationshipKind};
pub use decision::aggregate;
pub use error::{ProviderError, VerificationError};
pub use extraction::{extract_fields, FieldMap};
pub use face_match::{FaceComparison, Thresholds};
pub use liveness::{LivenessAction, LivenessReply};
pub use pipeline::{Providers, VerificationPipeline};
pub use provider::{BiometricProvider, DocumentAnalyzer, FaceMatch, LivenessResult, ObjectStore};
pub use session::VerificationSession;
pub use upload::{key_belongs_to, UploadTarget};
