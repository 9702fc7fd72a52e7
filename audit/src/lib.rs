//! Audit and status projection.
//!
//! Both the pairing engine and the verification pipeline write here:
//! - the **activity log** is append-only and read newest first;
//! - the **status projection** is the single read-side answer to "may this
//!   user proceed", derived from pairing rows and recorded verification
//!   outcomes. It never writes pairing state.

pub mod error;
pub mod log;
pub mod projection;

pub use error::AuditError;
pub use log::{Activity, ActivityLog, Actor, DEFAULT_ACTIVITY_LIMIT};
pub use projection::StatusProjection;
