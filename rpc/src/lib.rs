//! HTTP surface for the Nexus trust subsystem.
//!
//! Exposes:
//! - Broker provisioning, live code display and request approval
//! - Agent pairing attempts and the one-time cancellation
//! - The identity verification stages and the full decision run
//! - Status and activity projections
//! - The signed upload sink for the filesystem object store
//!
//! Caller identity is asserted by the upstream identity provider through the
//! `x-nexus-user` and `x-nexus-role` headers.

pub mod body;
pub mod caller;
pub mod error;
pub mod handlers;
pub mod server;

pub use body::JsonBody;
pub use caller::{Caller, ROLE_HEADER, USER_HEADER};
pub use error::RpcError;
pub use server::{build_router, AppState, RpcServer};
