//! Concrete implementations of the verification pipeline's collaborators.
//!
//! - [`FsObjectStore`]: blobs on local disk behind HMAC-signed, single-use
//!   upload URLs served by the daemon's `PUT /objects/{key}` sink
//! - [`HttpDocumentAnalyzer`] and [`HttpBiometricProvider`]: JSON clients
//!   for the OCR and face-biometrics gateways

pub mod error;
pub mod fs;
pub mod http;

pub use error::UploadError;
pub use fs::{FsObjectStore, SignedUpload};
pub use http::{GatewayClient, HttpBiometricProvider, HttpDocumentAnalyzer};
