//! Common types, protocol definitions, and errors shared across `registry-mediator` crates.

pub mod error;
pub mod protocol;

pub use error::AdmissionRejected;
