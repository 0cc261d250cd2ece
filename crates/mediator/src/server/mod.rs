//! HTTP(S) server: listener, routing, and the mediator's own handlers.
//!
//! # Responsibilities
//! - Terminate TLS (rustls) and attach the client certificate to requests.
//! - Define the Axum router, with every route behind the admission gate.
//! - Inject shared application state (`AppState`) into handlers.

pub mod handlers;
pub mod listener;
pub mod router;
pub mod state;
pub mod tls;
