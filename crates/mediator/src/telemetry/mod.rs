//! Structured logging and optional span export.
//!
//! Logs are JSON lines on stdout. When `OTEL_EXPORTER_OTLP_ENDPOINT` is set,
//! spans are also exported over OTLP/gRPC.
//!
//! No credential (bearer token, hub password, token secret) may appear in a
//! span attribute or log field.

pub mod init;

pub use init::init_telemetry;
