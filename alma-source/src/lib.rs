//! ALMA Source - External Institution Lookup
//!
//! The last resolver tier: a time-bounded call to a third-party lookup API.
//! [`HttpTransport`] speaks HTTP with client-side rate limiting;
//! [`ExternalSourceClient`] enforces the timeout and normalizes the loosely
//! shaped response into [`alma_core::Institution`] records.

pub mod client;
pub mod http;
pub mod transport;

pub use client::ExternalSourceClient;
pub use http::HttpTransport;
pub use transport::SourceTransport;
