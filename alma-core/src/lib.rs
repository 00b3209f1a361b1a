//! ALMA Core - Institution Record Model
//!
//! Shared types for the institution resolution cache: the [`Institution`]
//! value, its normalization and document-key rules, the error taxonomy and
//! the configuration surface. No I/O lives here.

pub mod config;
pub mod constants;
pub mod error;
pub mod institution;

pub use config::{AlmaConfig, ResolverConfig, SourceConfig, StoreConfig};
pub use error::{
    invalid_response, rate_limited, request_failed, AlmaError, AlmaResult, ConfigError,
    SourceError, StorageError,
};
pub use institution::{derive_document_key, document_key, normalize_record, Institution};
