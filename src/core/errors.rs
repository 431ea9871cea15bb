// src/core/errors.rs

//! Defines the primary error type for the reconfiguration service.

use crate::core::NodeId;
use std::sync::Arc;
use thiserror::Error;

/// The main error enum for `quorumd`. Mirrors the way the application this
/// crate is modelled on centralizes its failures in one `thiserror` enum
/// with automatic `From` conversions for I/O and serialization failures.
#[derive(Error, Debug, Clone)]
pub enum ReconfError {
    #[error("IO error: {0}")]
    Io(Arc<std::io::Error>),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("failed to parse hosts file: {0}")]
    HostsFile(String),

    #[error("failed to decode wire message: {0}")]
    WireDecode(String),

    #[error("peer {0} is unreachable")]
    PeerUnreachable(NodeId),

    #[error("failed to bind listener: {0}")]
    Bind(Arc<std::io::Error>),

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<std::io::Error> for ReconfError {
    fn from(e: std::io::Error) -> Self {
        ReconfError::Io(Arc::new(e))
    }
}

impl From<serde_json::Error> for ReconfError {
    fn from(e: serde_json::Error) -> Self {
        ReconfError::WireDecode(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ReconfError>;
