//! Error types for chitra.
//!
//! Errors are split by pipeline phase: negotiation failures are recoverable
//! at the edge that offered the format, program binding failures are fatal
//! configuration errors, and processing failures abort the invocation.
//! The top-level enum aggregates all of them for callers that do not care
//! about the phase.

use crate::core::format::{FrameFormat, StorageTarget};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Top-level error type for chitra.
#[derive(Error, Debug)]
pub enum ChitraError {
    #[error("Negotiation error: {0}")]
    Negotiation(#[from] NegotiationError),

    #[error("Program error: {0}")]
    Program(#[from] ProgramError),

    #[error("Processing error: {0}")]
    Process(#[from] ProcessError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

/// Errors raised while negotiating formats and wiring edges.
#[derive(Error, Debug, Clone, Serialize, Deserialize)]
pub enum NegotiationError {
    #[error("filter '{filter}' rejected format {offered} on input '{port}'")]
    Rejected {
        filter: String,
        port: String,
        offered: FrameFormat,
    },

    #[error("output format on port '{port}' of filter '{filter}' is not defined yet")]
    OutputUndefined { filter: String, port: String },

    #[error("filter '{filter}' has no port named '{port}'")]
    UnknownPort { filter: String, port: String },

    #[error("port '{port}' on filter '{filter}' is already connected")]
    PortAlreadyConnected { filter: String, port: String },
}

impl NegotiationError {
    /// Whether the graph layer can recover by choosing a different wiring.
    ///
    /// A format rejection leaves the filter untouched; the other variants
    /// indicate wiring bugs.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, NegotiationError::Rejected { .. })
    }
}

/// Errors raised while binding a backend program in `prepare` or while
/// updating its host values.
#[derive(Error, Debug, Clone, Serialize, Deserialize)]
pub enum ProgramError {
    #[error("filter '{filter}' has no program for target {target}")]
    UnsupportedBackend {
        filter: String,
        target: StorageTarget,
    },

    #[error("filter '{filter}' cannot convert from {bytes_per_sample} bytes per sample")]
    UnsupportedSampleWidth {
        filter: String,
        bytes_per_sample: usize,
    },

    #[error("filter '{filter}' has no accepted input format")]
    FormatNotNegotiated { filter: String },

    #[error("native routine '{module}/{entry_point}' is not registered")]
    UnknownRoutine { module: String, entry_point: String },

    #[error("program has no host value named '{0}'")]
    UnknownHostValue(String),

    #[error("filter has no parameter named '{0}'")]
    UnknownParameter(String),
}

/// Errors raised inside a `process` invocation.
#[derive(Error, Debug, Clone, Serialize, Deserialize)]
pub enum ProcessError {
    #[error("frame allocation of {requested} bytes exceeds budget: {in_use}/{budget} bytes in use")]
    ResourceExhaustion {
        requested: usize,
        in_use: usize,
        budget: usize,
    },

    #[error("input port '{port}' has no buffered frame")]
    InputExhausted { port: String },

    #[error("port '{port}' is not connected")]
    PortDisconnected { port: String },

    #[error("port index {index} is out of range")]
    PortOutOfRange { index: usize },

    #[error("filter '{filter}' was not prepared before processing")]
    NotPrepared { filter: String },

    #[error("output frame is shared and cannot be written")]
    OutputShared,

    #[error("payload is {actual} bytes, expected {expected}")]
    PayloadMismatch { expected: usize, actual: usize },

    #[error("shader execution failed: {0}")]
    ShaderExecution(String),
}

impl ProcessError {
    /// Whether this failure came from the allocator budget.
    pub fn is_resource_exhaustion(&self) -> bool {
        matches!(self, ProcessError::ResourceExhaustion { .. })
    }
}

/// Result type alias for chitra operations.
pub type ChitraResult<T> = Result<T, ChitraError>;

/// Result type alias for negotiation operations.
pub type NegotiationResult<T> = Result<T, NegotiationError>;

/// Result type alias for program binding operations.
pub type ProgramResult<T> = Result<T, ProgramError>;

/// Result type alias for processing operations.
pub type ProcessResult<T> = Result<T, ProcessError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejection_is_recoverable() {
        let err = NegotiationError::Rejected {
            filter: "alpha_blend".to_string(),
            port: "source".to_string(),
            offered: FrameFormat::binary(3, StorageTarget::Native),
        };
        assert!(err.is_recoverable());

        let err = NegotiationError::OutputUndefined {
            filter: "to_rgb".to_string(),
            port: "image".to_string(),
        };
        assert!(!err.is_recoverable());
    }

    #[test]
    fn test_top_level_conversion() {
        let err: ChitraError = ProgramError::UnknownRoutine {
            module: "imageproc".to_string(),
            entry_point: "missing".to_string(),
        }
        .into();
        assert!(matches!(err, ChitraError::Program(_)));
    }

    #[test]
    fn test_exhaustion_classification() {
        let err = ProcessError::ResourceExhaustion {
            requested: 1024,
            in_use: 512,
            budget: 1024,
        };
        assert!(err.is_resource_exhaustion());
        assert!(!ProcessError::OutputShared.is_resource_exhaustion());
    }
}
