//! Core types and traits for the chitra pipeline runtime.
//!
//! This module contains the foundational pieces every filter builds on:
//! - Frame formats and negotiation rules
//! - Reference-counted frames and the budgeted allocator
//! - Backend programs (native routines and shader sources)
//! - The filter contract and its scheduling status bits
//! - Ports, edges, and the per-stage lifecycle
//! - Error types
//! - The shared execution context

pub mod context;
pub mod error;
pub mod filter;
pub mod format;
pub mod frame;
pub mod port;
pub mod program;

// Re-export commonly used types
pub use context::{FilterContext, FilterContextBuilder};
pub use error::{
    ChitraError, ChitraResult, NegotiationError, ProcessError, ProgramError,
};
pub use filter::{Filter, FilterDescriptor, FilterState, Status};
pub use format::{DataKind, FrameFormat, StorageTarget};
pub use frame::{Frame, FrameManager};
pub use port::{FrameQueue, PortSet, Stage};
pub use program::{HostValue, NativeLibrary, Program, ShaderRuntime};
