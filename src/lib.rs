//! # Chitra - Pull-based Frame Filtering
//!
//! Chitra is a filter-node runtime for streaming image data. Filters
//! declare fixed input and output ports, negotiate frame formats across
//! edges, bind a backend program once per negotiation, and then move
//! reference-counted frames through non-blocking queues under the control
//! of an external scheduler.
//!
//! ## Features
//!
//! - **Format Negotiation**: Filters accept or reject offered formats per
//!   port; an accepted format pins the output format derivation
//! - **Polymorphic Backends**: A bound program is either a native routine
//!   or a shader handed to a pluggable runtime, chosen once in `prepare`
//! - **Budgeted Frames**: Reference-counted frames drawn from an
//!   allocator with a byte budget; dropping the last handle returns the
//!   reservation
//! - **Cooperative Scheduling**: `process` never blocks and reports what
//!   it is waiting on through status bits
//! - **Extensible**: Add filters by implementing the [`Filter`] trait and
//!   registering a factory
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use chitra::prelude::*;
//!
//! // Create a filter registry with built-in filters
//! let registry = FilterRegistry::with_builtins();
//! let context = FilterContext::builder().frame_budget(64 << 20).build();
//!
//! // Wrap filters in stages and negotiate the source format
//! let mut convert = Stage::new(registry.create("to_rgb").unwrap());
//! let mut sink = Stage::new(registry.create("null").unwrap());
//!
//! let format = FrameFormat::binary(4, StorageTarget::Native).with_dimensions(640, 480);
//! convert.negotiate_input("image", &format).unwrap();
//! Stage::connect(&mut convert, "image", &mut sink, "frame").unwrap();
//!
//! // Bind programs, then let the scheduler drive processing
//! convert.prepare(&context).unwrap();
//! sink.prepare(&context).unwrap();
//!
//! convert.feed("image", context.frames().allocate(format).unwrap()).unwrap();
//! let status = convert.process(&context).unwrap();
//! assert!(status.contains(Status::WAIT_FOR_ALL_INPUTS));
//! ```
//!
//! ## Architecture
//!
//! The library is organized into two modules:
//!
//! - [`core`]: formats, frames, programs, ports, the filter contract, and
//!   error handling
//! - [`filters`]: the filter registry and built-in filters
//!
//! ## Creating Custom Filters
//!
//! Implement the [`Filter`] trait to create custom filters:
//!
//! ```rust,ignore
//! use chitra::prelude::*;
//!
//! struct Threshold {
//!     format: Option<FrameFormat>,
//! }
//!
//! impl Filter for Threshold {
//!     fn descriptor(&self) -> FilterDescriptor {
//!         FilterDescriptor::new("threshold", "Threshold", "Binarizes gray frames")
//!             .inputs(&["image"])
//!             .outputs(&["image"])
//!     }
//!
//!     fn input_names(&self) -> &[&'static str] {
//!         &["image"]
//!     }
//!
//!     fn output_names(&self) -> &[&'static str] {
//!         &["image"]
//!     }
//!
//!     fn accepts_input_format(&mut self, _index: usize, format: &FrameFormat) -> bool {
//!         if format.bytes_per_sample() != 1 {
//!             return false;
//!         }
//!         self.format = Some(*format);
//!         true
//!     }
//!
//!     fn output_format(&self, _index: usize) -> Option<&FrameFormat> {
//!         self.format.as_ref()
//!     }
//!
//!     fn prepare(&mut self, _context: &FilterContext) -> ProgramResult<()> {
//!         Ok(())
//!     }
//!
//!     fn process(&mut self, context: &FilterContext, ports: &mut PortSet) -> ProcessResult<Status> {
//!         let input = ports.pull(0)?;
//!         let mut output = context.frames().allocate(*input.format())?;
//!         // Threshold input into output...
//!         ports.push(0, output)?;
//!         Ok(Status::WAIT_FOR_ALL_INPUTS | Status::WAIT_FOR_FREE_OUTPUTS)
//!     }
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod core;
pub mod filters;

/// Prelude module for convenient imports.
///
/// Import everything commonly needed with:
/// ```rust,ignore
/// use chitra::prelude::*;
/// ```
pub mod prelude {
    // Formats and frames
    pub use crate::core::format::{DataKind, FrameFormat, StorageTarget};
    pub use crate::core::frame::{Frame, FrameManager};

    // Filter contract
    pub use crate::core::filter::{Filter, FilterDescriptor, FilterState, Status};

    // Programs
    pub use crate::core::program::{
        HostValue, NativeLibrary, NativeProgram, Program, ShaderProgram, ShaderRuntime,
    };

    // Ports and stages
    pub use crate::core::port::{FrameQueue, PortSet, Stage};

    // Context
    pub use crate::core::context::{FilterContext, FilterContextBuilder};

    // Errors
    pub use crate::core::error::{
        ChitraError, ChitraResult, NegotiationError, NegotiationResult, ProcessError,
        ProcessResult, ProgramError, ProgramResult,
    };

    // Filters
    pub use crate::filters::registry::{FilterFactory, FilterRegistry, RegistryEntry};

    // Built-in filters
    pub use crate::filters::{AlphaBlendFilter, NullFilter, ToRgbFilter};
}

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name.
pub const NAME: &str = env!("CARGO_PKG_NAME");
