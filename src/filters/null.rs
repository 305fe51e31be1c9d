//! Null sink: drains one input port and produces nothing.

use crate::core::context::FilterContext;
use crate::core::error::{ProcessResult, ProgramResult};
use crate::core::filter::{Filter, FilterDescriptor, Status};
use crate::core::format::FrameFormat;
use crate::core::port::PortSet;
use log::trace;

/// A sink that accepts any format and drops every frame it pulls.
///
/// Useful as a pipeline terminator and for draining taps during
/// debugging. The accepted format is recorded but otherwise unused.
#[derive(Debug, Default)]
pub struct NullFilter {
    format: Option<FrameFormat>,
}

impl NullFilter {
    /// Create a null sink.
    pub fn new() -> Self {
        Self::default()
    }
}

impl Filter for NullFilter {
    fn descriptor(&self) -> FilterDescriptor {
        FilterDescriptor::new("null", "Null", "Consumes frames without producing output")
            .inputs(&["frame"])
    }

    fn input_names(&self) -> &[&'static str] {
        &["frame"]
    }

    fn output_names(&self) -> &[&'static str] {
        &[]
    }

    fn accepts_input_format(&mut self, _index: usize, format: &FrameFormat) -> bool {
        self.format = Some(*format);
        true
    }

    fn output_format(&self, _index: usize) -> Option<&FrameFormat> {
        None
    }

    fn prepare(&mut self, _context: &FilterContext) -> ProgramResult<()> {
        Ok(())
    }

    fn process(&mut self, _context: &FilterContext, ports: &mut PortSet) -> ProcessResult<Status> {
        let frame = ports.pull(0)?;
        trace!("null sink dropped {} byte frame", frame.len());
        drop(frame);
        Ok(Status::WAIT_FOR_ALL_INPUTS)
    }
}
