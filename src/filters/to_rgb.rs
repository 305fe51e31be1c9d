//! Color space conversion to packed RGB.

use crate::core::context::FilterContext;
use crate::core::error::{ProcessError, ProcessResult, ProgramError, ProgramResult};
use crate::core::filter::{Filter, FilterDescriptor, Status};
use crate::core::format::{FrameFormat, StorageTarget};
use crate::core::port::PortSet;
use crate::core::program::{NativeProgram, Program};
use log::debug;

const RGB_BYTES_PER_SAMPLE: usize = 3;

/// Converts gray or RGBA frames to three-byte RGB frames.
///
/// Negotiation accepts any binary format; the sample width is checked in
/// `prepare`, where the native routine is selected: one byte per sample
/// binds `gray_to_rgb`, four bytes per sample binds `rgba_to_rgb`. Other
/// widths and non-native targets are fatal configuration errors.
///
/// The output format is re-derived from each pulled frame, so upstream
/// sources may late-bind or change dimensions between frames without
/// renegotiating.
#[derive(Default)]
pub struct ToRgbFilter {
    input_format: Option<FrameFormat>,
    output_format: Option<FrameFormat>,
    program: Option<Program>,
}

impl ToRgbFilter {
    /// Create a conversion filter with no negotiated format.
    pub fn new() -> Self {
        Self::default()
    }

    fn entry_point_for(&self, format: &FrameFormat) -> ProgramResult<&'static str> {
        if format.target() != StorageTarget::Native {
            return Err(ProgramError::UnsupportedBackend {
                filter: "to_rgb".to_string(),
                target: format.target(),
            });
        }
        match format.bytes_per_sample() {
            1 => Ok("gray_to_rgb"),
            4 => Ok("rgba_to_rgb"),
            other => Err(ProgramError::UnsupportedSampleWidth {
                filter: "to_rgb".to_string(),
                bytes_per_sample: other,
            }),
        }
    }
}

impl Filter for ToRgbFilter {
    fn descriptor(&self) -> FilterDescriptor {
        FilterDescriptor::new("to_rgb", "To RGB", "Converts gray or RGBA frames to RGB")
            .inputs(&["image"])
            .outputs(&["image"])
    }

    fn input_names(&self) -> &[&'static str] {
        &["image"]
    }

    fn output_names(&self) -> &[&'static str] {
        &["image"]
    }

    fn accepts_input_format(&mut self, _index: usize, format: &FrameFormat) -> bool {
        if !format.is_binary() {
            return false;
        }
        self.input_format = Some(*format);
        self.output_format = Some(format.with_bytes_per_sample(RGB_BYTES_PER_SAMPLE));
        // The accepted format supersedes any previously bound program.
        self.program = None;
        true
    }

    fn output_format(&self, _index: usize) -> Option<&FrameFormat> {
        self.output_format.as_ref()
    }

    fn prepare(&mut self, context: &FilterContext) -> ProgramResult<()> {
        let format = self
            .input_format
            .ok_or_else(|| ProgramError::FormatNotNegotiated {
                filter: "to_rgb".to_string(),
            })?;
        let entry_point = self.entry_point_for(&format)?;
        debug!(
            "to_rgb: {}B/sample input binds imageproc/{}",
            format.bytes_per_sample(),
            entry_point
        );
        let program = NativeProgram::new(context.natives(), "imageproc", entry_point)?;
        self.program = Some(Program::Native(program));
        Ok(())
    }

    fn process(&mut self, context: &FilterContext, ports: &mut PortSet) -> ProcessResult<Status> {
        let program = self.program.as_ref().ok_or(ProcessError::NotPrepared {
            filter: "to_rgb".to_string(),
        })?;

        let input = ports.pull(0)?;
        // Dimensions come from the frame actually pulled, not from the
        // negotiated descriptor.
        let out_format = input
            .format()
            .with_bytes_per_sample(RGB_BYTES_PER_SAMPLE);
        let mut output = context.frames().allocate(out_format)?;

        program.run(std::slice::from_ref(&input), &mut output)?;
        drop(input);

        ports.push(0, output)?;
        Ok(Status::WAIT_FOR_ALL_INPUTS | Status::WAIT_FOR_FREE_OUTPUTS)
    }
}
