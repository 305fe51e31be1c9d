//! Alpha blending of two RGBA streams through a mask.

use crate::core::context::FilterContext;
use crate::core::error::{ProcessError, ProcessResult, ProgramError, ProgramResult};
use crate::core::filter::{Filter, FilterDescriptor, Status};
use crate::core::format::{FrameFormat, StorageTarget};
use crate::core::port::PortSet;
use crate::core::program::{shaders, HostValue, Program, ShaderProgram};
use log::debug;

const INPUTS: [&str; 3] = ["source", "overlay", "mask"];

/// Blends `source` and `overlay` per sample, scaling the mask's alpha by
/// the `weight` parameter.
///
/// All three inputs must negotiate four-byte binary samples on the GPU
/// target with mutually compatible dimensions. The output format is fixed
/// at negotiation time from the `source` port; per-frame dimension
/// changes require renegotiation.
pub struct AlphaBlendFilter {
    formats: [Option<FrameFormat>; 3],
    weight: HostValue,
    program: Option<Program>,
}

impl Default for AlphaBlendFilter {
    fn default() -> Self {
        Self {
            formats: [None; 3],
            weight: HostValue::Float(1.0),
            program: None,
        }
    }
}

impl AlphaBlendFilter {
    /// Create a blend filter with the default weight of 1.0.
    pub fn new() -> Self {
        Self::default()
    }
}

impl Filter for AlphaBlendFilter {
    fn descriptor(&self) -> FilterDescriptor {
        FilterDescriptor::new(
            "alpha_blend",
            "Alpha Blend",
            "Blends two RGBA streams through a mask on the GPU",
        )
        .inputs(&INPUTS)
        .outputs(&["blended"])
        .parameters(&["weight"])
    }

    fn input_names(&self) -> &[&'static str] {
        &INPUTS
    }

    fn output_names(&self) -> &[&'static str] {
        &["blended"]
    }

    fn accepts_input_format(&mut self, index: usize, format: &FrameFormat) -> bool {
        if index >= INPUTS.len()
            || !format.is_binary()
            || format.bytes_per_sample() != 4
            || format.target() != StorageTarget::Gpu
        {
            return false;
        }
        // Dimensions must line up with every port negotiated so far.
        let conflict = self
            .formats
            .iter()
            .enumerate()
            .any(|(i, accepted)| {
                i != index && accepted.is_some_and(|f| !f.compatible_with(format))
            });
        if conflict {
            return false;
        }
        self.formats[index] = Some(*format);
        self.program = None;
        true
    }

    fn output_format(&self, index: usize) -> Option<&FrameFormat> {
        if index != 0 {
            return None;
        }
        self.formats[0].as_ref()
    }

    fn prepare(&mut self, context: &FilterContext) -> ProgramResult<()> {
        if self.formats.iter().any(Option::is_none) {
            return Err(ProgramError::FormatNotNegotiated {
                filter: "alpha_blend".to_string(),
            });
        }
        let runtime = context.require_shader_runtime("alpha_blend")?;
        let mut program = ShaderProgram::new(shaders::ALPHA_BLEND, runtime);
        program.set_host_value("weight", self.weight);
        debug!("alpha_blend bound shader program with weight {:?}", self.weight);
        self.program = Some(Program::Shader(program));
        Ok(())
    }

    fn set_parameter(&mut self, name: &str, value: HostValue) -> ProgramResult<()> {
        if name != "weight" {
            return Err(ProgramError::UnknownParameter(name.to_string()));
        }
        self.weight = value;
        Ok(())
    }

    fn parameters_updated(&mut self, changed: &[&str]) -> ProgramResult<()> {
        if !changed.contains(&"weight") {
            return Ok(());
        }
        // Absorbed when no program is bound; prepare reads the stored
        // value later.
        if let Some(program) = self.program.as_mut() {
            program.set_host_value("weight", self.weight)?;
        }
        Ok(())
    }

    fn process(&mut self, context: &FilterContext, ports: &mut PortSet) -> ProcessResult<Status> {
        let program = self.program.as_ref().ok_or(ProcessError::NotPrepared {
            filter: "alpha_blend".to_string(),
        })?;
        let out_format = self.formats[0].ok_or(ProcessError::NotPrepared {
            filter: "alpha_blend".to_string(),
        })?;

        let source = ports.pull(0)?;
        let overlay = ports.pull(1)?;
        let mask = ports.pull(2)?;

        let mut output = context.frames().allocate(out_format)?;
        program.run(&[source, overlay, mask], &mut output)?;

        ports.push(0, output)?;
        Ok(Status::WAIT_FOR_ALL_INPUTS | Status::WAIT_FOR_FREE_OUTPUTS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::frame::{Frame, FrameManager};
    use crate::core::port::Stage;
    use crate::core::program::ShaderRuntime;
    use indexmap::IndexMap;
    use std::sync::Arc;

    /// Software stand-in that evaluates the blend the shader encodes.
    struct SoftwareBlend;

    impl ShaderRuntime for SoftwareBlend {
        fn name(&self) -> &str {
            "software-blend"
        }

        fn execute(
            &self,
            _source: &str,
            host_values: &IndexMap<String, HostValue>,
            inputs: &[Frame],
            output: &mut Frame,
        ) -> ProcessResult<()> {
            let weight = host_values
                .get("weight")
                .and_then(|v| v.as_float())
                .unwrap_or(1.0);
            let (src, ovl, mask) = (inputs[0].data(), inputs[1].data(), inputs[2].data());
            let out = output.data_mut().ok_or(ProcessError::OutputShared)?;
            for i in (0..out.len()).step_by(4) {
                let a = f64::from(mask[i + 3]) / 255.0 * weight;
                for c in 0..4 {
                    let blended =
                        f64::from(src[i + c]) * (1.0 - a) + f64::from(ovl[i + c]) * a;
                    out[i + c] = blended.round() as u8;
                }
            }
            Ok(())
        }
    }

    fn gpu_rgba() -> FrameFormat {
        FrameFormat::binary(4, StorageTarget::Gpu).with_dimensions(1, 1)
    }

    fn blend_context() -> FilterContext {
        FilterContext::builder()
            .shader_runtime(Arc::new(SoftwareBlend))
            .build()
    }

    fn negotiated_stage() -> Stage {
        let mut stage = Stage::new(Box::new(AlphaBlendFilter::new()));
        for port in INPUTS {
            stage.negotiate_input(port, &gpu_rgba()).unwrap();
        }
        stage
    }

    #[test]
    fn test_blend_with_configured_weight() {
        let context = blend_context();
        let manager = FrameManager::unbounded();

        let mut stage = negotiated_stage();
        stage
            .filter_mut()
            .set_parameter("weight", HostValue::Float(0.5))
            .unwrap();
        stage.prepare(&context).unwrap();

        let tap = stage.tap_output("blended").unwrap();
        stage
            .feed(
                "source",
                manager.allocate_from(gpu_rgba(), vec![200, 0, 0, 255]).unwrap(),
            )
            .unwrap();
        stage
            .feed(
                "overlay",
                manager.allocate_from(gpu_rgba(), vec![0, 100, 0, 255]).unwrap(),
            )
            .unwrap();
        stage
            .feed(
                "mask",
                manager.allocate_from(gpu_rgba(), vec![0, 0, 0, 255]).unwrap(),
            )
            .unwrap();

        let status = stage.process(&context).unwrap();
        assert_eq!(
            status,
            Status::WAIT_FOR_ALL_INPUTS | Status::WAIT_FOR_FREE_OUTPUTS
        );

        // Full mask alpha scaled by weight 0.5: an even mix.
        let blended = tap.pop().unwrap();
        assert_eq!(blended.data(), &[100, 50, 0, 255]);

        // Inputs were released; only the tapped output frame remains.
        drop(blended);
        assert_eq!(manager.in_use(), 0);
    }

    #[test]
    fn test_parameters_updated_before_prepare_is_absorbed() {
        let context = blend_context();
        let mut stage = negotiated_stage();

        stage
            .filter_mut()
            .set_parameter("weight", HostValue::Float(0.25))
            .unwrap();
        stage.filter_mut().parameters_updated(&["weight"]).unwrap();

        // No program was constructed, so processing is still refused.
        assert!(matches!(
            stage.process(&context),
            Err(ProcessError::NotPrepared { .. })
        ));
    }

    #[test]
    fn test_parameters_updated_after_prepare_updates_uniform() {
        let context = blend_context();
        let manager = FrameManager::unbounded();

        let mut stage = negotiated_stage();
        stage.prepare(&context).unwrap();
        let tap = stage.tap_output("blended").unwrap();

        // Re-weight the bound program without re-preparing.
        stage
            .filter_mut()
            .set_parameter("weight", HostValue::Float(0.0))
            .unwrap();
        stage.filter_mut().parameters_updated(&["weight"]).unwrap();

        stage
            .feed(
                "source",
                manager.allocate_from(gpu_rgba(), vec![10, 20, 30, 40]).unwrap(),
            )
            .unwrap();
        stage
            .feed(
                "overlay",
                manager
                    .allocate_from(gpu_rgba(), vec![200, 200, 200, 200])
                    .unwrap(),
            )
            .unwrap();
        stage
            .feed(
                "mask",
                manager.allocate_from(gpu_rgba(), vec![0, 0, 0, 255]).unwrap(),
            )
            .unwrap();
        stage.process(&context).unwrap();

        // Weight zero leaves the source untouched.
        assert_eq!(tap.pop().unwrap().data(), &[10, 20, 30, 40]);
    }

    #[test]
    fn test_prepare_without_runtime_is_unsupported_backend() {
        let context = FilterContext::builder().build();
        let mut stage = negotiated_stage();

        let err = stage.prepare(&context).unwrap_err();
        assert!(matches!(
            err,
            ProgramError::UnsupportedBackend {
                target: StorageTarget::Gpu,
                ..
            }
        ));
    }

    #[test]
    fn test_negotiation_rejects_wrong_formats() {
        let mut filter = AlphaBlendFilter::new();

        assert!(!filter.accepts_input_format(0, &FrameFormat::binary(3, StorageTarget::Gpu)));
        assert!(!filter.accepts_input_format(0, &FrameFormat::binary(4, StorageTarget::Native)));
        assert!(!filter.accepts_input_format(0, &FrameFormat::structured(StorageTarget::Gpu)));
        assert!(filter.output_format(0).is_none());

        assert!(filter.accepts_input_format(0, &gpu_rgba()));
        assert_eq!(filter.output_format(0), Some(&gpu_rgba()));
    }

    #[test]
    fn test_negotiation_rejects_mismatched_dimensions() {
        let mut filter = AlphaBlendFilter::new();
        let small = FrameFormat::binary(4, StorageTarget::Gpu).with_dimensions(2, 2);
        let large = FrameFormat::binary(4, StorageTarget::Gpu).with_dimensions(8, 8);

        assert!(filter.accepts_input_format(0, &small));
        assert!(!filter.accepts_input_format(1, &large));
        // Rejection leaves the overlay port unnegotiated.
        assert!(filter.accepts_input_format(1, &small));
    }

    #[test]
    fn test_unknown_parameter_is_refused() {
        let mut filter = AlphaBlendFilter::new();
        let err = filter
            .set_parameter("gamma", HostValue::Float(2.2))
            .unwrap_err();
        assert!(matches!(err, ProgramError::UnknownParameter(_)));
    }
}
