//! Backend programs: native routines and GPU shader programs.
//!
//! A [`Program`] is a bound, backend-specific computation built exactly
//! once per format negotiation and reused across `process` calls. The two
//! variants form a closed set: native routines resolved from a
//! [`NativeLibrary`] by (module, entry point) pair, and shader programs
//! that carry opaque WGSL source plus named host values and delegate
//! execution to a [`ShaderRuntime`].

use crate::core::error::{ProcessError, ProcessResult, ProgramError, ProgramResult};
use crate::core::format::StorageTarget;
use crate::core::frame::Frame;
use indexmap::IndexMap;
use log::debug;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// A named value pushed into a program from the host side.
///
/// Shader programs bind these as uniforms; live parameter edits update
/// them without rebuilding the program.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum HostValue {
    /// 64-bit floating point value.
    Float(f64),
    /// 64-bit signed integer value.
    Int(i64),
    /// Boolean flag.
    Bool(bool),
}

impl HostValue {
    /// Read this value as a float, widening integers.
    pub fn as_float(&self) -> Option<f64> {
        match self {
            HostValue::Float(f) => Some(*f),
            HostValue::Int(i) => Some(*i as f64),
            HostValue::Bool(_) => None,
        }
    }
}

/// Executable native routine operating on host-memory frames.
pub type NativeRoutine = Arc<dyn Fn(&[Frame], &mut Frame) -> ProcessResult<()> + Send + Sync>;

/// Registry resolving (module, entry point) pairs to native routines.
///
/// Routine identification is opaque to filters; they name a pair during
/// `prepare` and fail fatally if it is not registered.
#[derive(Clone, Default)]
pub struct NativeLibrary {
    routines: IndexMap<(String, String), NativeRoutine>,
}

impl NativeLibrary {
    /// Create an empty library.
    pub fn new() -> Self {
        Self {
            routines: IndexMap::new(),
        }
    }

    /// Create a library pre-populated with the built-in routines.
    pub fn with_builtins() -> Self {
        let mut library = Self::new();
        library.register("imageproc", "gray_to_rgb", builtin::gray_to_rgb);
        library.register("imageproc", "rgba_to_rgb", builtin::rgba_to_rgb);
        library
    }

    /// Register a routine under a (module, entry point) pair.
    pub fn register<F>(&mut self, module: &str, entry_point: &str, routine: F)
    where
        F: Fn(&[Frame], &mut Frame) -> ProcessResult<()> + Send + Sync + 'static,
    {
        self.routines.insert(
            (module.to_string(), entry_point.to_string()),
            Arc::new(routine),
        );
    }

    /// Resolve a pair to its routine.
    pub fn resolve(&self, module: &str, entry_point: &str) -> ProgramResult<NativeRoutine> {
        self.routines
            .get(&(module.to_string(), entry_point.to_string()))
            .cloned()
            .ok_or_else(|| ProgramError::UnknownRoutine {
                module: module.to_string(),
                entry_point: entry_point.to_string(),
            })
    }

    /// Check whether a pair is registered.
    pub fn contains(&self, module: &str, entry_point: &str) -> bool {
        self.routines
            .contains_key(&(module.to_string(), entry_point.to_string()))
    }

    /// Number of registered routines.
    pub fn len(&self) -> usize {
        self.routines.len()
    }

    /// Whether the library is empty.
    pub fn is_empty(&self) -> bool {
        self.routines.is_empty()
    }

    /// Iterate over registered (module, entry point) pairs.
    pub fn entry_points(&self) -> impl Iterator<Item = (&str, &str)> {
        self.routines
            .keys()
            .map(|(module, entry)| (module.as_str(), entry.as_str()))
    }
}

impl fmt::Debug for NativeLibrary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeLibrary")
            .field("routines", &self.routines.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Runtime boundary that executes shader programs.
///
/// Concrete texture backends live outside this crate; they implement this
/// trait and are handed to the context at construction time.
pub trait ShaderRuntime: Send + Sync {
    /// Human-readable backend name for diagnostics.
    fn name(&self) -> &str;

    /// Execute `source` over the input frames into the output frame,
    /// with the given host values bound as uniforms.
    fn execute(
        &self,
        source: &str,
        host_values: &IndexMap<String, HostValue>,
        inputs: &[Frame],
        output: &mut Frame,
    ) -> ProcessResult<()>;
}

/// A bound native-code program.
pub struct NativeProgram {
    module: String,
    entry_point: String,
    routine: NativeRoutine,
}

impl NativeProgram {
    /// Resolve and bind a routine from the library.
    pub fn new(library: &NativeLibrary, module: &str, entry_point: &str) -> ProgramResult<Self> {
        let routine = library.resolve(module, entry_point)?;
        debug!("bound native routine {}/{}", module, entry_point);
        Ok(Self {
            module: module.to_string(),
            entry_point: entry_point.to_string(),
            routine,
        })
    }

    /// The module this program was resolved from.
    pub fn module(&self) -> &str {
        &self.module
    }

    /// The entry point this program was resolved to.
    pub fn entry_point(&self) -> &str {
        &self.entry_point
    }

    /// Run the routine over the inputs into the output.
    pub fn run(&self, inputs: &[Frame], output: &mut Frame) -> ProcessResult<()> {
        (self.routine)(inputs, output)
    }
}

impl fmt::Debug for NativeProgram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeProgram")
            .field("module", &self.module)
            .field("entry_point", &self.entry_point)
            .finish()
    }
}

/// A bound GPU shader program.
///
/// Holds opaque shader source and named host values; execution is
/// delegated to the runtime captured at binding time.
pub struct ShaderProgram {
    source: String,
    host_values: IndexMap<String, HostValue>,
    runtime: Arc<dyn ShaderRuntime>,
}

impl ShaderProgram {
    /// Create a program from shader source, bound to a runtime.
    pub fn new(source: impl Into<String>, runtime: Arc<dyn ShaderRuntime>) -> Self {
        let source = source.into();
        debug!(
            "bound shader program ({} bytes of source) on runtime '{}'",
            source.len(),
            runtime.name()
        );
        Self {
            source,
            host_values: IndexMap::new(),
            runtime,
        }
    }

    /// Bind or update a named host value.
    pub fn set_host_value(&mut self, name: impl Into<String>, value: HostValue) {
        let name = name.into();
        debug!("host value '{}' <- {:?}", name, value);
        self.host_values.insert(name, value);
    }

    /// Read back a bound host value.
    pub fn host_value(&self, name: &str) -> Option<HostValue> {
        self.host_values.get(name).copied()
    }

    /// The shader source text.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Run the shader over the inputs into the output.
    pub fn run(&self, inputs: &[Frame], output: &mut Frame) -> ProcessResult<()> {
        self.runtime
            .execute(&self.source, &self.host_values, inputs, output)
    }
}

impl fmt::Debug for ShaderProgram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShaderProgram")
            .field("source_len", &self.source.len())
            .field("host_values", &self.host_values)
            .field("runtime", &self.runtime.name())
            .finish()
    }
}

/// A bound, backend-specific computation ready to run.
#[derive(Debug)]
pub enum Program {
    /// Native routine executing on host memory.
    Native(NativeProgram),
    /// Shader program executing through a [`ShaderRuntime`].
    Shader(ShaderProgram),
}

impl Program {
    /// The storage target this program executes on.
    pub fn target(&self) -> StorageTarget {
        match self {
            Program::Native(_) => StorageTarget::Native,
            Program::Shader(_) => StorageTarget::Gpu,
        }
    }

    /// Run the computation over the inputs into the output.
    pub fn run(&self, inputs: &[Frame], output: &mut Frame) -> ProcessResult<()> {
        match self {
            Program::Native(native) => native.run(inputs, output),
            Program::Shader(shader) => shader.run(inputs, output),
        }
    }

    /// Update a named host value without rebuilding the program.
    ///
    /// Native programs carry no host values.
    pub fn set_host_value(&mut self, name: &str, value: HostValue) -> ProgramResult<()> {
        match self {
            Program::Native(_) => Err(ProgramError::UnknownHostValue(name.to_string())),
            Program::Shader(shader) => {
                shader.set_host_value(name, value);
                Ok(())
            }
        }
    }

    /// Read back a bound host value, if this program has one.
    pub fn host_value(&self, name: &str) -> Option<HostValue> {
        match self {
            Program::Native(_) => None,
            Program::Shader(shader) => shader.host_value(name),
        }
    }
}

mod builtin {
    //! Built-in native routines of the `imageproc` module.

    use super::*;

    /// Expand single-byte gray samples to three-byte RGB samples.
    pub(super) fn gray_to_rgb(inputs: &[Frame], output: &mut Frame) -> ProcessResult<()> {
        let input = inputs
            .first()
            .ok_or(ProcessError::PortOutOfRange { index: 0 })?;
        let expected = input.data().len() * 3;
        let data = input.data();
        let out = output.data_mut().ok_or(ProcessError::OutputShared)?;
        if out.len() != expected {
            return Err(ProcessError::PayloadMismatch {
                expected,
                actual: out.len(),
            });
        }
        for (luma, rgb) in data.iter().zip(out.chunks_exact_mut(3)) {
            rgb.fill(*luma);
        }
        Ok(())
    }

    /// Drop the alpha byte from four-byte RGBA samples.
    pub(super) fn rgba_to_rgb(inputs: &[Frame], output: &mut Frame) -> ProcessResult<()> {
        let input = inputs
            .first()
            .ok_or(ProcessError::PortOutOfRange { index: 0 })?;
        let expected = input.data().len() / 4 * 3;
        let data = input.data();
        let out = output.data_mut().ok_or(ProcessError::OutputShared)?;
        if out.len() != expected {
            return Err(ProcessError::PayloadMismatch {
                expected,
                actual: out.len(),
            });
        }
        for (rgba, rgb) in data.chunks_exact(4).zip(out.chunks_exact_mut(3)) {
            rgb.copy_from_slice(&rgba[..3]);
        }
        Ok(())
    }
}

/// Shader source payloads.
pub mod shaders {
    /// Alpha blend compute shader (WGSL).
    ///
    /// Blends `source` and `overlay` per sample, weighting the mask by the
    /// `weight` uniform.
    pub const ALPHA_BLEND: &str = r#"
        struct BlendParams {
            weight: f32,
        }

        @group(0) @binding(0) var<storage, read> source: array<u32>;
        @group(0) @binding(1) var<storage, read> overlay: array<u32>;
        @group(0) @binding(2) var<storage, read> mask: array<u32>;
        @group(0) @binding(3) var<storage, read_write> blended: array<u32>;
        @group(0) @binding(4) var<uniform> params: BlendParams;

        fn unpack(px: u32) -> vec4<f32> {
            return unpack4x8unorm(px);
        }

        @compute @workgroup_size(64)
        fn main(@builtin(global_invocation_id) global_id: vec3<u32>) {
            let i = global_id.x;
            if (i >= arrayLength(&blended)) {
                return;
            }

            let src = unpack(source[i]);
            let ovl = unpack(overlay[i]);
            let a = unpack(mask[i]).a * params.weight;

            let color = src * (1.0 - a) + ovl * a;
            blended[i] = pack4x8unorm(color);
        }
    "#;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::format::{FrameFormat, StorageTarget};
    use crate::core::frame::FrameManager;

    #[test]
    fn test_library_builtins() {
        let library = NativeLibrary::with_builtins();
        assert!(library.contains("imageproc", "gray_to_rgb"));
        assert!(library.contains("imageproc", "rgba_to_rgb"));
        assert!(!library.contains("imageproc", "rgb_to_yuv"));
        assert_eq!(library.len(), 2);
    }

    #[test]
    fn test_unknown_routine_fails_binding() {
        let library = NativeLibrary::with_builtins();
        let err = NativeProgram::new(&library, "imageproc", "missing").unwrap_err();
        assert!(matches!(err, ProgramError::UnknownRoutine { .. }));
    }

    #[test]
    fn test_gray_to_rgb_expands_samples() {
        let manager = FrameManager::unbounded();
        let library = NativeLibrary::with_builtins();
        let program = NativeProgram::new(&library, "imageproc", "gray_to_rgb").unwrap();

        let gray = FrameFormat::binary(1, StorageTarget::Native).with_dimensions(2, 1);
        let input = manager.allocate_from(gray, vec![10, 200]).unwrap();
        let mut output = manager
            .allocate(gray.with_bytes_per_sample(3))
            .unwrap();

        program.run(std::slice::from_ref(&input), &mut output).unwrap();
        assert_eq!(output.data(), &[10, 10, 10, 200, 200, 200]);
    }

    #[test]
    fn test_rgba_to_rgb_drops_alpha() {
        let manager = FrameManager::unbounded();
        let library = NativeLibrary::with_builtins();
        let program = NativeProgram::new(&library, "imageproc", "rgba_to_rgb").unwrap();

        let rgba = FrameFormat::binary(4, StorageTarget::Native).with_dimensions(2, 1);
        let input = manager
            .allocate_from(rgba, vec![1, 2, 3, 255, 4, 5, 6, 128])
            .unwrap();
        let mut output = manager.allocate(rgba.with_bytes_per_sample(3)).unwrap();

        program.run(std::slice::from_ref(&input), &mut output).unwrap();
        assert_eq!(output.data(), &[1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn test_routine_rejects_shared_output() {
        let manager = FrameManager::unbounded();
        let library = NativeLibrary::with_builtins();
        let program = NativeProgram::new(&library, "imageproc", "gray_to_rgb").unwrap();

        let gray = FrameFormat::binary(1, StorageTarget::Native).with_dimensions(1, 1);
        let input = manager.allocate_from(gray, vec![1]).unwrap();
        let mut output = manager.allocate(gray.with_bytes_per_sample(3)).unwrap();
        let _held = output.clone();

        let err = program
            .run(std::slice::from_ref(&input), &mut output)
            .unwrap_err();
        assert!(matches!(err, ProcessError::OutputShared));
    }

    #[test]
    fn test_native_program_has_no_host_values() {
        let library = NativeLibrary::with_builtins();
        let mut program =
            Program::Native(NativeProgram::new(&library, "imageproc", "gray_to_rgb").unwrap());
        assert_eq!(program.target(), StorageTarget::Native);
        assert!(program
            .set_host_value("weight", HostValue::Float(0.5))
            .is_err());
        assert!(program.host_value("weight").is_none());
    }
}
