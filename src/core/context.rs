//! The shared execution context handed to filters.
//!
//! A [`FilterContext`] bundles the frame allocator, the native routine
//! library, and an optional shader runtime. Filters receive it by
//! reference in `prepare` and `process`; they never own backend
//! resources themselves.

use crate::core::error::ProgramError;
use crate::core::format::StorageTarget;
use crate::core::frame::FrameManager;
use crate::core::program::{NativeLibrary, ShaderRuntime};
use std::sync::Arc;

/// Shared services available to every filter invocation.
#[derive(Clone)]
pub struct FilterContext {
    frames: FrameManager,
    natives: NativeLibrary,
    shader_runtime: Option<Arc<dyn ShaderRuntime>>,
}

impl FilterContext {
    /// Start building a context.
    pub fn builder() -> FilterContextBuilder {
        FilterContextBuilder::default()
    }

    /// The frame allocator.
    pub fn frames(&self) -> &FrameManager {
        &self.frames
    }

    /// The native routine library.
    pub fn natives(&self) -> &NativeLibrary {
        &self.natives
    }

    /// The shader runtime, if one was installed.
    pub fn shader_runtime(&self) -> Option<&Arc<dyn ShaderRuntime>> {
        self.shader_runtime.as_ref()
    }

    /// The shader runtime, or the configuration error a GPU filter
    /// reports when none is installed.
    pub fn require_shader_runtime(
        &self,
        filter: &str,
    ) -> Result<Arc<dyn ShaderRuntime>, ProgramError> {
        self.shader_runtime
            .clone()
            .ok_or_else(|| ProgramError::UnsupportedBackend {
                filter: filter.to_string(),
                target: StorageTarget::Gpu,
            })
    }
}

impl std::fmt::Debug for FilterContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FilterContext")
            .field("frame_budget", &self.frames.budget())
            .field("native_routines", &self.natives.len())
            .field(
                "shader_runtime",
                &self.shader_runtime.as_ref().map(|rt| rt.name()),
            )
            .finish()
    }
}

/// Builder for [`FilterContext`].
///
/// Defaults to an unbounded frame budget, the builtin native library,
/// and no shader runtime.
pub struct FilterContextBuilder {
    frames: FrameManager,
    natives: NativeLibrary,
    shader_runtime: Option<Arc<dyn ShaderRuntime>>,
}

impl Default for FilterContextBuilder {
    fn default() -> Self {
        Self {
            frames: FrameManager::unbounded(),
            natives: NativeLibrary::with_builtins(),
            shader_runtime: None,
        }
    }
}

impl FilterContextBuilder {
    /// Cap total live frame bytes at `bytes`.
    pub fn frame_budget(mut self, bytes: usize) -> Self {
        self.frames = FrameManager::new(bytes);
        self
    }

    /// Replace the native routine library.
    pub fn native_library(mut self, natives: NativeLibrary) -> Self {
        self.natives = natives;
        self
    }

    /// Install a shader runtime for GPU-targeted programs.
    pub fn shader_runtime(mut self, runtime: Arc<dyn ShaderRuntime>) -> Self {
        self.shader_runtime = Some(runtime);
        self
    }

    /// Finish building.
    pub fn build(self) -> FilterContext {
        FilterContext {
            frames: self.frames,
            natives: self.natives,
            shader_runtime: self.shader_runtime,
        }
    }
}
