//! Filter module.
//!
//! Contains the filter registry and the built-in filter implementations.

pub mod alpha_blend;
pub mod null;
pub mod registry;
pub mod to_rgb;

pub use alpha_blend::AlphaBlendFilter;
pub use null::NullFilter;
pub use registry::{FilterFactory, FilterRegistry};
pub use to_rgb::ToRgbFilter;

/// Register the built-in filters.
pub fn register_builtins(registry: &mut FilterRegistry) {
    registry.register(|| Box::new(NullFilter::new()));
    registry.register(|| Box::new(ToRgbFilter::new()));
    registry.register(|| Box::new(AlphaBlendFilter::new()));
}
