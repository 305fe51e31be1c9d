//! Frame format descriptors.
//!
//! Formats use value semantics throughout: a format is never mutated in
//! place, and deriving a related format is always a copy-with-override.
//! This keeps negotiation safe even when several filters hold the same
//! descriptor.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Semantic kind of the data a frame carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataKind {
    /// Fixed-width samples (pixels, audio samples) laid out contiguously.
    Binary,
    /// Structured payloads with no per-sample layout.
    Structured,
}

/// Where a frame's backing storage lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageTarget {
    /// No target chosen yet; compatible with any concrete target.
    Unspecified,
    /// Host-native memory, processed by native routines.
    Native,
    /// GPU-resident storage, processed by shader programs.
    Gpu,
}

impl fmt::Display for StorageTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageTarget::Unspecified => write!(f, "unspecified"),
            StorageTarget::Native => write!(f, "native"),
            StorageTarget::Gpu => write!(f, "gpu"),
        }
    }
}

/// Immutable descriptor of a frame's shape and storage.
///
/// Bytes-per-sample and target together determine the buffer layout.
/// Dimensions may be left at zero when they are not known yet; they are
/// late-bound by the frame that finally carries the data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FrameFormat {
    kind: DataKind,
    bytes_per_sample: usize,
    target: StorageTarget,
    width: u32,
    height: u32,
}

impl FrameFormat {
    /// Create a binary-sample format with the given sample width and target.
    pub fn binary(bytes_per_sample: usize, target: StorageTarget) -> Self {
        Self {
            kind: DataKind::Binary,
            bytes_per_sample,
            target,
            width: 0,
            height: 0,
        }
    }

    /// Create a structured format for the given target.
    pub fn structured(target: StorageTarget) -> Self {
        Self {
            kind: DataKind::Structured,
            bytes_per_sample: 1,
            target,
            width: 0,
            height: 0,
        }
    }

    /// Derive a copy with a different sample width.
    pub fn with_bytes_per_sample(self, bytes_per_sample: usize) -> Self {
        Self {
            bytes_per_sample,
            ..self
        }
    }

    /// Derive a copy with a different storage target.
    pub fn with_target(self, target: StorageTarget) -> Self {
        Self { target, ..self }
    }

    /// Derive a copy with concrete image dimensions.
    pub fn with_dimensions(self, width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            ..self
        }
    }

    /// Semantic kind of the data.
    pub fn kind(&self) -> DataKind {
        self.kind
    }

    /// Whether this format carries binary samples.
    pub fn is_binary(&self) -> bool {
        self.kind == DataKind::Binary
    }

    /// Byte width of one sample.
    pub fn bytes_per_sample(&self) -> usize {
        self.bytes_per_sample
    }

    /// Storage target of the backing buffer.
    pub fn target(&self) -> StorageTarget {
        self.target
    }

    /// Image width in samples, zero if not yet known.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Image height in samples, zero if not yet known.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Whether concrete dimensions have been bound.
    pub fn has_dimensions(&self) -> bool {
        self.width > 0 && self.height > 0
    }

    /// Number of samples a frame of this format holds.
    pub fn samples(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Total payload size in bytes.
    pub fn frame_bytes(&self) -> usize {
        self.samples() * self.bytes_per_sample
    }

    /// Structural compatibility check used at wiring time.
    ///
    /// A zero sample width, unspecified target, or unset dimensions act
    /// as wildcards on either side.
    pub fn compatible_with(&self, other: &FrameFormat) -> bool {
        if self.kind != other.kind {
            return false;
        }
        let sample_ok = self.bytes_per_sample == 0
            || other.bytes_per_sample == 0
            || self.bytes_per_sample == other.bytes_per_sample;
        let target_ok = self.target == StorageTarget::Unspecified
            || other.target == StorageTarget::Unspecified
            || self.target == other.target;
        let dims_ok = !self.has_dimensions()
            || !other.has_dimensions()
            || (self.width == other.width && self.height == other.height);
        sample_ok && target_ok && dims_ok
    }
}

impl fmt::Display for FrameFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            DataKind::Binary => write!(
                f,
                "binary[{}B/sample, {}x{}, {}]",
                self.bytes_per_sample, self.width, self.height, self.target
            ),
            DataKind::Structured => write!(f, "structured[{}]", self.target),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_derivation_overrides_one_field() {
        let base = FrameFormat::binary(4, StorageTarget::Native).with_dimensions(64, 32);
        let derived = base.with_bytes_per_sample(3);

        assert_eq!(derived.bytes_per_sample(), 3);
        assert_eq!(derived.kind(), base.kind());
        assert_eq!(derived.target(), base.target());
        assert_eq!(derived.width(), base.width());
        assert_eq!(derived.height(), base.height());
        // The base value is untouched
        assert_eq!(base.bytes_per_sample(), 4);
    }

    #[test]
    fn test_frame_bytes() {
        let fmt = FrameFormat::binary(3, StorageTarget::Native).with_dimensions(10, 4);
        assert_eq!(fmt.samples(), 40);
        assert_eq!(fmt.frame_bytes(), 120);

        let unsized_fmt = FrameFormat::binary(3, StorageTarget::Native);
        assert!(!unsized_fmt.has_dimensions());
        assert_eq!(unsized_fmt.frame_bytes(), 0);
    }

    #[test]
    fn test_compatibility_wildcards() {
        let any_target = FrameFormat::binary(4, StorageTarget::Unspecified);
        let native = FrameFormat::binary(4, StorageTarget::Native);
        let gpu = FrameFormat::binary(4, StorageTarget::Gpu);

        assert!(any_target.compatible_with(&native));
        assert!(any_target.compatible_with(&gpu));
        assert!(!native.compatible_with(&gpu));
        assert!(!native.compatible_with(&FrameFormat::structured(StorageTarget::Native)));
    }

    proptest! {
        #[test]
        fn prop_with_bytes_per_sample_preserves_other_fields(
            bps in 1usize..=16,
            new_bps in 1usize..=16,
            w in 0u32..512,
            h in 0u32..512,
        ) {
            let base = FrameFormat::binary(bps, StorageTarget::Native).with_dimensions(w, h);
            let derived = base.with_bytes_per_sample(new_bps);
            prop_assert_eq!(derived.bytes_per_sample(), new_bps);
            prop_assert_eq!(derived.kind(), base.kind());
            prop_assert_eq!(derived.target(), base.target());
            prop_assert_eq!(derived.width(), base.width());
            prop_assert_eq!(derived.height(), base.height());
        }
    }
}
