//! The filter contract: port declarations, format negotiation, program
//! binding, and the per-invocation processing protocol.
//!
//! Filters form a closed set of variants united by the [`Filter`] trait.
//! An external scheduler drives them: it wires edges once port names are
//! known, offers formats through [`Filter::accepts_input_format`], calls
//! [`Filter::prepare`] after every required input has accepted a format,
//! and then invokes [`Filter::process`] repeatedly, using the returned
//! [`Status`] bits to decide when to come back.

use crate::core::context::FilterContext;
use crate::core::error::{ProcessResult, ProgramResult};
use crate::core::format::FrameFormat;
use crate::core::port::PortSet;
use crate::core::program::HostValue;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{BitOr, BitOrAssign};

/// Scheduling status bitmask returned by [`Filter::process`].
///
/// The bits are independent readiness conditions, not error signals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Status(u32);

impl Status {
    /// Do not invoke again until every required input has a fresh frame.
    pub const WAIT_FOR_ALL_INPUTS: Status = Status(0b01);
    /// Do not invoke again until downstream consumers release the pushed
    /// output frames.
    pub const WAIT_FOR_FREE_OUTPUTS: Status = Status(0b10);

    /// A status with no bits set.
    pub const fn empty() -> Self {
        Status(0)
    }

    /// Raw bit representation.
    pub const fn bits(self) -> u32 {
        self.0
    }

    /// Whether every bit of `other` is set in `self`.
    pub const fn contains(self, other: Status) -> bool {
        self.0 & other.0 == other.0
    }

    /// Whether no bits are set.
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl BitOr for Status {
    type Output = Status;

    fn bitor(self, rhs: Status) -> Status {
        Status(self.0 | rhs.0)
    }
}

impl BitOrAssign for Status {
    fn bitor_assign(&mut self, rhs: Status) {
        self.0 |= rhs.0;
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return write!(f, "ready");
        }
        let mut first = true;
        let mut emit = |f: &mut fmt::Formatter<'_>, name: &str| -> fmt::Result {
            if !first {
                write!(f, "|")?;
            }
            first = false;
            write!(f, "{name}")
        };
        if self.contains(Status::WAIT_FOR_ALL_INPUTS) {
            emit(f, "wait_for_all_inputs")?;
        }
        if self.contains(Status::WAIT_FOR_FREE_OUTPUTS) {
            emit(f, "wait_for_free_outputs")?;
        }
        Ok(())
    }
}

/// Lifecycle state of a filter instance.
///
/// `Processing` re-enters `Negotiating` only when an upstream format
/// changes; a new program must then be bound before the next `process`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterState {
    /// Constructed, no format offered yet.
    Constructed,
    /// At least one input format has been accepted.
    Negotiating,
    /// `prepare` succeeded; a program is bound.
    Prepared,
    /// `process` has run at least once.
    Processing,
}

/// Descriptor for a filter type, cached by the registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterDescriptor {
    /// Stable identifier (e.g. "to_rgb").
    pub id: String,
    /// Human-readable name.
    pub name: String,
    /// What the filter does.
    pub description: String,
    /// Ordered input port names.
    pub inputs: Vec<String>,
    /// Ordered output port names, empty for sinks.
    pub outputs: Vec<String>,
    /// Declared parameter names.
    pub parameters: Vec<String>,
}

impl FilterDescriptor {
    /// Create a descriptor with empty port and parameter lists.
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: description.into(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            parameters: Vec::new(),
        }
    }

    /// Set the input port names.
    pub fn inputs(mut self, names: &[&str]) -> Self {
        self.inputs = names.iter().map(|n| n.to_string()).collect();
        self
    }

    /// Set the output port names.
    pub fn outputs(mut self, names: &[&str]) -> Self {
        self.outputs = names.iter().map(|n| n.to_string()).collect();
        self
    }

    /// Set the parameter names.
    pub fn parameters(mut self, names: &[&str]) -> Self {
        self.parameters = names.iter().map(|n| n.to_string()).collect();
        self
    }
}

/// The core trait for pipeline nodes.
///
/// # Contract
///
/// - Port name lists are fixed at construction and queried once at wiring
///   time; all pull/push/format operations use the resulting indices.
/// - [`accepts_input_format`](Filter::accepts_input_format) is pure on
///   rejection. It may record the accepted format as a side effect only
///   when it returns `true`.
/// - [`output_format`](Filter::output_format) is defined only after a
///   compatible input format has been accepted.
/// - [`prepare`](Filter::prepare) deterministically selects a program
///   variant from the negotiated target and is re-called only when an
///   upstream format changes.
/// - [`process`](Filter::process) never blocks: it pulls buffered inputs,
///   allocates outputs through the context, runs the bound program, pushes
///   outputs downstream, and reports what it is waiting on next.
///
/// # Concurrency
///
/// Calls on one instance are strictly sequential; instances never spawn
/// concurrent execution of their own. `Send` lets the owning scheduler
/// move instances across threads.
pub trait Filter: Send {
    /// Descriptor for registry listings and tooling.
    fn descriptor(&self) -> FilterDescriptor;

    /// Ordered input port names, fixed at construction.
    fn input_names(&self) -> &[&'static str];

    /// Ordered output port names, empty for a sink.
    fn output_names(&self) -> &[&'static str];

    /// Offer a format on an input port.
    ///
    /// Must not mutate negotiation state when returning `false`.
    fn accepts_input_format(&mut self, index: usize, format: &FrameFormat) -> bool;

    /// The negotiated output format for a port, once defined.
    fn output_format(&self, index: usize) -> Option<&FrameFormat>;

    /// Bind the backend program for the negotiated formats.
    fn prepare(&mut self, context: &FilterContext) -> ProgramResult<()>;

    /// Store a parameter value.
    ///
    /// The value takes effect in a bound program only after
    /// [`parameters_updated`](Filter::parameters_updated) runs.
    fn set_parameter(&mut self, name: &str, value: HostValue) -> ProgramResult<()> {
        let _ = value;
        Err(crate::core::error::ProgramError::UnknownParameter(
            name.to_string(),
        ))
    }

    /// Push changed parameter values into the bound program.
    ///
    /// Absorbed silently when no program is bound yet; the values are read
    /// when `prepare` eventually runs.
    fn parameters_updated(&mut self, changed: &[&str]) -> ProgramResult<()> {
        let _ = changed;
        Ok(())
    }

    /// Run one processing invocation.
    fn process(&mut self, context: &FilterContext, ports: &mut PortSet) -> ProcessResult<Status>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_bits_compose() {
        let status = Status::WAIT_FOR_ALL_INPUTS | Status::WAIT_FOR_FREE_OUTPUTS;
        assert!(status.contains(Status::WAIT_FOR_ALL_INPUTS));
        assert!(status.contains(Status::WAIT_FOR_FREE_OUTPUTS));
        assert_eq!(status.bits(), 0b11);

        let inputs_only = Status::WAIT_FOR_ALL_INPUTS;
        assert!(!inputs_only.contains(Status::WAIT_FOR_FREE_OUTPUTS));
        assert!(Status::empty().is_empty());
    }

    #[test]
    fn test_status_display() {
        assert_eq!(Status::empty().to_string(), "ready");
        assert_eq!(
            (Status::WAIT_FOR_ALL_INPUTS | Status::WAIT_FOR_FREE_OUTPUTS).to_string(),
            "wait_for_all_inputs|wait_for_free_outputs"
        );
    }

    #[test]
    fn test_descriptor_builder() {
        let descriptor = FilterDescriptor::new("to_rgb", "To RGB", "Converts to RGB")
            .inputs(&["image"])
            .outputs(&["image"]);
        assert_eq!(descriptor.id, "to_rgb");
        assert_eq!(descriptor.inputs, vec!["image".to_string()]);
        assert_eq!(descriptor.outputs, vec!["image".to_string()]);
        assert!(descriptor.parameters.is_empty());
    }

    #[test]
    fn test_status_serde_transparent() {
        let status = Status::WAIT_FOR_ALL_INPUTS | Status::WAIT_FOR_FREE_OUTPUTS;
        let json = serde_json::to_string(&status).unwrap();
        assert_eq!(json, "3");
        let back: Status = serde_json::from_str(&json).unwrap();
        assert_eq!(back, status);
    }
}
