//! Ports, edge queues, and the stage wrapper that wires filters together.
//!
//! An edge between two filters is a shared non-blocking FIFO of frames.
//! Pushing a frame moves the producer's reference onto the queue; pulling
//! moves it to the consumer. A [`Stage`] pairs one filter with its ports
//! and owns the edge-level negotiation handshake.

use crate::core::context::FilterContext;
use crate::core::error::{
    NegotiationError, NegotiationResult, ProcessError, ProcessResult, ProgramResult,
};
use crate::core::filter::{Filter, FilterState, Status};
use crate::core::format::FrameFormat;
use crate::core::frame::Frame;
use log::{debug, trace};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;

/// A shared FIFO edge between one producer port and one consumer port.
#[derive(Clone, Default)]
pub struct FrameQueue {
    inner: Arc<Mutex<VecDeque<Frame>>>,
}

impl FrameQueue {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a frame, taking over its reference.
    pub fn push(&self, frame: Frame) {
        self.inner.lock().push_back(frame);
    }

    /// Remove and return the oldest buffered frame.
    pub fn pop(&self) -> Option<Frame> {
        self.inner.lock().pop_front()
    }

    /// Number of buffered frames.
    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    /// Whether no frames are buffered.
    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }
}

struct InputPort {
    name: &'static str,
    queue: Option<FrameQueue>,
}

struct OutputPort {
    name: &'static str,
    queue: Option<FrameQueue>,
}

/// A filter instance's ordered input and output ports.
///
/// Built from the filter's declared names; lookup by name resolves to the
/// stable index used for all pull/push operations.
pub struct PortSet {
    inputs: Vec<InputPort>,
    outputs: Vec<OutputPort>,
}

impl PortSet {
    /// Build a port set from declared port names.
    pub fn new(input_names: &[&'static str], output_names: &[&'static str]) -> Self {
        Self {
            inputs: input_names
                .iter()
                .map(|name| InputPort { name, queue: None })
                .collect(),
            outputs: output_names
                .iter()
                .map(|name| OutputPort { name, queue: None })
                .collect(),
        }
    }

    /// Resolve an input port name to its index.
    pub fn input_index(&self, name: &str) -> Option<usize> {
        self.inputs.iter().position(|port| port.name == name)
    }

    /// Resolve an output port name to its index.
    pub fn output_index(&self, name: &str) -> Option<usize> {
        self.outputs.iter().position(|port| port.name == name)
    }

    /// Number of input ports.
    pub fn input_count(&self) -> usize {
        self.inputs.len()
    }

    /// Number of output ports.
    pub fn output_count(&self) -> usize {
        self.outputs.len()
    }

    /// Retrieve the next buffered frame on an input port.
    ///
    /// Non-blocking: fails with [`ProcessError::InputExhausted`] when the
    /// edge is empty. The scheduler must not invoke `process` in that
    /// state.
    pub fn pull(&mut self, index: usize) -> ProcessResult<Frame> {
        let port = self
            .inputs
            .get(index)
            .ok_or(ProcessError::PortOutOfRange { index })?;
        let queue = port.queue.as_ref().ok_or(ProcessError::PortDisconnected {
            port: port.name.to_string(),
        })?;
        let frame = queue.pop().ok_or(ProcessError::InputExhausted {
            port: port.name.to_string(),
        })?;
        trace!("pulled frame from '{}'", port.name);
        Ok(frame)
    }

    /// Move a frame onto the edge connected to an output port.
    pub fn push(&mut self, index: usize, frame: Frame) -> ProcessResult<()> {
        let port = self
            .outputs
            .get(index)
            .ok_or(ProcessError::PortOutOfRange { index })?;
        let queue = port.queue.as_ref().ok_or(ProcessError::PortDisconnected {
            port: port.name.to_string(),
        })?;
        trace!("pushed frame to '{}'", port.name);
        queue.push(frame);
        Ok(())
    }

    /// Whether an input port is connected and has a buffered frame.
    pub fn input_ready(&self, index: usize) -> bool {
        self.inputs
            .get(index)
            .and_then(|port| port.queue.as_ref())
            .is_some_and(|queue| !queue.is_empty())
    }

    /// Whether every input port is ready.
    pub fn all_inputs_ready(&self) -> bool {
        (0..self.inputs.len()).all(|index| self.input_ready(index))
    }

    /// Frames still buffered on an output edge, zero if disconnected.
    pub fn output_backlog(&self, index: usize) -> usize {
        self.outputs
            .get(index)
            .and_then(|port| port.queue.as_ref())
            .map_or(0, |queue| queue.len())
    }

    fn input_connected(&self, index: usize) -> bool {
        self.inputs
            .get(index)
            .is_some_and(|port| port.queue.is_some())
    }

    fn output_connected(&self, index: usize) -> bool {
        self.outputs
            .get(index)
            .is_some_and(|port| port.queue.is_some())
    }

    fn connect_input(&mut self, index: usize, queue: FrameQueue) {
        self.inputs[index].queue = Some(queue);
    }

    fn connect_output(&mut self, index: usize, queue: FrameQueue) {
        self.outputs[index].queue = Some(queue);
    }
}

/// One filter instance paired with its ports and lifecycle state.
pub struct Stage {
    id: String,
    filter: Box<dyn Filter>,
    ports: PortSet,
    state: FilterState,
}

impl Stage {
    /// Wrap a filter, building its port set from the declared names.
    pub fn new(filter: Box<dyn Filter>) -> Self {
        let id = filter.descriptor().id;
        let ports = PortSet::new(filter.input_names(), filter.output_names());
        Self {
            id,
            filter,
            ports,
            state: FilterState::Constructed,
        }
    }

    /// The wrapped filter's id.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Current lifecycle state.
    pub fn state(&self) -> FilterState {
        self.state
    }

    /// The wrapped filter.
    pub fn filter(&self) -> &dyn Filter {
        self.filter.as_ref()
    }

    /// Mutable access to the wrapped filter, for parameter edits.
    pub fn filter_mut(&mut self) -> &mut dyn Filter {
        self.filter.as_mut()
    }

    /// The stage's ports.
    pub fn ports(&self) -> &PortSet {
        &self.ports
    }

    /// Offer a format on a named input port.
    ///
    /// Returns the port index on acceptance. Re-offering after processing
    /// has started re-enters negotiation; a new `prepare` must follow.
    pub fn negotiate_input(
        &mut self,
        port: &str,
        format: &FrameFormat,
    ) -> NegotiationResult<usize> {
        let index = self
            .ports
            .input_index(port)
            .ok_or_else(|| NegotiationError::UnknownPort {
                filter: self.id.clone(),
                port: port.to_string(),
            })?;
        if !self.filter.accepts_input_format(index, format) {
            debug!("'{}' rejected {} on '{}'", self.id, format, port);
            return Err(NegotiationError::Rejected {
                filter: self.id.clone(),
                port: port.to_string(),
                offered: *format,
            });
        }
        debug!("'{}' accepted {} on '{}'", self.id, format, port);
        self.state = FilterState::Negotiating;
        Ok(index)
    }

    /// Wire one upstream output port to one downstream input port.
    ///
    /// Reads the upstream output format, offers it downstream, and
    /// installs a shared edge on both ports only on acceptance. A
    /// rejection surfaces without wiring anything.
    pub fn connect(
        upstream: &mut Stage,
        output: &str,
        downstream: &mut Stage,
        input: &str,
    ) -> NegotiationResult<()> {
        let out_index =
            upstream
                .ports
                .output_index(output)
                .ok_or_else(|| NegotiationError::UnknownPort {
                    filter: upstream.id.clone(),
                    port: output.to_string(),
                })?;
        if upstream.ports.output_connected(out_index) {
            return Err(NegotiationError::PortAlreadyConnected {
                filter: upstream.id.clone(),
                port: output.to_string(),
            });
        }
        let format = upstream
            .filter
            .output_format(out_index)
            .copied()
            .ok_or_else(|| NegotiationError::OutputUndefined {
                filter: upstream.id.clone(),
                port: output.to_string(),
            })?;

        let in_index = downstream.negotiate_input(input, &format)?;
        if downstream.ports.input_connected(in_index) {
            return Err(NegotiationError::PortAlreadyConnected {
                filter: downstream.id.clone(),
                port: input.to_string(),
            });
        }

        let edge = FrameQueue::new();
        upstream.ports.connect_output(out_index, edge.clone());
        downstream.ports.connect_input(in_index, edge);
        debug!(
            "wired '{}'.{} -> '{}'.{} with {}",
            upstream.id, output, downstream.id, input, format
        );
        Ok(())
    }

    /// Enqueue a frame on a named input port, standing in for an upstream
    /// neighbor. Installs an edge on first use.
    pub fn feed(&mut self, port: &str, frame: Frame) -> NegotiationResult<()> {
        let index = self
            .ports
            .input_index(port)
            .ok_or_else(|| NegotiationError::UnknownPort {
                filter: self.id.clone(),
                port: port.to_string(),
            })?;
        if !self.ports.input_connected(index) {
            self.ports.connect_input(index, FrameQueue::new());
        }
        if let Some(queue) = self.ports.inputs[index].queue.as_ref() {
            queue.push(frame);
        }
        Ok(())
    }

    /// Attach a queue to a named output port and return it, standing in
    /// for a downstream neighbor.
    pub fn tap_output(&mut self, port: &str) -> NegotiationResult<FrameQueue> {
        let index = self
            .ports
            .output_index(port)
            .ok_or_else(|| NegotiationError::UnknownPort {
                filter: self.id.clone(),
                port: port.to_string(),
            })?;
        if !self.ports.output_connected(index) {
            self.ports.connect_output(index, FrameQueue::new());
        }
        Ok(self.ports.outputs[index]
            .queue
            .clone()
            .unwrap_or_default())
    }

    /// Bind the filter's program for the negotiated formats.
    pub fn prepare(&mut self, context: &FilterContext) -> ProgramResult<()> {
        self.filter.prepare(context)?;
        self.state = FilterState::Prepared;
        Ok(())
    }

    /// Run one processing invocation.
    pub fn process(&mut self, context: &FilterContext) -> ProcessResult<Status> {
        if !matches!(self.state, FilterState::Prepared | FilterState::Processing) {
            return Err(ProcessError::NotPrepared {
                filter: self.id.clone(),
            });
        }
        self.state = FilterState::Processing;
        self.filter.process(context, &mut self.ports)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::filter::FilterDescriptor;
    use crate::core::format::StorageTarget;
    use crate::core::frame::FrameManager;

    /// Minimal pass-through used to exercise the plumbing.
    struct Relay {
        format: Option<FrameFormat>,
    }

    impl Relay {
        fn new() -> Self {
            Self { format: None }
        }
    }

    impl Filter for Relay {
        fn descriptor(&self) -> FilterDescriptor {
            FilterDescriptor::new("relay", "Relay", "Forwards frames unchanged")
                .inputs(&["input"])
                .outputs(&["output"])
        }

        fn input_names(&self) -> &[&'static str] {
            &["input"]
        }

        fn output_names(&self) -> &[&'static str] {
            &["output"]
        }

        fn accepts_input_format(&mut self, _index: usize, format: &FrameFormat) -> bool {
            self.format = Some(*format);
            true
        }

        fn output_format(&self, _index: usize) -> Option<&FrameFormat> {
            self.format.as_ref()
        }

        fn prepare(&mut self, _context: &FilterContext) -> ProgramResult<()> {
            Ok(())
        }

        fn process(
            &mut self,
            _context: &FilterContext,
            ports: &mut PortSet,
        ) -> ProcessResult<Status> {
            let frame = ports.pull(0)?;
            ports.push(0, frame)?;
            Ok(Status::WAIT_FOR_ALL_INPUTS | Status::WAIT_FOR_FREE_OUTPUTS)
        }
    }

    fn native_fmt() -> FrameFormat {
        FrameFormat::binary(4, StorageTarget::Native).with_dimensions(2, 2)
    }

    #[test]
    fn test_queue_push_moves_the_reference() {
        let manager = FrameManager::unbounded();
        let frame = manager.allocate(native_fmt()).unwrap();
        let queue = FrameQueue::new();

        queue.push(frame);
        assert_eq!(queue.len(), 1);

        let frame = queue.pop().unwrap();
        assert_eq!(frame.ref_count(), 1);
        assert!(queue.pop().is_none());
    }

    #[test]
    fn test_pull_errors() {
        let mut ports = PortSet::new(&["input"], &[]);
        assert!(matches!(
            ports.pull(0),
            Err(ProcessError::PortDisconnected { .. })
        ));

        ports.connect_input(0, FrameQueue::new());
        assert!(matches!(
            ports.pull(0),
            Err(ProcessError::InputExhausted { .. })
        ));
        assert!(matches!(
            ports.pull(7),
            Err(ProcessError::PortOutOfRange { index: 7 })
        ));
    }

    #[test]
    fn test_name_lookup_is_ordered() {
        let ports = PortSet::new(&["source", "overlay", "mask"], &["blended"]);
        assert_eq!(ports.input_index("source"), Some(0));
        assert_eq!(ports.input_index("overlay"), Some(1));
        assert_eq!(ports.input_index("mask"), Some(2));
        assert_eq!(ports.input_index("missing"), None);
        assert_eq!(ports.output_index("blended"), Some(0));
    }

    #[test]
    fn test_stage_lifecycle_and_relay() {
        let context = FilterContext::builder().build();
        let manager = FrameManager::unbounded();

        let mut stage = Stage::new(Box::new(Relay::new()));
        assert_eq!(stage.state(), FilterState::Constructed);

        // Processing before prepare is refused.
        assert!(matches!(
            stage.process(&context),
            Err(ProcessError::NotPrepared { .. })
        ));

        stage.negotiate_input("input", &native_fmt()).unwrap();
        assert_eq!(stage.state(), FilterState::Negotiating);

        stage.prepare(&context).unwrap();
        assert_eq!(stage.state(), FilterState::Prepared);

        let tap = stage.tap_output("output").unwrap();
        stage
            .feed("input", manager.allocate(native_fmt()).unwrap())
            .unwrap();

        let status = stage.process(&context).unwrap();
        assert_eq!(stage.state(), FilterState::Processing);
        assert!(status.contains(Status::WAIT_FOR_ALL_INPUTS));
        assert_eq!(tap.len(), 1);
    }

    #[test]
    fn test_connect_negotiates_and_wires() {
        let context = FilterContext::builder().build();
        let manager = FrameManager::unbounded();

        let mut upstream = Stage::new(Box::new(Relay::new()));
        let mut downstream = Stage::new(Box::new(Relay::new()));

        // Upstream has not negotiated: its output format is undefined.
        let err = Stage::connect(&mut upstream, "output", &mut downstream, "input").unwrap_err();
        assert!(matches!(err, NegotiationError::OutputUndefined { .. }));

        upstream.negotiate_input("input", &native_fmt()).unwrap();
        Stage::connect(&mut upstream, "output", &mut downstream, "input").unwrap();

        // Frames flow across the shared edge.
        upstream.prepare(&context).unwrap();
        downstream.prepare(&context).unwrap();
        let tap = downstream.tap_output("output").unwrap();

        upstream
            .feed("input", manager.allocate(native_fmt()).unwrap())
            .unwrap();
        upstream.process(&context).unwrap();
        downstream.process(&context).unwrap();
        assert_eq!(tap.len(), 1);
    }

    #[test]
    fn test_connect_refuses_double_wiring() {
        let mut upstream = Stage::new(Box::new(Relay::new()));
        let mut downstream = Stage::new(Box::new(Relay::new()));
        upstream.negotiate_input("input", &native_fmt()).unwrap();

        Stage::connect(&mut upstream, "output", &mut downstream, "input").unwrap();
        let err = Stage::connect(&mut upstream, "output", &mut downstream, "input").unwrap_err();
        assert!(matches!(err, NegotiationError::PortAlreadyConnected { .. }));
    }
}
