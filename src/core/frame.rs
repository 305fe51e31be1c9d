//! Reference-counted frames and the budgeted frame allocator.
//!
//! A [`Frame`] is a shared handle to an immutable format plus a byte
//! payload. Cloning the handle acquires a reference and dropping it
//! releases one; there is no manual release call. Pushing a frame onto an
//! edge moves the producer's handle, so a `process` body that pulls,
//! pushes, and falls off the end of its scope conserves references on
//! every exit path, including early error returns.
//!
//! Payload writes are exclusive-only: [`Frame::data_mut`] yields a mutable
//! slice only while no other handle exists. Once a frame has been shared
//! its contents are frozen.

use crate::core::error::{ProcessError, ProcessResult};
use crate::core::format::FrameFormat;
use log::trace;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Budget reservation held for the lifetime of a frame's payload.
///
/// Returned to the ledger when the last frame handle drops.
struct Reservation {
    bytes: usize,
    ledger: Arc<AtomicUsize>,
}

impl Drop for Reservation {
    fn drop(&mut self) {
        self.ledger.fetch_sub(self.bytes, Ordering::SeqCst);
        trace!("released {} byte frame reservation", self.bytes);
    }
}

struct FrameInner {
    format: FrameFormat,
    data: Vec<u8>,
    _reservation: Option<Reservation>,
}

/// A reference-counted handle to sample data plus its format.
///
/// The format never changes after creation.
#[derive(Clone)]
pub struct Frame {
    inner: Arc<FrameInner>,
}

impl Frame {
    fn new(format: FrameFormat, data: Vec<u8>, reservation: Option<Reservation>) -> Self {
        Self {
            inner: Arc::new(FrameInner {
                format,
                data,
                _reservation: reservation,
            }),
        }
    }

    /// The format this frame was allocated with.
    pub fn format(&self) -> &FrameFormat {
        &self.inner.format
    }

    /// Read-only view of the payload.
    pub fn data(&self) -> &[u8] {
        &self.inner.data
    }

    /// Mutable view of the payload, available only while this is the sole
    /// handle. Returns `None` once the frame has been shared.
    pub fn data_mut(&mut self) -> Option<&mut [u8]> {
        Arc::get_mut(&mut self.inner).map(|inner| inner.data.as_mut_slice())
    }

    /// Payload length in bytes.
    pub fn len(&self) -> usize {
        self.inner.data.len()
    }

    /// Whether the payload is empty.
    pub fn is_empty(&self) -> bool {
        self.inner.data.is_empty()
    }

    /// Number of live handles to this frame's payload.
    ///
    /// Exposed so reference conservation is observable in tests.
    pub fn ref_count(&self) -> usize {
        Arc::strong_count(&self.inner)
    }
}

impl std::fmt::Debug for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Frame")
            .field("format", &self.inner.format)
            .field("len", &self.inner.data.len())
            .field("refs", &self.ref_count())
            .finish()
    }
}

/// Host-memory frame allocator with a byte budget.
///
/// Allocation beyond the budget fails with
/// [`ProcessError::ResourceExhaustion`]; reservations are returned
/// automatically when the last handle to a frame drops.
#[derive(Clone)]
pub struct FrameManager {
    budget: usize,
    in_use: Arc<AtomicUsize>,
}

impl FrameManager {
    /// Create a manager with the given byte budget.
    pub fn new(budget: usize) -> Self {
        Self {
            budget,
            in_use: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Create a manager with no practical budget.
    pub fn unbounded() -> Self {
        Self::new(usize::MAX)
    }

    /// Allocate a zeroed frame sized by `format`.
    pub fn allocate(&self, format: FrameFormat) -> ProcessResult<Frame> {
        let bytes = format.frame_bytes();
        let reservation = self.reserve(bytes)?;
        trace!("allocated {} byte frame for {}", bytes, format);
        Ok(Frame::new(format, vec![0; bytes], Some(reservation)))
    }

    /// Allocate a frame carrying an existing payload.
    ///
    /// Used by sources feeding decoded data into a pipeline. The payload
    /// must match the format's size when the format carries dimensions.
    pub fn allocate_from(&self, format: FrameFormat, data: Vec<u8>) -> ProcessResult<Frame> {
        if format.has_dimensions() && data.len() != format.frame_bytes() {
            return Err(ProcessError::PayloadMismatch {
                expected: format.frame_bytes(),
                actual: data.len(),
            });
        }
        let reservation = self.reserve(data.len())?;
        Ok(Frame::new(format, data, Some(reservation)))
    }

    fn reserve(&self, bytes: usize) -> ProcessResult<Reservation> {
        self.in_use
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |current| {
                current.checked_add(bytes).filter(|total| *total <= self.budget)
            })
            .map_err(|current| ProcessError::ResourceExhaustion {
                requested: bytes,
                in_use: current,
                budget: self.budget,
            })?;
        Ok(Reservation {
            bytes,
            ledger: Arc::clone(&self.in_use),
        })
    }

    /// Bytes currently reserved by live frames.
    pub fn in_use(&self) -> usize {
        self.in_use.load(Ordering::SeqCst)
    }

    /// The configured byte budget.
    pub fn budget(&self) -> usize {
        self.budget
    }
}

impl Default for FrameManager {
    fn default() -> Self {
        Self::unbounded()
    }
}
