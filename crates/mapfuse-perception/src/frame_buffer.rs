//! Frame Buffer: the pipeline's single working copy of the latest frame.
//!
//! Two states.  `Empty` until the first frame arrives, which allocates the
//! buffer; `Ready` afterwards, where each new frame is copied into the same
//! allocation.  The sensor resolution is fixed for the process lifetime, so a
//! frame with different dimensions is a configuration error rather than a
//! reason to reallocate.

use image::GrayImage;
use mapfuse_types::MapError;
use tracing::debug;

/// Ingestion state of a [`FrameBuffer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferState {
    /// No frame received yet.
    Empty,
    /// Holds a valid frame.
    Ready,
}

#[derive(Debug, Default)]
pub struct FrameBuffer {
    slot: Option<GrayImage>,
    ingested: u64,
}

impl FrameBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> BufferState {
        if self.slot.is_some() {
            BufferState::Ready
        } else {
            BufferState::Empty
        }
    }

    /// Store `frame` as the current frame.
    ///
    /// # Errors
    ///
    /// Returns [`MapError::Configuration`] when the buffer is `Ready` and
    /// `frame` has different dimensions.  The buffered frame is left as is.
    pub fn ingest(&mut self, frame: &GrayImage) -> Result<(), MapError> {
        match &mut self.slot {
            None => {
                debug!(width = frame.width(), height = frame.height(), "frame buffer allocated");
                self.slot = Some(frame.clone());
            }
            Some(current) => {
                if current.width() != frame.width() || current.height() != frame.height() {
                    return Err(MapError::Configuration(format!(
                        "sensor resolution changed from {}x{} to {}x{}",
                        current.width(),
                        current.height(),
                        frame.width(),
                        frame.height()
                    )));
                }
                current.copy_from_slice(frame.as_raw());
            }
        }
        self.ingested += 1;
        Ok(())
    }

    /// The buffered frame, if any.
    pub fn frame(&self) -> Option<&GrayImage> {
        self.slot.as_ref()
    }

    /// Frames accepted since construction.
    pub fn ingested(&self) -> u64 {
        self.ingested
    }

    /// `(width, height)` fixed by the first frame.
    pub fn dimensions(&self) -> Option<(u32, u32)> {
        self.slot.as_ref().map(|f| (f.width(), f.height()))
    }
}
