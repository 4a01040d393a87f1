//! Generic `ImageSource` trait for anything that yields timestamped frames.

use std::collections::VecDeque;

use mapfuse_types::{MapError, RawImage};

/// A camera, log reader or transport subscription that yields sensor frames
/// in acquisition order.
pub trait ImageSource: Send {
    /// Stable identifier for this source, e.g. `"map_input_image"`.
    fn id(&self) -> &str;

    /// Return the next available frame, or `Ok(None)` once the stream has
    /// ended.
    ///
    /// # Errors
    ///
    /// Returns an error when the underlying device or transport fails.  The
    /// caller logs it and keeps polling; a single failed read is not fatal.
    fn next_frame(&mut self) -> Result<Option<RawImage>, MapError>;
}

/// An [`ImageSource`] over a pre-recorded queue of frames.
///
/// Handy for replaying captured data and for tests.
pub struct QueuedSource {
    id: String,
    frames: VecDeque<RawImage>,
}

impl QueuedSource {
    pub fn new(id: impl Into<String>, frames: impl IntoIterator<Item = RawImage>) -> Self {
        Self {
            id: id.into(),
            frames: frames.into_iter().collect(),
        }
    }

    /// Frames not yet handed out.
    pub fn remaining(&self) -> usize {
        self.frames.len()
    }
}

impl ImageSource for QueuedSource {
    fn id(&self) -> &str {
        &self.id
    }

    fn next_frame(&mut self) -> Result<Option<RawImage>, MapError> {
        Ok(self.frames.pop_front())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn queued_source_yields_in_order_then_ends() {
        let t0 = Utc::now();
        let t1 = t0 + chrono::Duration::milliseconds(100);
        let mut src = QueuedSource::new(
            "replay",
            vec![
                RawImage::mono8(t0, 2, 2, vec![1; 4]),
                RawImage::mono8(t1, 2, 2, vec![2; 4]),
            ],
        );
        assert_eq!(src.id(), "replay");
        assert_eq!(src.remaining(), 2);

        let first = src.next_frame().unwrap().expect("first frame");
        assert_eq!(first.stamp, t0);
        let second = src.next_frame().unwrap().expect("second frame");
        assert_eq!(second.data, vec![2; 4]);
        assert!(src.next_frame().unwrap().is_none());
    }
}
