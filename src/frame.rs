use std::fmt;
use std::sync::Arc;

use crate::bbox::Rect;

/// One decoded video frame as delivered by the job driver.
///
/// The pixel payload is opaque to the tracking core: it is handed to the
/// [`VisualTracker`](crate::visual::VisualTracker) verbatim and never
/// interpreted here. Only the dimensions are used, for clipping seed
/// rectangles to the frame canvas.
pub struct Frame {
    pub index: u64,
    /// Presentation time in seconds.
    pub timestamp: f32,
    pub width: u32,
    pub height: u32,
    pub image: Arc<[u8]>,
}

impl Frame {
    pub fn new(index: u64, timestamp: f32, width: u32, height: u32, image: Arc<[u8]>) -> Self {
        Self {
            index,
            timestamp,
            width,
            height,
            image,
        }
    }

    /// Frame with an empty pixel payload, for pipelines (and tests) where no
    /// visual tracker ever touches the image.
    pub fn bare(index: u64, timestamp: f32, width: u32, height: u32) -> Self {
        Self::new(index, timestamp, width, height, Arc::from(Vec::new()))
    }

    /// Clipping rectangle covering the whole frame canvas.
    #[inline]
    pub fn bounds(&self) -> Rect {
        Rect::new(0.0, 0.0, self.width as f32, self.height as f32)
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Frame")
            .field("index", &self.index)
            .field("timestamp", &self.timestamp)
            .field("width", &self.width)
            .field("height", &self.height)
            .field("image_bytes", &self.image.len())
            .finish()
    }
}
