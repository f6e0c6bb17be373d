use std::sync::Arc;

use serde_derive::{Deserialize, Serialize};

use crate::bbox::Rect;
use crate::frame::Frame;

/// Class label with its score, as reported by the detector backend.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Classification {
    pub label: String,
    pub score: f32,
}

/// One observation of an object in one frame.
///
/// Detections are immutable once constructed: the tracking core only reads
/// them or synthesizes gap-bridged ones via [`Detection::synthesized`].
#[derive(Debug, Clone)]
pub struct Detection {
    frame: Arc<Frame>,
    rect: Rect,
    confidence: f32,
    class: Option<Classification>,
}

impl Detection {
    pub fn new(
        frame: Arc<Frame>,
        rect: Rect,
        confidence: f32,
        class: Option<Classification>,
    ) -> Self {
        Self {
            frame,
            rect,
            confidence,
            class,
        }
    }

    /// Gap-bridged detection: confidence 0 marks it as non-measured; the
    /// classification payload is carried over from the predecessor unchanged.
    pub fn synthesized(frame: Arc<Frame>, rect: Rect, class: Option<Classification>) -> Self {
        Self {
            frame,
            rect,
            confidence: 0.0,
            class,
        }
    }

    #[inline]
    pub fn frame(&self) -> &Arc<Frame> {
        &self.frame
    }

    #[inline]
    pub fn frame_index(&self) -> u64 {
        self.frame.index
    }

    #[inline]
    pub fn rect(&self) -> Rect {
        self.rect
    }

    #[inline]
    pub fn confidence(&self) -> f32 {
        self.confidence
    }

    #[inline]
    pub fn class(&self) -> Option<&Classification> {
        self.class.as_ref()
    }

    /// True for gap-bridged entries produced by the visual tracker rather
    /// than the detector.
    #[inline]
    pub fn is_synthesized(&self) -> bool {
        self.confidence == 0.0
    }
}
