use std::collections::HashMap;
use std::sync::Arc;

use crate::bbox::Rect;
use crate::detection::{Classification, Detection};
use crate::error::Error;
use crate::frame::Frame;

/// Per-frame detection source feeding the track manager.
///
/// Implementations wrap whatever inference backend the deployment uses; the
/// core only depends on this trait.
pub trait Detector: Send {
    fn detect(&mut self, frame: &Arc<Frame>) -> Result<Vec<Detection>, Error>;
}

/// Detector that replays a pre-recorded script of boxes keyed by frame index.
///
/// Used for regression runs and pipeline tests where real inference output
/// has been captured ahead of time.
#[derive(Default)]
pub struct ReplayDetector {
    script: HashMap<u64, Vec<(Rect, f32, Option<Classification>)>>,
}

impl ReplayDetector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, frame_index: u64, rect: Rect, confidence: f32, class: Option<Classification>) {
        self.script
            .entry(frame_index)
            .or_default()
            .push((rect, confidence, class));
    }
}

impl Detector for ReplayDetector {
    fn detect(&mut self, frame: &Arc<Frame>) -> Result<Vec<Detection>, Error> {
        Ok(self
            .script
            .get(&frame.index)
            .into_iter()
            .flatten()
            .map(|(rect, confidence, class)| {
                Detection::new(frame.clone(), *rect, *confidence, class.clone())
            })
            .collect())
    }
}

/// Resolves a detector implementation from its configured name.
pub fn select_detector(kind: &str) -> Result<Box<dyn Detector>, Error> {
    match kind {
        "replay" => Ok(Box::new(ReplayDetector::new())),
        other => Err(Error::UnknownDetector(other.to_string())),
    }
}
