use std::sync::Arc;

use log::{debug, trace};

use crate::bbox::Rect;
use crate::detection::Detection;
use crate::frame::Frame;

/// External single-target visual tracker used to bridge short detector gaps.
///
/// The core treats this as an opaque capability and tolerates either call
/// failing at any time.
pub trait VisualTracker: Send {
    /// Locks the tracker onto `seed` in `frame`. Returns false if tracking
    /// cannot start from that rectangle.
    fn init(&mut self, frame: &Frame, seed: Rect) -> bool;

    /// Follows the target into `frame`, returning its updated box, or `None`
    /// once the target is lost.
    fn update(&mut self, frame: &Frame) -> Option<Rect>;
}

/// Creates a fresh visual tracker instance for a track that needs one.
pub type VisualTrackerFactory = Box<dyn Fn() -> Box<dyn VisualTracker> + Send + Sync>;

/// Placeholder used when no visual tracker is injected: refuses to start, so
/// every extrapolation attempt fails and gaps terminate tracks immediately.
pub struct NullTracker;

impl VisualTracker for NullTracker {
    fn init(&mut self, _frame: &Frame, _seed: Rect) -> bool {
        false
    }

    fn update(&mut self, _frame: &Frame) -> Option<Rect> {
        None
    }
}

pub(crate) fn null_factory() -> Arc<VisualTrackerFactory> {
    Arc::new(Box::new(|| Box::new(NullTracker)))
}

/// Wraps one visual tracker instance for one track, producing synthesized
/// detections while the detector misses the object.
pub struct GapBridger {
    factory: Arc<VisualTrackerFactory>,
    tracker: Option<Box<dyn VisualTracker>>,
    seeded_at: Option<u64>,
}

impl GapBridger {
    pub(crate) fn new(factory: Arc<VisualTrackerFactory>) -> Self {
        Self {
            factory,
            tracker: None,
            seeded_at: None,
        }
    }

    /// Frame index at which the current tracker was seeded, if one is live.
    pub fn seeded_at(&self) -> Option<u64> {
        self.seeded_at
    }

    /// Attempts to extrapolate `last` into `frame`.
    ///
    /// Returns `None` when the frame gap exceeds `max_frame_gap`, when the
    /// seed rectangle has degenerate (<= 1px) overlap with its frame, or when
    /// the underlying tracker fails to start or to follow the target. The
    /// caller terminates the track on `None`.
    pub fn extrapolate(
        &mut self,
        last: &Detection,
        frame: &Arc<Frame>,
        last_measured_frame: u64,
        max_frame_gap: u64,
    ) -> Option<Detection> {
        if frame.index - last_measured_frame > max_frame_gap {
            trace!(
                "extrapolation stopped, frame gap {} > {}",
                frame.index - last_measured_frame,
                max_frame_gap
            );
            return None;
        }

        if self.tracker.is_none() {
            let seed = last.rect().clip_to(&last.frame().bounds());
            if seed.width <= 1.0 || seed.height <= 1.0 {
                debug!("cannot seed visual tracker, degenerate box {seed:?}");
                return None;
            }

            let mut tracker = (self.factory)();
            if !tracker.init(last.frame(), seed) {
                debug!("visual tracker refused seed {seed:?}");
                return None;
            }

            trace!("visual tracker seeded at frame {}", frame.index);
            self.tracker = Some(tracker);
            self.seeded_at = Some(frame.index);
        }

        let rect = self.tracker.as_mut()?.update(frame)?;
        trace!(
            "visual tracker followed {:?} to {rect:?} at frame {}",
            last.rect(),
            frame.index
        );

        Some(Detection::synthesized(
            frame.clone(),
            rect,
            last.class().cloned(),
        ))
    }

    /// Drops the owned tracker so the track re-seeds after its next real
    /// measurement.
    pub fn reset(&mut self) {
        self.tracker = None;
        self.seeded_at = None;
    }
}
