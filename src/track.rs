use std::sync::Arc;

use log::trace;

use crate::bbox::Rect;
use crate::config::TrackerConfig;
use crate::detection::{Classification, Detection};
use crate::error::Error;
use crate::filter::{MotionFilter, STATE_DIM};
use crate::frame::Frame;
use crate::visual::{GapBridger, VisualTrackerFactory};

/// One temporally ordered set of detections believed to belong to the same
/// object, together with its live motion estimate.
///
/// History is append-only; a finalized track is surrendered by value and
/// never mutated again.
pub struct Track {
    id: u64,
    history: Vec<Detection>,
    filter: Option<MotionFilter>,
    bridger: GapBridger,
    last_measured_frame: u64,
    predicted: Rect,
}

impl Track {
    /// Creates a track from its seed detection. The motion filter is omitted
    /// when kalman filtering is disabled, degrading the track to
    /// detection-only chaining.
    pub(crate) fn new(
        id: u64,
        seed: Detection,
        config: &TrackerConfig,
        factory: Arc<VisualTrackerFactory>,
    ) -> Self {
        let filter = config.kalman_enabled.then(|| {
            MotionFilter::new(
                seed.frame().timestamp,
                config.frame_interval,
                seed.rect(),
                config.measurement_noise,
                config.process_noise,
                config.initial_variance_factor,
            )
        });

        let predicted = seed.rect();
        let last_measured_frame = seed.frame_index();

        Self {
            id,
            history: vec![seed],
            filter,
            bridger: GapBridger::new(factory),
            last_measured_frame,
            predicted,
        }
    }

    #[inline]
    pub fn id(&self) -> u64 {
        self.id
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.history.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    #[inline]
    pub fn detections(&self) -> &[Detection] {
        &self.history
    }

    pub fn into_detections(self) -> Vec<Detection> {
        self.history
    }

    pub fn start_frame(&self) -> u64 {
        self.history.first().map(Detection::frame_index).unwrap_or(0)
    }

    pub fn stop_frame(&self) -> u64 {
        self.history.last().map(Detection::frame_index).unwrap_or(0)
    }

    /// Frame index of the last real (detector-sourced) measurement.
    #[inline]
    pub fn last_measured_frame(&self) -> u64 {
        self.last_measured_frame
    }

    /// True once the track has grown past its seed detection.
    #[inline]
    pub fn has_been_extended(&self) -> bool {
        self.history.len() > 1
    }

    pub fn latest_class(&self) -> Option<&Classification> {
        self.history.last().and_then(Detection::class)
    }

    /// Box the assignment engine matches against for the current frame.
    #[inline]
    pub fn predicted_rect(&self) -> Rect {
        self.predicted
    }

    /// Advances the motion filter to `t` and caches the predicted box.
    /// Without a filter the last known box stands in as the prediction.
    pub(crate) fn predict(&mut self, t: f32) {
        self.predicted = match &mut self.filter {
            Some(filter) => {
                filter.predict(t);
                filter.state_rect()
            }
            None => self
                .history
                .last()
                .map(Detection::rect)
                .unwrap_or(self.predicted),
        };
    }

    /// Accepts a real measurement: corrects the filter, appends the
    /// detection, and re-arms the gap bridger for a fresh seed.
    pub(crate) fn record_measurement(&mut self, detection: Detection) -> Result<(), Error> {
        if let Some(filter) = &mut self.filter {
            filter.correct(&detection.rect())?;
        }

        trace!(
            "track {} extended to frame {} at {:?}",
            self.id,
            detection.frame_index(),
            detection.rect()
        );

        self.last_measured_frame = detection.frame_index();
        self.history.push(detection);
        self.bridger.reset();

        Ok(())
    }

    /// Bridges a detector miss with the visual tracker. Returns `Ok(false)`
    /// when the track cannot be extended and must be finalized.
    pub(crate) fn extrapolate(
        &mut self,
        frame: &Arc<Frame>,
        max_frame_gap: u64,
    ) -> Result<bool, Error> {
        let last = match self.history.last() {
            Some(detection) => detection.clone(),
            None => return Ok(false),
        };

        let synthesized =
            match self
                .bridger
                .extrapolate(&last, frame, self.last_measured_frame, max_frame_gap)
            {
                Some(detection) => detection,
                None => return Ok(false),
            };

        // keep subsequent predictions anchored to the extrapolated position
        if let Some(filter) = &mut self.filter {
            filter.correct(&synthesized.rect())?;
        }

        trace!(
            "track {} gap-bridged to frame {} at {:?}",
            self.id,
            frame.index,
            synthesized.rect()
        );
        self.history.push(synthesized);

        Ok(true)
    }

    /// Filter state and covariance diagonal for the injected observer;
    /// `None` when kalman filtering is disabled.
    pub(crate) fn filter_snapshot(&self) -> Option<([f32; STATE_DIM], [f32; STATE_DIM])> {
        self.filter
            .as_ref()
            .map(|f| (f.state_array(), f.covariance_diagonal()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::visual::null_factory;

    fn frame(index: u64) -> Arc<Frame> {
        Arc::new(Frame::bare(index, index as f32 * 0.04, 640, 480))
    }

    fn detection(f: &Arc<Frame>, x: f32) -> Detection {
        Detection::new(f.clone(), Rect::new(x, 100.0, 40.0, 40.0), 0.9, None)
    }

    #[test]
    fn seed_initializes_bookkeeping() {
        let f0 = frame(0);
        let track = Track::new(
            7,
            detection(&f0, 100.0),
            &TrackerConfig::default(),
            null_factory(),
        );

        assert_eq!(track.id(), 7);
        assert_eq!(track.len(), 1);
        assert_eq!(track.start_frame(), 0);
        assert_eq!(track.stop_frame(), 0);
        assert_eq!(track.last_measured_frame(), 0);
        assert!(!track.has_been_extended());
        assert_eq!(track.predicted_rect(), Rect::new(100.0, 100.0, 40.0, 40.0));
    }

    #[test]
    fn measurement_extends_history_in_order() {
        let f0 = frame(0);
        let mut track = Track::new(
            1,
            detection(&f0, 100.0),
            &TrackerConfig::default(),
            null_factory(),
        );

        for idx in 1..=3u64 {
            let f = frame(idx);
            track.predict(f.timestamp);
            track
                .record_measurement(detection(&f, 100.0 + 2.0 * idx as f32))
                .unwrap();
        }

        assert_eq!(track.len(), 4);
        assert_eq!(track.last_measured_frame(), 3);
        assert!(track.has_been_extended());
        let frames: Vec<u64> = track
            .detections()
            .iter()
            .map(Detection::frame_index)
            .collect();
        assert_eq!(frames, vec![0, 1, 2, 3]);
    }

    #[test]
    fn disabled_kalman_predicts_last_box() {
        let config = TrackerConfig {
            kalman_enabled: false,
            ..TrackerConfig::default()
        };

        let f0 = frame(0);
        let mut track = Track::new(1, detection(&f0, 100.0), &config, null_factory());
        assert!(track.filter_snapshot().is_none());

        let f1 = frame(1);
        track.predict(f1.timestamp);
        track.record_measurement(detection(&f1, 110.0)).unwrap();

        let f2 = frame(2);
        track.predict(f2.timestamp);
        assert_eq!(track.predicted_rect(), Rect::new(110.0, 100.0, 40.0, 40.0));
    }

    #[test]
    fn extrapolation_fails_without_visual_tracker() {
        let f0 = frame(0);
        let mut track = Track::new(
            1,
            detection(&f0, 100.0),
            &TrackerConfig::default(),
            null_factory(),
        );

        let f1 = frame(1);
        assert!(!track.extrapolate(&f1, 4).unwrap());
        assert_eq!(track.len(), 1);
    }
}
