use std::mem;
use std::sync::Arc;

use log::{debug, warn};

use crate::assignment::assign;
use crate::config::TrackerConfig;
use crate::detection::Detection;
use crate::error::Error;
use crate::filter::StateObserver;
use crate::frame::Frame;
use crate::track::Track;
use crate::visual::{null_factory, VisualTrackerFactory};

#[derive(Clone, Copy)]
enum Fate {
    Keep,
    Finalize,
    Discard,
}

/// Owns all live tracks for one video job and drives the per-frame
/// predict / assign / update cycle.
///
/// One manager per job; frames must be fed in temporal order. The manager is
/// `Send`, so a job can migrate between worker threads, but it is never
/// shared between frames in flight.
pub struct TrackManager {
    config: TrackerConfig,
    factory: Arc<VisualTrackerFactory>,
    observer: Option<Box<dyn StateObserver>>,
    tracks: Vec<Track>,
    finished: Vec<Track>,
    next_id: u64,
    last_timestamp: Option<f32>,
}

impl TrackManager {
    pub fn new(config: TrackerConfig) -> Result<Self, Error> {
        config.validate()?;
        Ok(Self {
            config,
            factory: null_factory(),
            observer: None,
            tracks: Vec::new(),
            finished: Vec::new(),
            next_id: 0,
            last_timestamp: None,
        })
    }

    /// Installs the visual tracker used to bridge detector gaps. Without one,
    /// every gap terminates its track.
    pub fn with_visual_tracker_factory(mut self, factory: VisualTrackerFactory) -> Self {
        self.factory = Arc::new(factory);
        self
    }

    /// Installs a hook that receives filter state after every predict and
    /// correct step.
    pub fn with_observer(mut self, observer: Box<dyn StateObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    #[inline]
    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    #[inline]
    pub fn live_tracks(&self) -> &[Track] {
        &self.tracks
    }

    /// Drains tracks finalized so far, preserving finalization order.
    pub fn take_finished(&mut self) -> Vec<Track> {
        mem::take(&mut self.finished)
    }

    /// Advances all tracks to `frame` and folds in its detections.
    ///
    /// Matched tracks absorb their detection as a measurement; unmatched
    /// tracks are gap-bridged, finalized, or, if still at their seed,
    /// discarded; unmatched detections seed new tracks.
    pub fn process_frame(
        &mut self,
        frame: &Arc<Frame>,
        detections: Vec<Detection>,
    ) -> Result<(), Error> {
        if let Some(previous) = self.last_timestamp {
            if frame.timestamp <= previous {
                return Err(Error::FrameOrder {
                    current: frame.timestamp,
                    previous,
                });
            }
        }
        self.last_timestamp = Some(frame.timestamp);

        for track in &mut self.tracks {
            track.predict(frame.timestamp);
            if let (Some(observer), Some((state, cov))) =
                (&mut self.observer, track.filter_snapshot())
            {
                observer.on_predict(track.id(), &state, &cov);
            }
        }

        let assignment = assign(&self.tracks, &detections, &self.config)?;
        let mut slots: Vec<Option<Detection>> = detections.into_iter().map(Some).collect();
        let mut fates = vec![Fate::Keep; self.tracks.len()];

        for (track_idx, det_idx) in assignment.matches {
            let detection = match slots[det_idx].take() {
                Some(detection) => detection,
                None => continue,
            };

            let track = &mut self.tracks[track_idx];
            match track.record_measurement(detection) {
                Ok(()) => {
                    if let (Some(observer), Some((state, cov))) =
                        (&mut self.observer, track.filter_snapshot())
                    {
                        observer.on_correct(track.id(), &state, &cov);
                    }
                }
                Err(e) => {
                    warn!("track {} dropped after failed correction: {e}", track.id());
                    fates[track_idx] = Fate::Finalize;
                }
            }
        }

        for track_idx in assignment.unmatched_tracks {
            let track = &mut self.tracks[track_idx];

            // a track that never grew past its seed is noise, not a track
            if !track.has_been_extended() {
                debug!("discarding singleton track {}", track.id());
                fates[track_idx] = Fate::Discard;
                continue;
            }

            match track.extrapolate(frame, self.config.max_frame_gap) {
                Ok(true) => {
                    if let (Some(observer), Some((state, cov))) =
                        (&mut self.observer, track.filter_snapshot())
                    {
                        observer.on_correct(track.id(), &state, &cov);
                    }
                }
                Ok(false) => fates[track_idx] = Fate::Finalize,
                Err(e) => {
                    warn!("track {} dropped after failed extrapolation: {e}", track.id());
                    fates[track_idx] = Fate::Finalize;
                }
            }
        }

        let live = mem::take(&mut self.tracks);
        for (track, fate) in live.into_iter().zip(fates) {
            match fate {
                Fate::Keep => self.tracks.push(track),
                Fate::Finalize => {
                    debug!(
                        "finalized track {} ({} detections, frames {}..={})",
                        track.id(),
                        track.len(),
                        track.start_frame(),
                        track.stop_frame()
                    );
                    self.finished.push(track);
                }
                Fate::Discard => {}
            }
        }

        for det_idx in assignment.unmatched_detections {
            if let Some(detection) = slots[det_idx].take() {
                let track = Track::new(self.next_id, detection, &self.config, self.factory.clone());
                debug!(
                    "started track {} at frame {} ({:?})",
                    track.id(),
                    frame.index,
                    track.predicted_rect()
                );
                self.next_id += 1;
                self.tracks.push(track);
            }
        }

        Ok(())
    }

    /// Ends the job: every still-live track is finalized, and all finished
    /// tracks are returned in finalization order.
    pub fn finish(mut self) -> Vec<Track> {
        self.finished.append(&mut self.tracks);
        self.finished
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::bbox::Rect;
    use crate::filter::STATE_DIM;
    use crate::visual::VisualTracker;

    fn frame(index: u64) -> Arc<Frame> {
        Arc::new(Frame::bare(index, index as f32 * 0.04, 640, 480))
    }

    fn detection(f: &Arc<Frame>, x: f32, y: f32) -> Detection {
        Detection::new(f.clone(), Rect::new(x, y, 40.0, 40.0), 0.9, None)
    }

    /// Follows its seed box with a fixed horizontal drift per update.
    struct DriftTracker {
        rect: Option<Rect>,
        step: f32,
    }

    impl VisualTracker for DriftTracker {
        fn init(&mut self, _frame: &Frame, seed: Rect) -> bool {
            self.rect = Some(seed);
            true
        }

        fn update(&mut self, _frame: &Frame) -> Option<Rect> {
            let rect = self.rect.as_mut()?;
            rect.x += self.step;
            Some(*rect)
        }
    }

    fn drift_factory(step: f32) -> VisualTrackerFactory {
        Box::new(move || {
            Box::new(DriftTracker {
                rect: None,
                step,
            })
        })
    }

    #[test]
    fn two_objects_yield_two_clean_tracks() {
        let mut manager = TrackManager::new(TrackerConfig::default()).unwrap();

        for idx in 0..5u64 {
            let f = frame(idx);
            let drift = 2.0 * idx as f32;
            let detections = vec![
                detection(&f, 100.0 + drift, 100.0),
                detection(&f, 300.0 + drift, 100.0),
            ];
            manager.process_frame(&f, detections).unwrap();
        }

        let mut tracks = manager.finish();
        assert_eq!(tracks.len(), 2);
        tracks.sort_by_key(Track::id);

        for track in &tracks {
            assert_eq!(track.len(), 5);
            assert_eq!(track.start_frame(), 0);
            assert_eq!(track.stop_frame(), 4);

            // detections stay temporally ordered and follow the drift
            let xs: Vec<f32> = track.detections().iter().map(|d| d.rect().x).collect();
            assert!(xs.windows(2).all(|w| w[1] > w[0]), "xs = {xs:?}");
            assert!(track.detections().iter().all(|d| !d.is_synthesized()));
        }

        assert_eq!(tracks[0].detections()[0].rect().x, 100.0);
        assert_eq!(tracks[1].detections()[0].rect().x, 300.0);
    }

    #[test]
    fn detector_gap_is_bridged_within_budget() {
        let config = TrackerConfig {
            max_frame_gap: 2,
            ..TrackerConfig::default()
        };
        let mut manager = TrackManager::new(config)
            .unwrap()
            .with_visual_tracker_factory(drift_factory(2.0));

        for idx in 0..3u64 {
            let f = frame(idx);
            let dets = vec![detection(&f, 100.0 + 2.0 * idx as f32, 100.0)];
            manager.process_frame(&f, dets).unwrap();
        }

        // detector miss at frame 3
        let f3 = frame(3);
        manager.process_frame(&f3, Vec::new()).unwrap();
        assert_eq!(manager.live_tracks().len(), 1);

        // object re-detected at its drifted position
        let f4 = frame(4);
        manager
            .process_frame(&f4, vec![detection(&f4, 108.0, 100.0)])
            .unwrap();

        let tracks = manager.finish();
        assert_eq!(tracks.len(), 1);
        let track = &tracks[0];
        assert_eq!(track.len(), 5);

        let bridged = &track.detections()[3];
        assert!(bridged.is_synthesized());
        assert_eq!(bridged.confidence(), 0.0);
        assert_eq!(bridged.frame_index(), 3);
        assert!(!track.detections()[4].is_synthesized());
    }

    #[test]
    fn exhausted_gap_budget_splits_the_track() {
        let config = TrackerConfig {
            max_frame_gap: 0,
            ..TrackerConfig::default()
        };
        let mut manager = TrackManager::new(config)
            .unwrap()
            .with_visual_tracker_factory(drift_factory(2.0));

        for idx in 0..3u64 {
            let f = frame(idx);
            let dets = vec![detection(&f, 100.0 + 2.0 * idx as f32, 100.0)];
            manager.process_frame(&f, dets).unwrap();
        }

        let f3 = frame(3);
        manager.process_frame(&f3, Vec::new()).unwrap();
        // budget of zero: the miss finalizes the track immediately
        assert!(manager.live_tracks().is_empty());

        let f4 = frame(4);
        manager
            .process_frame(&f4, vec![detection(&f4, 108.0, 100.0)])
            .unwrap();

        let tracks = manager.finish();
        assert_eq!(tracks.len(), 2);
        assert_eq!(tracks[0].len(), 3);
        assert_eq!(tracks[1].len(), 1);
        assert_eq!(tracks[1].start_frame(), 4);
    }

    #[test]
    fn extrapolation_stops_once_budget_runs_out() {
        let config = TrackerConfig {
            max_frame_gap: 1,
            ..TrackerConfig::default()
        };
        // the mock never loses the target; only the budget can stop it
        let mut manager = TrackManager::new(config)
            .unwrap()
            .with_visual_tracker_factory(drift_factory(2.0));

        for idx in 0..2u64 {
            let f = frame(idx);
            let dets = vec![detection(&f, 100.0 + 2.0 * idx as f32, 100.0)];
            manager.process_frame(&f, dets).unwrap();
        }

        let f2 = frame(2);
        manager.process_frame(&f2, Vec::new()).unwrap();
        assert_eq!(manager.live_tracks().len(), 1);

        let f3 = frame(3);
        manager.process_frame(&f3, Vec::new()).unwrap();
        assert!(manager.live_tracks().is_empty());

        let tracks = manager.finish();
        assert_eq!(tracks.len(), 1);
        assert_eq!(tracks[0].len(), 3);
        assert!(tracks[0].detections()[2].is_synthesized());
    }

    #[test]
    fn singleton_track_is_discarded_not_extrapolated() {
        let mut manager = TrackManager::new(TrackerConfig::default())
            .unwrap()
            .with_visual_tracker_factory(drift_factory(2.0));

        let f0 = frame(0);
        manager
            .process_frame(&f0, vec![detection(&f0, 100.0, 100.0)])
            .unwrap();

        let f1 = frame(1);
        manager.process_frame(&f1, Vec::new()).unwrap();

        assert!(manager.live_tracks().is_empty());
        assert!(manager.finish().is_empty());
    }

    #[test]
    fn kalman_disabled_still_chains_detections() {
        let config = TrackerConfig {
            kalman_enabled: false,
            ..TrackerConfig::default()
        };
        let mut manager = TrackManager::new(config).unwrap();

        for idx in 0..3u64 {
            let f = frame(idx);
            let dets = vec![detection(&f, 100.0 + 2.0 * idx as f32, 100.0)];
            manager.process_frame(&f, dets).unwrap();
        }

        let tracks = manager.finish();
        assert_eq!(tracks.len(), 1);
        assert_eq!(tracks[0].len(), 3);
        assert!(tracks[0].filter_snapshot().is_none());
    }

    #[test]
    fn observer_sees_every_predict_and_correct() {
        #[derive(Default)]
        struct Counts {
            predicts: usize,
            corrects: usize,
        }

        struct Recorder(Arc<Mutex<Counts>>);

        impl StateObserver for Recorder {
            fn on_predict(
                &mut self,
                _track_id: u64,
                state: &[f32; STATE_DIM],
                _cov: &[f32; STATE_DIM],
            ) {
                assert!(state.iter().all(|v| v.is_finite()));
                self.0.lock().unwrap().predicts += 1;
            }

            fn on_correct(
                &mut self,
                _track_id: u64,
                state: &[f32; STATE_DIM],
                _cov: &[f32; STATE_DIM],
            ) {
                assert!(state.iter().all(|v| v.is_finite()));
                self.0.lock().unwrap().corrects += 1;
            }
        }

        let counts = Arc::new(Mutex::new(Counts::default()));
        let mut manager = TrackManager::new(TrackerConfig::default())
            .unwrap()
            .with_observer(Box::new(Recorder(counts.clone())));

        for idx in 0..3u64 {
            let f = frame(idx);
            let dets = vec![detection(&f, 100.0 + 2.0 * idx as f32, 100.0)];
            manager.process_frame(&f, dets).unwrap();
        }

        let counts = counts.lock().unwrap();
        // no track exists yet on frame 0, so two predicts; two corrects for
        // the matched measurements on frames 1 and 2
        assert_eq!(counts.predicts, 2);
        assert_eq!(counts.corrects, 2);
    }

    #[test]
    fn out_of_order_frame_is_rejected() {
        let mut manager = TrackManager::new(TrackerConfig::default()).unwrap();

        let f0 = frame(0);
        manager
            .process_frame(&f0, vec![detection(&f0, 100.0, 100.0)])
            .unwrap();

        let stale = Arc::new(Frame::bare(1, 0.0, 640, 480));
        let err = manager.process_frame(&stale, Vec::new()).unwrap_err();
        assert!(matches!(err, Error::FrameOrder { .. }));
    }

    #[test]
    fn track_ids_are_unique_and_monotonic() {
        let mut manager = TrackManager::new(TrackerConfig::default()).unwrap();

        let f0 = frame(0);
        manager
            .process_frame(
                &f0,
                vec![detection(&f0, 100.0, 100.0), detection(&f0, 300.0, 100.0)],
            )
            .unwrap();

        // both singletons die, then a fresh object appears
        let f1 = frame(1);
        manager.process_frame(&f1, Vec::new()).unwrap();
        let f2 = frame(2);
        manager
            .process_frame(&f2, vec![detection(&f2, 500.0, 300.0)])
            .unwrap();

        assert_eq!(manager.live_tracks().len(), 1);
        // ids of discarded tracks are never reused
        assert_eq!(manager.live_tracks()[0].id(), 2);
    }
}
