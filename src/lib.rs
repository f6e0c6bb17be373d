//! Multi-object track management and motion estimation.
//!
//! Detections arrive per frame from an injected [`Detector`]; a
//! [`TrackManager`] predicts every live track forward with a
//! constant-acceleration Kalman filter, matches predictions to detections by
//! IoU cost, bridges short detector gaps with an injected [`VisualTracker`],
//! and emits finalized [`Track`]s.

pub mod assignment;
pub mod bbox;
pub mod config;
pub mod detection;
pub mod detector;
pub mod error;
pub mod filter;
pub mod frame;
pub mod manager;
pub mod track;
pub mod visual;

pub use assignment::Assignment;
pub use bbox::Rect;
pub use config::TrackerConfig;
pub use detection::{Classification, Detection};
pub use detector::Detector;
pub use error::Error;
pub use filter::{MotionFilter, StateObserver};
pub use frame::Frame;
pub use manager::TrackManager;
pub use track::Track;
pub use visual::{VisualTracker, VisualTrackerFactory};
