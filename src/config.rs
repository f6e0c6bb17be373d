use serde_derive::{Deserialize, Serialize};

use crate::error::Error;

/// Per-job tracking parameters, supplied by the embedding job configuration.
///
/// Noise vectors are fixed-size arrays so a malformed dimension cannot be
/// expressed at all; [`TrackerConfig::validate`] rejects the remaining
/// precondition violations (non-positive variances, empty gates) before any
/// frame is processed.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct TrackerConfig {
    /// Measurement noise variance per (x, y, w, h).
    pub measurement_noise: [f32; 4],
    /// Process (acceleration) noise variance per (ax, ay, aw, ah).
    pub process_noise: [f32; 4],
    /// Longest run of frames a track may survive on extrapolation alone.
    pub max_frame_gap: u64,
    /// Assignment cost gate; pairs above it are never matched.
    pub max_assignment_cost: f32,
    /// Cost added when track and detection carry different class labels.
    pub label_mismatch_cost: f32,
    /// Escape hatch: when false, tracks degrade to detection-only chaining
    /// without motion filtering.
    pub kalman_enabled: bool,
    /// Nominal time between frames in seconds, used to seed new filters.
    pub frame_interval: f32,
    /// Multiplier on the process-noise block for the initial velocity and
    /// acceleration covariance guess. Empirical tuning constant; re-tune per
    /// object class and frame rate.
    pub initial_variance_factor: f32,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            measurement_noise: [1.0, 1.0, 1.0, 1.0],
            process_noise: [100.0, 100.0, 100.0, 100.0],
            max_frame_gap: 4,
            max_assignment_cost: 0.7,
            label_mismatch_cost: 0.5,
            kalman_enabled: true,
            frame_interval: 1.0 / 25.0,
            initial_variance_factor: 10.0,
        }
    }
}

impl TrackerConfig {
    pub fn validate(&self) -> Result<(), Error> {
        for (name, vector) in [
            ("measurement_noise", &self.measurement_noise),
            ("process_noise", &self.process_noise),
        ] {
            if vector.iter().any(|v| !v.is_finite() || *v <= 0.0) {
                return Err(Error::Config(format!(
                    "{name} entries must be finite and positive, got {vector:?}"
                )));
            }
        }

        if !self.frame_interval.is_finite() || self.frame_interval <= 0.0 {
            return Err(Error::Config(format!(
                "frame_interval must be positive, got {}",
                self.frame_interval
            )));
        }

        if !self.max_assignment_cost.is_finite() || self.max_assignment_cost <= 0.0 {
            return Err(Error::Config(format!(
                "max_assignment_cost must be positive, got {}",
                self.max_assignment_cost
            )));
        }

        if !self.label_mismatch_cost.is_finite() || self.label_mismatch_cost < 0.0 {
            return Err(Error::Config(format!(
                "label_mismatch_cost must be non-negative, got {}",
                self.label_mismatch_cost
            )));
        }

        if !self.initial_variance_factor.is_finite() || self.initial_variance_factor <= 0.0 {
            return Err(Error::Config(format!(
                "initial_variance_factor must be positive, got {}",
                self.initial_variance_factor
            )));
        }

        Ok(())
    }
}
