use lapjv::{lapjv, Matrix};
use log::trace;

use crate::bbox::Rect;
use crate::config::TrackerConfig;
use crate::detection::{Classification, Detection};
use crate::error::Error;
use crate::track::Track;

/// Cost marking a forbidden pair; far above any gateable cost, and filtered
/// out again after the solve so it can never surface as a match.
pub(crate) const INVALID_COST: f32 = 1.0e6;

/// Outcome of one frame's detection-to-track matching.
#[derive(Debug, Clone, PartialEq)]
pub struct Assignment {
    /// Matched `(track_idx, detection_idx)` pairs under the cost gate.
    pub matches: Vec<(usize, usize)>,
    pub unmatched_tracks: Vec<usize>,
    pub unmatched_detections: Vec<usize>,
}

/// Cost of assigning `detection` to a track predicted at `predicted`.
///
/// Spatial term is `1 - IoU`; a class-label mismatch adds a fixed penalty.
/// Zero overlap is forbidden outright: such a detection is always a
/// new-track candidate, never forced onto an existing track.
pub(crate) fn pair_cost(
    predicted: Rect,
    track_class: Option<&Classification>,
    detection: &Detection,
    config: &TrackerConfig,
) -> f32 {
    let iou = predicted.iou(&detection.rect());
    if iou <= 0.0 {
        return INVALID_COST;
    }

    let mut cost = 1.0 - iou;
    if let (Some(track_label), Some(det_label)) = (track_class, detection.class()) {
        if track_label.label != det_label.label {
            cost += config.label_mismatch_cost;
        }
    }

    if cost > config.max_assignment_cost {
        INVALID_COST
    } else {
        cost
    }
}

/// Minimum-cost one-to-one matching of live tracks against the frame's
/// detections, using each track's predicted box.
///
/// The cost matrix is square-padded and solved with the Jonker-Volgenant
/// algorithm; pairs at or above [`INVALID_COST`] are stripped from the
/// solution afterwards. The solve is deterministic for identical inputs.
pub fn assign(
    tracks: &[Track],
    detections: &[Detection],
    config: &TrackerConfig,
) -> Result<Assignment, Error> {
    let n = tracks.len();
    let m = detections.len();

    if n == 0 || m == 0 {
        return Ok(Assignment {
            matches: Vec::new(),
            unmatched_tracks: (0..n).collect(),
            unmatched_detections: (0..m).collect(),
        });
    }

    let dims = n.max(m);
    let costs = Matrix::from_shape_fn((dims, dims), |(row, col)| {
        if row < n && col < m {
            pair_cost(
                tracks[row].predicted_rect(),
                tracks[row].latest_class(),
                &detections[col],
                config,
            )
        } else {
            // padding for the dummy rows/columns of the square matrix
            0.0
        }
    });

    let (row_assignments, _) = lapjv(&costs).map_err(|e| Error::Assignment(format!("{e:?}")))?;

    let mut matches = Vec::new();
    let mut track_taken = vec![false; n];
    let mut detection_taken = vec![false; m];

    for (row, &col) in row_assignments.iter().enumerate() {
        if row < n && col < m && costs[(row, col)] < INVALID_COST {
            trace!(
                "matched track {} to detection {col} at cost {}",
                tracks[row].id(),
                costs[(row, col)]
            );
            track_taken[row] = true;
            detection_taken[col] = true;
            matches.push((row, col));
        }
    }

    Ok(Assignment {
        matches,
        unmatched_tracks: (0..n).filter(|&i| !track_taken[i]).collect(),
        unmatched_detections: (0..m).filter(|&j| !detection_taken[j]).collect(),
    })
}
