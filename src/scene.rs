// Persisted scene state.
//
// The document carries everything needed to rebuild a session: the keyframe
// timeline plus the clipping parameters that apply across all keyframes. The
// on-disk format is whatever serializer the caller picks; this module only
// provides the serde shape.

use crate::geometry::{Axis, KeptSide};
use crate::keyframe::Timeline;
use serde::{Deserialize, Serialize};

/// A saved session: the timeline and the solver settings shared by every
/// keyframe in it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SceneDocument {
    pub timeline: Timeline,

    /// Dependent axis of the clipping surface
    pub axis: Axis,

    pub kept_side: KeptSide,

    /// TPS regularization shared across keyframes; 0.0 interpolates exactly
    pub regularization: f64,
}

impl Default for SceneDocument {
    fn default() -> Self {
        Self {
            timeline: Timeline::new(),
            axis: Axis::Z,
            kept_side: KeptSide::default(),
            regularization: 0.0,
        }
    }
}

impl SceneDocument {
    pub fn new(timeline: Timeline, axis: Axis, kept_side: KeptSide) -> Self {
        Self {
            timeline,
            axis,
            kept_side,
            regularization: 0.0,
        }
    }
}
