// Core modules for the dynamic clipping-spline engine
pub mod animate;
pub mod camera;
pub mod control_points;
pub mod geometry;
pub mod keyframe;
pub mod mask;
pub mod scene;
pub mod tps;
pub mod volume;

// Re-export commonly used types
pub use animate::{evaluate, resolve_surface, AnimationState, FramePlan};
pub use camera::CameraPose;
pub use control_points::{ControlPoint, ControlPointId, ControlPointSet, ControlPointStore};
pub use geometry::{Axis, KeptSide, Point3D, Vector3D};
pub use keyframe::{Bracket, ChannelState, Keyframe, KeyframeId, SceneSnapshot, Timeline};
pub use mask::{CancelToken, ClipMask, MaskConfig, MaskPipeline, MaskTier};
pub use scene::SceneDocument;
pub use tps::{TpsConfig, TpsModel};
pub use volume::{BitDepth, VolumeMeta};

/// Main result type for the clipping engine
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for the clipping engine
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Fewer than 3 non-collinear control points; the surface is undefined,
    /// not broken. Callers typically fall back to showing the unclipped volume.
    #[error("surface is undefined with {points} usable control points")]
    UnderdeterminedSurface { points: usize },

    /// The TPS system is singular to within numerical tolerance, usually
    /// caused by duplicate or near-duplicate control points.
    #[error("thin-plate spline system is singular for {points} control points")]
    DegenerateSolve { points: usize },

    /// A keyframe save was rejected; the timeline is unchanged.
    #[error("a keyframe already exists at timestamp {0}")]
    DuplicateTimestamp(f64),

    /// A keyframe timestamp must be a finite number.
    #[error("timestamp {0} is not a finite number")]
    InvalidTimestamp(f64),

    /// Operation on an unknown control-point or keyframe identifier.
    /// Indicates a caller bug rather than user error.
    #[error("unknown {kind} identifier {id}")]
    InvalidReference { kind: &'static str, id: u64 },

    /// The mask cannot fit within the configured memory ceiling even at the
    /// requested tier.
    #[error("mask of {required} bytes exceeds the memory ceiling of {ceiling} bytes")]
    ResourceExceeded { required: usize, ceiling: usize },

    /// A newer edit superseded this mask generation. The last committed mask
    /// remains valid.
    #[error("mask generation was cancelled")]
    Cancelled,

    /// Animation evaluation requires at least one keyframe.
    #[error("the timeline contains no keyframes")]
    EmptyTimeline,

    /// An export frame rate must be a positive, finite number.
    #[error("frame rate {0} is not a positive number")]
    InvalidFrameRate(f64),
}
