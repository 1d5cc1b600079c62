//! Playbook Core Library
//!
//! Keyframe timeline and interpolation engine for animated plays: pieces are
//! placed on a 2-D surface, snapshots of their positions are recorded at
//! timeline ticks, and playback interpolates between the snapshots.

pub mod capture;
pub mod container;
pub mod keyframe;
pub mod position;
pub mod session;
pub mod timeline;

pub use capture::{capture, CaptureSummary, FrameSink};
pub use container::SavedPlay;
pub use keyframe::{Frame, InterpolationMode, Keyframe, KeyframeStore, Positions};
pub use position::EntityPosition;
pub use session::{Session, SessionConfig};
pub use timeline::{Marker, TimelineController, TICK_STEP};

/// Result type for playbook-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for playbook-core operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid magic bytes, expected 'PLAY'")]
    InvalidMagic,

    #[error("Unsupported version: {0}")]
    UnsupportedVersion(u16),

    #[error("Entity identifier is not valid UTF-8")]
    InvalidEntityId,

    #[error("Entity identifier too long: {0} bytes")]
    EntityIdTooLong(usize),

    #[cfg(feature = "serde")]
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Frame sink error: {0}")]
    Sink(String),
}
