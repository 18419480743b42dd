//! glowface-core: face blendshape detection and the glow overlay state machine.
//!
//! Runs a blendshape model via ONNX Runtime and turns the resulting
//! expression scores into edge-triggered overlay transitions.

use std::path::PathBuf;

pub mod assets;
pub mod detector;
pub mod glow;
pub mod types;

pub use assets::{AssetError, ModelAsset};
pub use detector::{
    BlendshapeDetector, Delegate, DetectorError, FaceLandmarker, FaceLandmarkerOptions,
    RunningMode,
};
pub use glow::{GlowMachine, GlowState, GlowTransition};
pub use types::{Category, DetectionResult, ExpressionScores, FaceBlendshapes};

/// File name of the bundled blendshape model.
pub const DEFAULT_MODEL_FILE: &str = "face_blendshapes.onnx";

/// Default directory for model files: `$XDG_DATA_HOME/glowface/models`,
/// falling back to `~/.local/share/glowface/models`.
pub fn default_model_dir() -> PathBuf {
    std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".local/share")
        })
        .join("glowface/models")
}
