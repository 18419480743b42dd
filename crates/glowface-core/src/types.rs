use serde::{Deserialize, Serialize};

/// Blendshape category names in model output order.
pub const BLENDSHAPE_NAMES: [&str; 52] = [
    "_neutral",
    "browDownLeft",
    "browDownRight",
    "browInnerUp",
    "browOuterUpLeft",
    "browOuterUpRight",
    "cheekPuff",
    "cheekSquintLeft",
    "cheekSquintRight",
    "eyeBlinkLeft",
    "eyeBlinkRight",
    "eyeLookDownLeft",
    "eyeLookDownRight",
    "eyeLookInLeft",
    "eyeLookInRight",
    "eyeLookOutLeft",
    "eyeLookOutRight",
    "eyeLookUpLeft",
    "eyeLookUpRight",
    "eyeSquintLeft",
    "eyeSquintRight",
    "eyeWideLeft",
    "eyeWideRight",
    "jawForward",
    "jawLeft",
    "jawOpen",
    "jawRight",
    "mouthClose",
    "mouthDimpleLeft",
    "mouthDimpleRight",
    "mouthFrownLeft",
    "mouthFrownRight",
    "mouthFunnel",
    "mouthLeft",
    "mouthLowerDownLeft",
    "mouthLowerDownRight",
    "mouthPressLeft",
    "mouthPressRight",
    "mouthPucker",
    "mouthRight",
    "mouthRollLower",
    "mouthRollUpper",
    "mouthShrugLower",
    "mouthShrugUpper",
    "mouthSmileLeft",
    "mouthSmileRight",
    "mouthStretchLeft",
    "mouthStretchRight",
    "mouthUpperUpLeft",
    "mouthUpperUpRight",
    "noseSneerLeft",
    "noseSneerRight",
];

pub const MOUTH_PUCKER: &str = "mouthPucker";
pub const MOUTH_SHRUG_LOWER: &str = "mouthShrugLower";

/// One named score produced by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub index: usize,
    pub score: f32,
    pub category_name: String,
}

/// Blendshape categories for a single face. Order is not significant;
/// look categories up by name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FaceBlendshapes {
    pub categories: Vec<Category>,
}

impl FaceBlendshapes {
    /// Build a category list from one row of model output.
    ///
    /// Scores beyond the known category table are dropped.
    pub fn from_scores(scores: &[f32]) -> Self {
        let categories = scores
            .iter()
            .zip(BLENDSHAPE_NAMES.iter())
            .enumerate()
            .map(|(index, (&score, &name))| Category {
                index,
                score,
                category_name: name.to_string(),
            })
            .collect();
        Self { categories }
    }

    pub fn find(&self, name: &str) -> Option<&Category> {
        self.categories.iter().find(|c| c.category_name == name)
    }

    pub fn score(&self, name: &str) -> Option<f32> {
        self.find(name).map(|c| c.score)
    }
}

/// The two scores that drive the glow overlay.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExpressionScores {
    pub pucker: f32,
    pub shrug: f32,
}

impl ExpressionScores {
    /// Extract pucker and shrug scores from a face.
    ///
    /// Returns `None` unless both categories are present.
    pub fn from_blendshapes(face: &FaceBlendshapes) -> Option<Self> {
        Some(Self {
            pucker: face.score(MOUTH_PUCKER)?,
            shrug: face.score(MOUTH_SHRUG_LOWER)?,
        })
    }
}

/// Output of one detector call. Zero or more faces.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DetectionResult {
    pub face_blendshapes: Vec<FaceBlendshapes>,
}

impl DetectionResult {
    /// Blendshapes of the first tracked face, if any.
    pub fn first_face(&self) -> Option<&FaceBlendshapes> {
        self.face_blendshapes.first()
    }
}
