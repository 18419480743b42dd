//! Face blendshape detector via ONNX Runtime.
//!
//! The model takes one RGB frame and emits a row of 52 blendshape scores
//! per tracked face. Frames are resized to the model input, scaled to
//! [0, 1] and laid out NCHW.

use crate::types::{DetectionResult, FaceBlendshapes, BLENDSHAPE_NAMES};
use image::imageops::FilterType;
use image::RgbImage;
use ndarray::Array4;
use ort::execution_providers::CUDAExecutionProvider;
use ort::session::Session;
use ort::value::TensorRef;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;

const LANDMARKER_INPUT_SIZE: u32 = 256;
const BLENDSHAPE_COUNT: usize = BLENDSHAPE_NAMES.len();

#[derive(Error, Debug)]
pub enum DetectorError {
    #[error("model file not found: {0}")]
    ModelNotFound(String),
    #[error("{delegate} delegate unavailable: {reason}")]
    DelegateUnavailable { delegate: Delegate, reason: String },
    #[error("detector is in {actual} mode, call requires {expected} mode")]
    WrongRunningMode {
        expected: RunningMode,
        actual: RunningMode,
    },
    #[error("video timestamp went backwards: {current} ms after {previous} ms")]
    NonMonotonicTimestamp { previous: f64, current: f64 },
    #[error("invalid frame: expected {expected} RGB bytes, got {actual}")]
    InvalidFrame { expected: usize, actual: usize },
    #[error("inference failed: {0}")]
    InferenceFailed(String),
    #[error("ort: {0}")]
    Ort(#[from] ort::Error),
}

/// Compute backend requested for the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Delegate {
    #[default]
    Gpu,
    Cpu,
}

impl Delegate {
    /// Whether this build links an ONNX Runtime that can serve the delegate.
    pub fn is_available(self) -> bool {
        match self {
            Delegate::Gpu => cfg!(feature = "cuda"),
            Delegate::Cpu => true,
        }
    }
}

impl fmt::Display for Delegate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Delegate::Gpu => f.write_str("GPU"),
            Delegate::Cpu => f.write_str("CPU"),
        }
    }
}

impl FromStr for Delegate {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "gpu" => Ok(Delegate::Gpu),
            "cpu" => Ok(Delegate::Cpu),
            other => Err(format!("unknown delegate {other:?} (expected gpu or cpu)")),
        }
    }
}

/// Whether the detector expects single images or a continuous video stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunningMode {
    Image,
    #[default]
    Video,
}

impl fmt::Display for RunningMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunningMode::Image => f.write_str("IMAGE"),
            RunningMode::Video => f.write_str("VIDEO"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct BaseOptions {
    pub model_asset_path: PathBuf,
    pub delegate: Delegate,
}

#[derive(Debug, Clone)]
pub struct FaceLandmarkerOptions {
    pub base_options: BaseOptions,
    pub output_face_blendshapes: bool,
    pub running_mode: RunningMode,
    pub num_faces: usize,
}

impl FaceLandmarkerOptions {
    /// Video mode, blendshapes on, one face.
    pub fn new(model_asset_path: impl Into<PathBuf>, delegate: Delegate) -> Self {
        Self {
            base_options: BaseOptions {
                model_asset_path: model_asset_path.into(),
                delegate,
            },
            output_face_blendshapes: true,
            running_mode: RunningMode::Video,
            num_faces: 1,
        }
    }
}

/// A detector that scores facial expressions on video frames.
pub trait BlendshapeDetector {
    /// Run detection on one packed RGB frame.
    ///
    /// `timestamp_ms` must not decrease between calls.
    fn detect_for_video(
        &mut self,
        rgb: &[u8],
        width: u32,
        height: u32,
        timestamp_ms: f64,
    ) -> Result<DetectionResult, DetectorError>;
}

/// Enforces video-mode call rules independent of the model session.
#[derive(Debug)]
struct VideoGuard {
    running_mode: RunningMode,
    last_timestamp_ms: Option<f64>,
}

impl VideoGuard {
    fn new(running_mode: RunningMode) -> Self {
        Self {
            running_mode,
            last_timestamp_ms: None,
        }
    }

    fn admit(&mut self, timestamp_ms: f64) -> Result<(), DetectorError> {
        if self.running_mode != RunningMode::Video {
            return Err(DetectorError::WrongRunningMode {
                expected: RunningMode::Video,
                actual: self.running_mode,
            });
        }
        if let Some(previous) = self.last_timestamp_ms {
            if timestamp_ms < previous {
                return Err(DetectorError::NonMonotonicTimestamp {
                    previous,
                    current: timestamp_ms,
                });
            }
        }
        self.last_timestamp_ms = Some(timestamp_ms);
        Ok(())
    }
}

/// ONNX-backed face blendshape detector.
pub struct FaceLandmarker {
    session: Session,
    guard: VideoGuard,
    output_face_blendshapes: bool,
    num_faces: usize,
}

impl FaceLandmarker {
    /// Load the model and register the requested delegate.
    ///
    /// A GPU delegate that cannot be registered is an error, never a
    /// silent fall back to CPU.
    pub fn create_from_options(options: &FaceLandmarkerOptions) -> Result<Self, DetectorError> {
        let model_path = &options.base_options.model_asset_path;
        if !model_path.exists() {
            return Err(DetectorError::ModelNotFound(model_path.display().to_string()));
        }

        let delegate = options.base_options.delegate;
        if !delegate.is_available() {
            return Err(DetectorError::DelegateUnavailable {
                delegate,
                reason: "built without the `cuda` feature".into(),
            });
        }

        let mut builder = Session::builder()?.with_intra_threads(2)?;

        if options.base_options.delegate == Delegate::Gpu {
            builder = builder
                .with_execution_providers([CUDAExecutionProvider::default()
                    .build()
                    .error_on_failure()])
                .map_err(|e| DetectorError::DelegateUnavailable {
                    delegate: Delegate::Gpu,
                    reason: e.to_string(),
                })?;
        }

        let session = builder.commit_from_file(model_path)?;

        tracing::info!(
            path = %model_path.display(),
            delegate = %options.base_options.delegate,
            running_mode = %options.running_mode,
            num_faces = options.num_faces,
            inputs = ?session.inputs().iter().map(|i| (i.name(), i.dtype())).collect::<Vec<_>>(),
            outputs = ?session.outputs().iter().map(|o| o.name()).collect::<Vec<_>>(),
            "loaded face landmarker model"
        );

        if session.outputs().is_empty() {
            return Err(DetectorError::InferenceFailed(
                "model has no outputs, expected blendshape scores".into(),
            ));
        }

        Ok(Self {
            session,
            guard: VideoGuard::new(options.running_mode),
            output_face_blendshapes: options.output_face_blendshapes,
            num_faces: options.num_faces,
        })
    }
}

impl BlendshapeDetector for FaceLandmarker {
    fn detect_for_video(
        &mut self,
        rgb: &[u8],
        width: u32,
        height: u32,
        timestamp_ms: f64,
    ) -> Result<DetectionResult, DetectorError> {
        self.guard.admit(timestamp_ms)?;

        let input = preprocess(rgb, width, height)?;
        if !self.output_face_blendshapes {
            return Ok(DetectionResult::default());
        }

        let outputs = self.session.run(ort::inputs![TensorRef::from_array_view(input.view())?])?;
        let (_, scores) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| DetectorError::InferenceFailed(format!("blendshape scores: {e}")))?;

        let result = decode_blendshapes(scores, self.num_faces);
        tracing::trace!(faces = result.face_blendshapes.len(), timestamp_ms, "detected");
        Ok(result)
    }
}

/// Resize a packed RGB frame into the model's NCHW input tensor.
fn preprocess(rgb: &[u8], width: u32, height: u32) -> Result<Array4<f32>, DetectorError> {
    let expected = width as usize * height as usize * 3;
    if expected == 0 || rgb.len() < expected {
        return Err(DetectorError::InvalidFrame {
            expected,
            actual: rgb.len(),
        });
    }

    let frame = RgbImage::from_raw(width, height, rgb[..expected].to_vec()).ok_or(
        DetectorError::InvalidFrame {
            expected,
            actual: rgb.len(),
        },
    )?;
    let resized = image::imageops::resize(
        &frame,
        LANDMARKER_INPUT_SIZE,
        LANDMARKER_INPUT_SIZE,
        FilterType::Triangle,
    );

    let size = LANDMARKER_INPUT_SIZE as usize;
    let mut tensor = Array4::<f32>::zeros((1, 3, size, size));
    for (x, y, pixel) in resized.enumerate_pixels() {
        for c in 0..3 {
            tensor[[0, c, y as usize, x as usize]] = pixel[c] as f32 / 255.0;
        }
    }

    Ok(tensor)
}

/// Split flat model output into per-face category lists, keeping at most `num_faces`.
fn decode_blendshapes(scores: &[f32], num_faces: usize) -> DetectionResult {
    DetectionResult {
        face_blendshapes: scores
            .chunks_exact(BLENDSHAPE_COUNT)
            .take(num_faces)
            .map(FaceBlendshapes::from_scores)
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{MOUTH_PUCKER, MOUTH_SHRUG_LOWER};

    #[test]
    fn test_delegate_parse() {
        assert_eq!("gpu".parse::<Delegate>().unwrap(), Delegate::Gpu);
        assert_eq!("CPU".parse::<Delegate>().unwrap(), Delegate::Cpu);
        assert!("tpu".parse::<Delegate>().is_err());
        assert_eq!(Delegate::Gpu.to_string(), "GPU");
    }

    #[test]
    fn test_default_options() {
        let opts = FaceLandmarkerOptions::new("/models/face.onnx", Delegate::Gpu);
        assert!(opts.output_face_blendshapes);
        assert_eq!(opts.running_mode, RunningMode::Video);
        assert_eq!(opts.num_faces, 1);
        assert_eq!(opts.base_options.delegate, Delegate::Gpu);
    }

    #[test]
    fn test_missing_model_is_reported() {
        let opts = FaceLandmarkerOptions::new("/nonexistent/glowface/face.onnx", Delegate::Cpu);
        match FaceLandmarker::create_from_options(&opts) {
            Err(DetectorError::ModelNotFound(path)) => assert!(path.contains("face.onnx")),
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("expected ModelNotFound"),
        }
    }

    #[test]
    fn test_cpu_delegate_always_available() {
        assert!(Delegate::Cpu.is_available());
    }

    #[cfg(feature = "cuda")]
    #[test]
    fn test_default_build_serves_gpu() {
        assert!(Delegate::default().is_available());
    }

    #[cfg(not(feature = "cuda"))]
    #[test]
    fn test_gpu_without_cuda_fails_before_loading() {
        let path =
            std::env::temp_dir().join(format!("glowface-nocuda-{}.onnx", std::process::id()));
        std::fs::write(&path, b"not a model").unwrap();
        let opts = FaceLandmarkerOptions::new(path.clone(), Delegate::Gpu);
        let result = FaceLandmarker::create_from_options(&opts);
        std::fs::remove_file(&path).unwrap();
        match result {
            Err(DetectorError::DelegateUnavailable { delegate, .. }) => {
                assert_eq!(delegate, Delegate::Gpu)
            }
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("expected DelegateUnavailable"),
        }
    }

    #[test]
    fn test_guard_rejects_image_mode() {
        let mut guard = VideoGuard::new(RunningMode::Image);
        assert!(matches!(
            guard.admit(0.0),
            Err(DetectorError::WrongRunningMode { .. })
        ));
    }

    #[test]
    fn test_guard_timestamps() {
        let mut guard = VideoGuard::new(RunningMode::Video);
        assert!(guard.admit(10.0).is_ok());
        assert!(guard.admit(10.0).is_ok());
        assert!(guard.admit(16.7).is_ok());
        assert!(matches!(
            guard.admit(5.0),
            Err(DetectorError::NonMonotonicTimestamp { .. })
        ));
    }

    #[test]
    fn test_preprocess_shape_and_scale() {
        let (w, h) = (4u32, 2u32);
        let rgb = vec![255u8; (w * h * 3) as usize];
        let tensor = preprocess(&rgb, w, h).unwrap();
        let size = LANDMARKER_INPUT_SIZE as usize;
        assert_eq!(tensor.shape(), &[1, 3, size, size]);
        assert!(tensor.iter().all(|&v| (v - 1.0).abs() < 1e-6));
    }

    #[test]
    fn test_preprocess_keeps_channel_order() {
        // Uniform pure-red frame stays red after resize
        let (w, h) = (8u32, 8u32);
        let rgb: Vec<u8> = (0..w * h).flat_map(|_| [255u8, 0, 0]).collect();
        let tensor = preprocess(&rgb, w, h).unwrap();
        assert!((tensor[[0, 0, 10, 10]] - 1.0).abs() < 1e-6);
        assert!(tensor[[0, 1, 10, 10]].abs() < 1e-6);
        assert!(tensor[[0, 2, 10, 10]].abs() < 1e-6);
    }

    #[test]
    fn test_preprocess_short_buffer() {
        let result = preprocess(&[0u8; 10], 4, 4);
        assert!(matches!(
            result,
            Err(DetectorError::InvalidFrame { expected: 48, actual: 10 })
        ));
    }

    #[test]
    fn test_preprocess_empty_frame() {
        assert!(preprocess(&[], 0, 0).is_err());
    }

    #[test]
    fn test_decode_single_face() {
        let mut scores = vec![0.0f32; BLENDSHAPE_COUNT];
        scores[38] = 0.35;
        scores[42] = 0.10;
        let result = decode_blendshapes(&scores, 1);
        assert_eq!(result.face_blendshapes.len(), 1);
        let face = result.first_face().unwrap();
        assert_eq!(face.score(MOUTH_PUCKER), Some(0.35));
        assert_eq!(face.score(MOUTH_SHRUG_LOWER), Some(0.10));
    }

    #[test]
    fn test_decode_caps_num_faces() {
        let scores = vec![0.5f32; BLENDSHAPE_COUNT * 3];
        assert_eq!(decode_blendshapes(&scores, 1).face_blendshapes.len(), 1);
        assert_eq!(decode_blendshapes(&scores, 2).face_blendshapes.len(), 2);
        assert_eq!(decode_blendshapes(&scores, 5).face_blendshapes.len(), 3);
    }

    #[test]
    fn test_decode_no_faces() {
        assert!(decode_blendshapes(&[], 1).face_blendshapes.is_empty());
        // A partial row is not a face
        let partial = vec![0.5f32; BLENDSHAPE_COUNT - 1];
        assert!(decode_blendshapes(&partial, 1).face_blendshapes.is_empty());
    }
}
