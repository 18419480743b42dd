//! One-shot detector construction at startup.

use crate::config::Config;
use glowface_core::{AssetError, DetectorError, FaceLandmarker, FaceLandmarkerOptions, ModelAsset};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum InitError {
    #[error("model asset: {0}")]
    Asset(#[from] AssetError),
    #[error("detector: {0}")]
    Detector(#[from] DetectorError),
    #[error("model loading task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Resolve the model asset, then load it off the async thread.
///
/// Video mode, blendshape output on, one face, configured delegate.
pub async fn create_face_landmarker(config: &Config) -> Result<FaceLandmarker, InitError> {
    let asset = ModelAsset::parse(&config.model);
    let model_path = asset.resolve(&config.model_dir).await?;

    let options = FaceLandmarkerOptions::new(model_path, config.delegate);
    tracing::info!(
        model = %options.base_options.model_asset_path.display(),
        delegate = %options.base_options.delegate,
        "creating face landmarker"
    );

    let landmarker =
        tokio::task::spawn_blocking(move || FaceLandmarker::create_from_options(&options))
            .await??;
    Ok(landmarker)
}

/// Where the model was looked for and how to supply a different one.
pub fn model_hint(config: &Config) -> String {
    let expected = ModelAsset::parse(&config.model)
        .cache_path(&config.model_dir)
        .map(|path| path.display().to_string())
        .unwrap_or_else(|_| config.model.clone());
    format!(
        "expected model at {expected}; set GLOWFACE_MODEL (or --model) \
         to a local .onnx path or an http(s) URL to download"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use glowface_core::Delegate;
    use std::path::PathBuf;

    #[tokio::test]
    async fn test_missing_model_fails() {
        let config = Config {
            camera_device: "/dev/video0".into(),
            model: "/nonexistent/glowface/face.onnx".into(),
            model_dir: PathBuf::from("/nonexistent/glowface"),
            delegate: Delegate::Gpu,
            frame_rate: 60,
        };
        let err = create_face_landmarker(&config).await.err().unwrap();
        assert!(matches!(err, InitError::Asset(AssetError::NotFound(_))));
    }

    #[test]
    fn test_model_hint_names_path_and_override() {
        let config = Config {
            camera_device: "/dev/video0".into(),
            model: "/opt/glowface/face_blendshapes.onnx".into(),
            model_dir: PathBuf::from("/opt/glowface"),
            delegate: Delegate::Cpu,
            frame_rate: 60,
        };
        let hint = model_hint(&config);
        assert!(hint.contains("/opt/glowface/face_blendshapes.onnx"), "{hint}");
        assert!(hint.contains("GLOWFACE_MODEL"), "{hint}");
        assert!(hint.contains("URL"), "{hint}");
    }

    #[test]
    fn test_model_hint_for_remote_points_at_cache() {
        let config = Config {
            camera_device: "/dev/video0".into(),
            model: "https://example.com/models/face.onnx".into(),
            model_dir: PathBuf::from("/var/cache/glowface"),
            delegate: Delegate::Cpu,
            frame_rate: 60,
        };
        assert!(model_hint(&config).contains("/var/cache/glowface/face.onnx"));
    }
}
