use glowface_core::Delegate;
use std::path::PathBuf;
use std::str::FromStr;

/// Runtime configuration, loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// V4L2 device path (default: /dev/video0).
    pub camera_device: String,
    /// Model asset reference: a local path or an http(s) URL.
    pub model: String,
    /// Directory for model files and downloaded assets.
    pub model_dir: PathBuf,
    /// Preferred compute backend for the model.
    pub delegate: Delegate,
    /// Animation frames per second.
    pub frame_rate: u32,
}

impl Config {
    /// Load configuration from `GLOWFACE_*` environment variables with defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let model_dir = lookup("GLOWFACE_MODEL_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(glowface_core::default_model_dir);

        let model = lookup("GLOWFACE_MODEL").unwrap_or_else(|| {
            model_dir
                .join(glowface_core::DEFAULT_MODEL_FILE)
                .to_string_lossy()
                .into_owned()
        });

        Self {
            camera_device: lookup("GLOWFACE_CAMERA_DEVICE")
                .unwrap_or_else(|| "/dev/video0".to_string()),
            model,
            model_dir,
            delegate: parse_or(&lookup, "GLOWFACE_DELEGATE", Delegate::Gpu),
            frame_rate: parse_or(&lookup, "GLOWFACE_FRAME_RATE", 60),
        }
    }
}

fn parse_or<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T {
    match lookup(key) {
        Some(raw) => raw.parse().unwrap_or_else(|_| {
            tracing::warn!(key, value = %raw, "invalid value, using default");
            default
        }),
        None => default,
    }
}
