use artgate_core::FeatureExtractor;
use std::path::PathBuf;

/// Daemon configuration, loaded from environment variables.
pub struct Config {
    /// V4L2 device path (default: /dev/video0).
    pub camera_device: String,
    /// Directory containing the ONNX embedding model.
    pub model_dir: PathBuf,
    /// Path to the enrolled reference record.
    pub reference_path: PathBuf,
    /// Cosine similarity threshold for accepting a scan.
    pub similarity_threshold: f32,
    /// Number of warmup frames to discard at startup (auto-exposure settling).
    pub warmup_frames: usize,
}

impl Config {
    /// Load configuration from `ARTGATE_*` environment variables with defaults.
    pub fn from_env() -> Self {
        let model_dir = std::env::var("ARTGATE_MODEL_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| artgate_core::default_model_dir());

        let reference_path = std::env::var("ARTGATE_REFERENCE_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| artgate_core::default_reference_path());

        Self {
            camera_device: std::env::var("ARTGATE_CAMERA_DEVICE")
                .unwrap_or_else(|_| "/dev/video0".to_string()),
            model_dir,
            reference_path,
            similarity_threshold: env_f32(
                "ARTGATE_SIMILARITY_THRESHOLD",
                artgate_core::DEFAULT_SIMILARITY_THRESHOLD,
            ),
            warmup_frames: env_usize("ARTGATE_WARMUP_FRAMES", 4),
        }
    }

    /// Path to the embedding model file.
    pub fn model_path(&self) -> String {
        FeatureExtractor::model_file(&self.model_dir)
    }
}

fn env_f32(key: &str, default: f32) -> f32 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_usize(key: &str, default: usize) -> usize {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
