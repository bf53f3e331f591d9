pub const YOLO_MODEL_NAME: &str = "yolo11n-pose_widerface.onnx";
pub const YOLO_MODEL_URL: &str =
    "https://github.com/neutrinographics/faceguard/releases/download/v0.1.0/yolo11n-pose_widerface.onnx";

pub const EMBEDDING_MODEL_NAME: &str = "w600k_r50.onnx";
pub const EMBEDDING_MODEL_URL: &str =
    "https://github.com/neutrinographics/faceguard/releases/download/v0.1.0/w600k_r50.onnx";

/// Application directory name used under the platform data/cache/config dirs.
pub const APP_DIR_NAME: &str = "Face Match";

/// Only files with this extension are matched or trained on.
pub const IMAGE_EXTENSION: &str = "jpg";

/// Extension of the per-identity gallery artifacts.
pub const GALLERY_EXTENSION: &str = "json";

pub const ENCODING_CACHE_FILE: &str = "encoding_cache.json";

/// Euclidean distance at or below which two encodings are the same person.
///
/// Embeddings are L2-normalized, so this corresponds to a cosine
/// similarity of roughly 0.4.
pub const DEFAULT_TOLERANCE: f64 = 1.1;

pub const DEFAULT_WORKERS: usize = 4;
