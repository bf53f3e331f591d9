use std::path::Path;

use crate::recognition::domain::face_recognizer::RecognizerError;

/// Return the preferred ONNX execution providers for the current platform.
///
/// Falls back to CPU if the platform-specific provider is unavailable.
fn preferred_execution_providers() -> Vec<ort::execution_providers::ExecutionProviderDispatch> {
    #[cfg(target_os = "macos")]
    {
        vec![ort::execution_providers::CoreMLExecutionProvider::default().build()]
    }
    #[cfg(target_os = "windows")]
    {
        vec![ort::execution_providers::DirectMLExecutionProvider::default().build()]
    }
    #[cfg(not(any(target_os = "macos", target_os = "windows")))]
    {
        vec![]
    }
}

/// Open an inference session for `model_path`.
///
/// Callers that open one session per worker divide the cores between them
/// through `intra_threads`.
pub fn open_session(
    model_path: &Path,
    intra_threads: usize,
) -> Result<ort::session::Session, RecognizerError> {
    let build = || -> ort::Result<ort::session::Session> {
        ort::session::Session::builder()?
            .with_optimization_level(ort::session::builder::GraphOptimizationLevel::Level3)?
            .with_inter_threads(1)?
            .with_intra_threads(intra_threads.max(1))?
            .with_execution_providers(preferred_execution_providers())?
            .commit_from_file(model_path)
    };
    build().map_err(|e| {
        RecognizerError::Inference(format!("failed to load {}: {e}", model_path.display()))
    })
}

pub(crate) fn inference_error(e: impl std::fmt::Display) -> RecognizerError {
    RecognizerError::Inference(e.to_string())
}
