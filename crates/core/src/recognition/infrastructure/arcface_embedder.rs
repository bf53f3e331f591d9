/// ArcFace face embedder using ONNX Runtime.
///
/// Produces L2-normalized embeddings, so Euclidean distance between two
/// embeddings is a monotonic function of their cosine similarity.
use std::path::Path;

use image::RgbImage;

use super::session::{inference_error, open_session};
use super::session_pool::SessionPool;
use crate::recognition::domain::face_recognizer::RecognizerError;
use crate::shared::encoding::Encoding;

const INPUT_SIZE: usize = 112;
const NORM_MEAN: f32 = 127.5;
const NORM_STD: f32 = 127.5;

pub struct ArcFaceEmbedder {
    sessions: SessionPool<ort::session::Session>,
}

impl ArcFaceEmbedder {
    pub fn new(
        model_path: &Path,
        sessions: usize,
        intra_threads: usize,
    ) -> Result<Self, RecognizerError> {
        Ok(Self {
            sessions: SessionPool::open(sessions, || open_session(model_path, intra_threads))?,
        })
    }

    pub fn embed(&self, crop: &RgbImage) -> Result<Encoding, RecognizerError> {
        let tensor = preprocess(crop);
        let input_value = ort::value::Tensor::from_array(tensor).map_err(inference_error)?;
        let mut session = self.sessions.checkout().map_err(inference_error)?;
        let outputs = session
            .run(ort::inputs![input_value])
            .map_err(inference_error)?;
        let embedding_array = outputs[0]
            .try_extract_array::<f32>()
            .map_err(inference_error)?;
        let mut embedding = embedding_array
            .as_slice()
            .ok_or_else(|| RecognizerError::Inference("Cannot get embedding slice".into()))?
            .to_vec();

        l2_normalize(&mut embedding);
        Ok(Encoding::from(embedding))
    }
}

/// Resize crop to 112x112, normalize, NCHW layout.
fn preprocess(crop: &RgbImage) -> ndarray::Array4<f32> {
    let (src_w, src_h) = (crop.width() as usize, crop.height() as usize);
    let mut tensor = ndarray::Array4::<f32>::zeros((1, 3, INPUT_SIZE, INPUT_SIZE));
    if src_w == 0 || src_h == 0 {
        return tensor;
    }

    for y in 0..INPUT_SIZE {
        let src_y = (((y as f64 + 0.5) * src_h as f64 / INPUT_SIZE as f64) as usize).min(src_h - 1);
        for x in 0..INPUT_SIZE {
            let src_x =
                (((x as f64 + 0.5) * src_w as f64 / INPUT_SIZE as f64) as usize).min(src_w - 1);
            let pixel = crop.get_pixel(src_x as u32, src_y as u32);
            for c in 0..3 {
                tensor[[0, c, y, x]] = (pixel.0[c] as f32 - NORM_MEAN) / NORM_STD;
            }
        }
    }

    tensor
}

pub fn l2_normalize(v: &mut [f32]) {
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn solid(width: u32, height: u32, value: u8) -> RgbImage {
        RgbImage::from_pixel(width, height, image::Rgb([value, value, value]))
    }

    #[test]
    fn test_l2_normalize_unit_vector() {
        let mut v = vec![3.0, 4.0];
        l2_normalize(&mut v);
        assert_relative_eq!(v[0], 0.6, epsilon = 1e-6);
        assert_relative_eq!(v[1], 0.8, epsilon = 1e-6);
    }

    #[test]
    fn test_l2_normalize_zero_vector() {
        let mut v = vec![0.0, 0.0, 0.0];
        l2_normalize(&mut v);
        assert_eq!(v, vec![0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_preprocess_shape() {
        let tensor = preprocess(&solid(50, 50, 128));
        assert_eq!(tensor.shape(), &[1, 3, 112, 112]);
    }

    #[test]
    fn test_preprocess_normalization_range() {
        assert_relative_eq!(preprocess(&solid(10, 10, 255))[[0, 0, 0, 0]], 1.0, epsilon = 0.01);
        assert_relative_eq!(preprocess(&solid(10, 10, 0))[[0, 2, 5, 5]], -1.0, epsilon = 0.01);
    }

    #[test]
    fn test_preprocess_empty_crop_is_zero_tensor() {
        let tensor = preprocess(&RgbImage::new(0, 0));
        assert!(tensor.iter().all(|v| *v == 0.0));
    }
}
