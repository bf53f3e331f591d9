pub mod arcface_embedder;
pub mod onnx_face_recognizer;
pub mod session;
pub mod session_pool;
pub mod yolo_face_detector;
