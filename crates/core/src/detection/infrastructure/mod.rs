pub mod class_labels;
pub mod execution_provider;
pub mod inference_gate;
pub mod model_resolver;
pub mod onnx_yolo_engine;
