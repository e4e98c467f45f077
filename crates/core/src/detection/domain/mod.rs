pub mod detect_error;
pub mod detection;
pub mod detector_config;
pub mod geometry_mapper;
pub mod image_source;
pub mod inference_engine;
