pub mod detect_image_use_case;
pub mod detection_filter;
pub mod detector;
pub mod inference_adapter;
pub mod label_overlay;
pub mod live_feed_use_case;
pub mod pipeline_logger;
