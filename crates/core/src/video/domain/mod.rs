pub mod capture_source;
pub mod image_reader;
pub mod image_writer;
