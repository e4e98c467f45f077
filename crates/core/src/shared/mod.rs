pub mod color_space;
pub mod constants;
pub mod frame;
pub mod geometry;
pub mod orientation;
